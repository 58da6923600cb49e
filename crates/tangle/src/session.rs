// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-call session state.
//!
//! One encode session per top-level encode: an identity map from object cell
//! address to a monotonically assigned index. One decode session per
//! top-level decode: the slot vector indexed by the same counter, plus the
//! running allocation approximation. Sessions are pooled by the kernel and
//! reset between uses; identity never crosses top-level calls.

use crate::error::{Error, Result};
use crate::model::{ObjCell, ObjRef};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Flat cost charged per decoded object slot, on top of payload-driven
/// charges (string/byte/element counts).
pub const OBJECT_OVERHEAD_BYTES: usize = 32;

/// Encode-side identity table.
#[derive(Default)]
pub struct EncodeSession {
    ids: HashMap<usize, u32>,
}

impl EncodeSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index previously assigned to this object, if any. Keyed on the cell
    /// address: two clones of one handle are one object, two structurally
    /// equal objects are two.
    pub fn lookup(&self, obj: &ObjRef) -> Option<u32> {
        self.ids.get(&(Rc::as_ptr(obj) as usize)).copied()
    }

    /// Assign the next index to a first-encountered object. Assignment order
    /// is encounter order in the pre-order traversal.
    pub fn allocate(&mut self, obj: &ObjRef) -> u32 {
        let index = self.ids.len() as u32;
        self.ids.insert(Rc::as_ptr(obj) as usize, index);
        index
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn reset(&mut self) {
        self.ids.clear();
    }
}

/// Decode-side slot vector and allocation budget.
pub struct DecodeSession {
    slots: Vec<ObjRef>,
    consumed: usize,
    limit: usize,
}

impl DecodeSession {
    pub fn new(limit: usize) -> Self {
        Self {
            slots: Vec::new(),
            consumed: 0,
            limit,
        }
    }

    /// Append a fresh uninitialized slot and return its handle. The handle is
    /// stable; the content formatter must initialize the cell before any
    /// nested decode runs, so that cyclic children can point back at it.
    pub fn allocate(&mut self) -> ObjRef {
        let obj: ObjRef = Rc::new(RefCell::new(ObjCell::uninit()));
        self.slots.push(obj.clone());
        obj
    }

    /// Resolve a back-reference. An index past the end and a slot whose cell
    /// was never initialized are both wire-format errors.
    pub fn get(&self, index: u64, offset: usize) -> Result<ObjRef> {
        let slot = self
            .slots
            .get(index as usize)
            .ok_or_else(|| {
                Error::malformed(
                    offset,
                    format!(
                        "back-reference to slot {} of {}",
                        index,
                        self.slots.len()
                    ),
                )
            })?;
        if !slot.borrow().is_init() {
            return Err(Error::malformed(
                offset,
                format!("back-reference to slot {} before it was written", index),
            ));
        }
        Ok(slot.clone())
    }

    /// Charge `n` bytes against the allocation ceiling.
    pub fn consume(&mut self, n: usize) -> Result<()> {
        self.consumed = self.consumed.saturating_add(n);
        if self.consumed > self.limit {
            return Err(Error::QuotaExceeded {
                limit: self.limit,
                requested: self.consumed,
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn reset(&mut self, limit: usize) {
        self.slots.clear();
        self.consumed = 0;
        self.limit = limit;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{builtin, new_object, TypeIdent, Value};

    fn obj(n: u32) -> ObjRef {
        new_object(TypeIdent::BuiltinDef(builtin::ANY), Value::U32(n))
    }

    #[test]
    fn test_encode_identity_by_reference() {
        let mut sess = EncodeSession::new();
        let a = obj(1);
        let a_alias = a.clone();
        let twin = obj(1);

        assert_eq!(sess.lookup(&a), None);
        assert_eq!(sess.allocate(&a), 0);
        assert_eq!(sess.lookup(&a_alias), Some(0));
        // Structurally equal but distinct objects get distinct indices.
        assert_eq!(sess.lookup(&twin), None);
        assert_eq!(sess.allocate(&twin), 1);
    }

    #[test]
    fn test_encode_reset() {
        let mut sess = EncodeSession::new();
        let a = obj(1);
        sess.allocate(&a);
        sess.reset();
        assert!(sess.is_empty());
        assert_eq!(sess.lookup(&a), None);
    }

    #[test]
    fn test_decode_slot_contract() {
        let mut sess = DecodeSession::new(usize::MAX);
        let slot = sess.allocate();

        // Uninitialized slot: a back-reference is a cycle error.
        assert!(matches!(
            sess.get(0, 9),
            Err(Error::Malformed { offset: 9, .. })
        ));

        // Out of range is also malformed.
        assert!(matches!(sess.get(5, 0), Err(Error::Malformed { .. })));

        slot.borrow_mut().ty = Some(TypeIdent::BuiltinDef(builtin::ANY));
        let resolved = sess.get(0, 0).expect("initialized slot resolves");
        assert!(Rc::ptr_eq(&resolved, &slot));
    }

    #[test]
    fn test_decode_budget() {
        let mut sess = DecodeSession::new(100);
        sess.consume(60).expect("within budget");
        sess.consume(40).expect("exactly at budget");
        let err = sess.consume(1).unwrap_err();
        assert!(matches!(
            err,
            Error::QuotaExceeded {
                limit: 100,
                requested: 101
            }
        ));
    }

    #[test]
    fn test_decode_reset() {
        let mut sess = DecodeSession::new(10);
        sess.allocate();
        let _ = sess.consume(8);
        sess.reset(1000);
        assert!(sess.is_empty());
        sess.consume(500).expect("budget replaced on reset");
    }
}
