// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The reference engine.
//!
//! Every reference-typed slot carries a varuint tag: 0 for null, 1 for a
//! first encounter, i + 2 for a back-reference to identity index i. A first
//! encounter registers the object's identity *before* its payload is
//! written, so children can refer back to it; decode mirrors this by
//! allocating the slot before the payload decodes. When the slot's static
//! type is effectively sealed (a sealed definition, or an array of sealed
//! elements) the dynamic type tag is elided and the payload is decoded
//! under the static type.

use crate::error::{Error, Result};
use crate::fmt::Formatter;
use crate::kernel::Serializer;
use crate::model::{ObjRef, TypeIdent, Value};
use crate::session::{DecodeSession, EncodeSession, OBJECT_OVERHEAD_BYTES};
use crate::wire::{Reader, Writer};

/// Reference tag for a null slot.
pub const TAG_NULL: u64 = 0;
/// Reference tag for a first-encountered object.
pub const TAG_NEW: u64 = 1;
/// Back-references encode as identity index + 2.
pub const BACK_BASE: u64 = 2;

/// Identity- and cycle-preserving formatter over a reference-typed slot.
pub struct RefFormatter {
    declared: TypeIdent,
    sealed: bool,
}

impl RefFormatter {
    pub fn new(declared: TypeIdent, sealed: bool) -> Self {
        Self { declared, sealed }
    }
}

impl Formatter for RefFormatter {
    fn encode(
        &self,
        ser: &Serializer,
        sess: &mut EncodeSession,
        w: &mut Writer,
        value: &Value,
    ) -> Result<()> {
        let obj = match value {
            Value::Null => {
                w.write_varu64(TAG_NULL);
                return Ok(());
            }
            Value::Object(obj) => obj,
            other => {
                return Err(Error::InvalidValue {
                    reason: format!(
                        "reference slot of type {} requires an object or null, got {}",
                        self.declared,
                        other.kind_name()
                    ),
                })
            }
        };

        if let Some(index) = sess.lookup(obj) {
            w.write_varu64(u64::from(index) + BACK_BASE);
            return Ok(());
        }

        w.write_varu64(TAG_NEW);
        // Identity is assigned before the payload is written, so children
        // that point back at this object find it in the table.
        sess.allocate(obj);

        let cell = obj.borrow();
        let dyn_ty = cell.ty.as_ref().ok_or_else(|| Error::InvalidValue {
            reason: "object cell has no dynamic type".into(),
        })?;
        let content_ty = if self.sealed {
            &self.declared
        } else {
            ser.ident_codec().encode_type(w, dyn_ty)?;
            dyn_ty
        };
        ser.content_formatter(content_ty)?
            .encode(ser, sess, w, &cell.body)
    }

    fn decode(
        &self,
        ser: &Serializer,
        sess: &mut DecodeSession,
        r: &mut Reader<'_>,
    ) -> Result<Value> {
        let at = r.offset();
        match r.read_varu64()? {
            TAG_NULL => Ok(Value::Null),
            TAG_NEW => {
                let obj = sess.allocate();
                sess.consume(OBJECT_OVERHEAD_BYTES)?;
                let dyn_ty = if self.sealed {
                    self.declared.clone()
                } else {
                    ser.ident_codec().decode_type(r)?
                };
                let content = ser.content_formatter(&dyn_ty)?;
                dispatch(ser, sess, r, content.as_ref(), &obj, &dyn_ty)?;
                if !obj.borrow().is_init() {
                    return Err(Error::malformed(
                        at,
                        "content formatter did not initialize its slot",
                    ));
                }
                Ok(Value::Object(obj))
            }
            tag => Ok(Value::Object(sess.get(tag - BACK_BASE, at)?)),
        }
    }
}

/// Drive a content formatter over an allocated slot.
///
/// Read-only inline aggregates cannot contain references to their own box,
/// so their value is constructed first and then placed. Everything else
/// (class bodies, mutable boxed aggregates) must initialize the cell in
/// place before nested decodes run, which the formatter's `decode_into`
/// guarantees.
fn dispatch(
    ser: &Serializer,
    sess: &mut DecodeSession,
    r: &mut Reader<'_>,
    content: &dyn Formatter,
    obj: &ObjRef,
    dyn_ty: &TypeIdent,
) -> Result<()> {
    let by_value =
        !ser.registry().is_reference(dyn_ty)? && ser.registry().is_readonly_aggregate(dyn_ty);
    if by_value {
        let value = content.decode(ser, sess, r)?;
        let mut cell = obj.borrow_mut();
        cell.ty = Some(dyn_ty.clone());
        cell.body = value;
        Ok(())
    } else {
        content.decode_into(ser, sess, r, obj, dyn_ty)
    }
}
