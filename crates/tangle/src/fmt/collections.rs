// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Array, byte-run, and collection formatters.
//!
//! Every element and key/value slot goes through the formatter of its
//! declared element type, so reference-typed elements get the full
//! identity-preserving treatment. Sequence shells are installed in the
//! object cell before elements decode, which is what lets an element point
//! back at its own container.

use super::{mismatch, Formatter, Resolver};
use crate::error::{Error, Result};
use crate::kernel::Serializer;
use crate::model::{builtin, ObjRef, TypeBody, TypeIdent, Value};
use crate::session::{DecodeSession, EncodeSession};
use crate::wire::{Reader, Writer};
use std::sync::Arc;

/// Single-dimensional element runs: arrays, lists, queues, stacks, sets,
/// their immutable kinds, and registered add-collections. Wire form is a
/// varuint count followed by the elements.
pub struct SequenceFormatter {
    elem: TypeIdent,
}

impl SequenceFormatter {
    pub fn new(elem: TypeIdent) -> Self {
        Self { elem }
    }
}

impl Formatter for SequenceFormatter {
    fn encode(
        &self,
        ser: &Serializer,
        sess: &mut EncodeSession,
        w: &mut Writer,
        value: &Value,
    ) -> Result<()> {
        let Value::Seq(items) = value else {
            return Err(mismatch("sequence", value));
        };
        let f = ser.formatter_for(&self.elem)?;
        w.write_varu64(items.len() as u64);
        for item in items {
            f.encode(ser, sess, w, item)?;
        }
        Ok(())
    }

    fn decode(
        &self,
        ser: &Serializer,
        sess: &mut DecodeSession,
        r: &mut Reader<'_>,
    ) -> Result<Value> {
        let count = r.read_varu64()? as usize;
        sess.consume(count)?;
        let f = ser.formatter_for(&self.elem)?;
        let mut items = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            items.push(f.decode(ser, sess, r)?);
        }
        Ok(Value::Seq(items))
    }

    fn decode_into(
        &self,
        ser: &Serializer,
        sess: &mut DecodeSession,
        r: &mut Reader<'_>,
        obj: &ObjRef,
        ty: &TypeIdent,
    ) -> Result<()> {
        {
            let mut cell = obj.borrow_mut();
            cell.ty = Some(ty.clone());
            cell.body = Value::Seq(Vec::new());
        }
        let count = r.read_varu64()? as usize;
        sess.consume(count)?;
        let f = ser.formatter_for(&self.elem)?;
        for _ in 0..count {
            let item = f.decode(ser, sess, r)?;
            if let Value::Seq(items) = &mut obj.borrow_mut().body {
                items.push(item);
            }
        }
        Ok(())
    }
}

/// Multi-dimensional arrays: per-dimension varuint lengths, then varuint
/// lower bounds, then row-major elements.
pub struct NdArrayFormatter {
    rank: u8,
    elem: TypeIdent,
}

impl NdArrayFormatter {
    pub fn new(rank: u8, elem: TypeIdent) -> Self {
        Self { rank, elem }
    }

    fn read_header(&self, r: &mut Reader<'_>) -> Result<(Vec<u32>, Vec<u32>, usize)> {
        let at = r.offset();
        let mut lens = Vec::with_capacity(usize::from(self.rank));
        for _ in 0..self.rank {
            lens.push(r.read_varu32()?);
        }
        let mut lowers = Vec::with_capacity(usize::from(self.rank));
        for _ in 0..self.rank {
            lowers.push(r.read_varu32()?);
        }
        let mut total: u64 = 1;
        for len in &lens {
            total = total
                .checked_mul(u64::from(*len))
                .ok_or_else(|| Error::malformed(at, "array extent overflows"))?;
        }
        let total = usize::try_from(total)
            .map_err(|_| Error::malformed(at, "array extent overflows"))?;
        Ok((lens, lowers, total))
    }
}

impl Formatter for NdArrayFormatter {
    fn encode(
        &self,
        ser: &Serializer,
        sess: &mut EncodeSession,
        w: &mut Writer,
        value: &Value,
    ) -> Result<()> {
        let Value::NdArray { lens, lowers, elems } = value else {
            return Err(mismatch("multi-dimensional array", value));
        };
        if lens.len() != usize::from(self.rank) || lowers.len() != usize::from(self.rank) {
            return Err(Error::InvalidValue {
                reason: format!(
                    "array has {} dimensions, type has rank {}",
                    lens.len(),
                    self.rank
                ),
            });
        }
        let expected: u64 = lens.iter().map(|l| u64::from(*l)).product();
        if expected != elems.len() as u64 {
            return Err(Error::InvalidValue {
                reason: format!(
                    "array holds {} elements, extents require {}",
                    elems.len(),
                    expected
                ),
            });
        }
        for len in lens {
            w.write_varu64(u64::from(*len));
        }
        for lower in lowers {
            w.write_varu64(u64::from(*lower));
        }
        let f = ser.formatter_for(&self.elem)?;
        for elem in elems {
            f.encode(ser, sess, w, elem)?;
        }
        Ok(())
    }

    fn decode(
        &self,
        ser: &Serializer,
        sess: &mut DecodeSession,
        r: &mut Reader<'_>,
    ) -> Result<Value> {
        let (lens, lowers, total) = self.read_header(r)?;
        sess.consume(total)?;
        let f = ser.formatter_for(&self.elem)?;
        let mut elems = Vec::with_capacity(total.min(4096));
        for _ in 0..total {
            elems.push(f.decode(ser, sess, r)?);
        }
        Ok(Value::NdArray { lens, lowers, elems })
    }

    fn decode_into(
        &self,
        ser: &Serializer,
        sess: &mut DecodeSession,
        r: &mut Reader<'_>,
        obj: &ObjRef,
        ty: &TypeIdent,
    ) -> Result<()> {
        let (lens, lowers, total) = self.read_header(r)?;
        sess.consume(total)?;
        {
            let mut cell = obj.borrow_mut();
            cell.ty = Some(ty.clone());
            cell.body = Value::NdArray {
                lens,
                lowers,
                elems: Vec::new(),
            };
        }
        let f = ser.formatter_for(&self.elem)?;
        for _ in 0..total {
            let item = f.decode(ser, sess, r)?;
            if let Value::NdArray { elems, .. } = &mut obj.borrow_mut().body {
                elems.push(item);
            }
        }
        Ok(())
    }
}

/// Contiguous byte runs (memory views): varuint length plus a raw copy.
pub struct ByteRunFormatter;

impl Formatter for ByteRunFormatter {
    fn encode(
        &self,
        _ser: &Serializer,
        _sess: &mut EncodeSession,
        w: &mut Writer,
        value: &Value,
    ) -> Result<()> {
        let Value::Bytes(bytes) = value else {
            return Err(mismatch("bytes", value));
        };
        w.write_varu64(bytes.len() as u64);
        w.write_bytes(bytes);
        Ok(())
    }

    fn decode(
        &self,
        _ser: &Serializer,
        sess: &mut DecodeSession,
        r: &mut Reader<'_>,
    ) -> Result<Value> {
        let len = r.read_varu64()? as usize;
        sess.consume(len)?;
        Ok(Value::Bytes(r.read_bytes(len)?.to_vec()))
    }
}

/// Key/value pair, written back to back with no framing.
pub struct PairFormatter {
    key: TypeIdent,
    val: TypeIdent,
}

impl PairFormatter {
    pub fn new(key: TypeIdent, val: TypeIdent) -> Self {
        Self { key, val }
    }
}

impl Formatter for PairFormatter {
    fn encode(
        &self,
        ser: &Serializer,
        sess: &mut EncodeSession,
        w: &mut Writer,
        value: &Value,
    ) -> Result<()> {
        let Value::Seq(items) = value else {
            return Err(mismatch("pair", value));
        };
        if items.len() != 2 {
            return Err(Error::InvalidValue {
                reason: format!("pair holds {} values", items.len()),
            });
        }
        ser.formatter_for(&self.key)?.encode(ser, sess, w, &items[0])?;
        ser.formatter_for(&self.val)?.encode(ser, sess, w, &items[1])
    }

    fn decode(
        &self,
        ser: &Serializer,
        sess: &mut DecodeSession,
        r: &mut Reader<'_>,
    ) -> Result<Value> {
        let key = ser.formatter_for(&self.key)?.decode(ser, sess, r)?;
        let val = ser.formatter_for(&self.val)?.decode(ser, sess, r)?;
        Ok(Value::Seq(vec![key, val]))
    }

    fn decode_into(
        &self,
        ser: &Serializer,
        sess: &mut DecodeSession,
        r: &mut Reader<'_>,
        obj: &ObjRef,
        ty: &TypeIdent,
    ) -> Result<()> {
        // A boxed pair's key or value can point back at the box, so the
        // cell gets a placeholder pair before either side decodes.
        {
            let mut cell = obj.borrow_mut();
            cell.ty = Some(ty.clone());
            cell.body = Value::Seq(vec![Value::Null, Value::Null]);
        }
        let key = ser.formatter_for(&self.key)?.decode(ser, sess, r)?;
        if let Value::Seq(items) = &mut obj.borrow_mut().body {
            items[0] = key;
        }
        let val = ser.formatter_for(&self.val)?.decode(ser, sess, r)?;
        if let Value::Seq(items) = &mut obj.borrow_mut().body {
            items[1] = val;
        }
        Ok(())
    }
}

/// Keyed collections: varuint entry count, then key/value entries in order.
pub struct MapFormatter {
    key: TypeIdent,
    val: TypeIdent,
}

impl MapFormatter {
    pub fn new(key: TypeIdent, val: TypeIdent) -> Self {
        Self { key, val }
    }
}

impl Formatter for MapFormatter {
    fn encode(
        &self,
        ser: &Serializer,
        sess: &mut EncodeSession,
        w: &mut Writer,
        value: &Value,
    ) -> Result<()> {
        let Value::Map(entries) = value else {
            return Err(mismatch("map", value));
        };
        let kf = ser.formatter_for(&self.key)?;
        let vf = ser.formatter_for(&self.val)?;
        w.write_varu64(entries.len() as u64);
        for (k, v) in entries {
            kf.encode(ser, sess, w, k)?;
            vf.encode(ser, sess, w, v)?;
        }
        Ok(())
    }

    fn decode(
        &self,
        ser: &Serializer,
        sess: &mut DecodeSession,
        r: &mut Reader<'_>,
    ) -> Result<Value> {
        let count = r.read_varu64()? as usize;
        sess.consume(count.saturating_mul(2))?;
        let kf = ser.formatter_for(&self.key)?;
        let vf = ser.formatter_for(&self.val)?;
        let mut entries = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            let k = kf.decode(ser, sess, r)?;
            let v = vf.decode(ser, sess, r)?;
            entries.push((k, v));
        }
        Ok(Value::Map(entries))
    }

    fn decode_into(
        &self,
        ser: &Serializer,
        sess: &mut DecodeSession,
        r: &mut Reader<'_>,
        obj: &ObjRef,
        ty: &TypeIdent,
    ) -> Result<()> {
        {
            let mut cell = obj.borrow_mut();
            cell.ty = Some(ty.clone());
            cell.body = Value::Map(Vec::new());
        }
        let count = r.read_varu64()? as usize;
        sess.consume(count.saturating_mul(2))?;
        let kf = ser.formatter_for(&self.key)?;
        let vf = ser.formatter_for(&self.val)?;
        for _ in 0..count {
            let k = kf.decode(ser, sess, r)?;
            let v = vf.decode(ser, sess, r)?;
            if let Value::Map(entries) = &mut obj.borrow_mut().body {
                entries.push((k, v));
            }
        }
        Ok(())
    }
}

/// Arrays, rank-specialized.
pub struct ArrayResolver;

impl Resolver for ArrayResolver {
    fn resolve(&self, _ser: &Serializer, ty: &TypeIdent) -> Result<Option<Arc<dyn Formatter>>> {
        Ok(match ty {
            TypeIdent::SzArray(elem) => {
                Some(Arc::new(SequenceFormatter::new(elem.as_ref().clone())))
            }
            TypeIdent::Array { rank, elem } => Some(Arc::new(NdArrayFormatter::new(
                *rank,
                elem.as_ref().clone(),
            ))),
            _ => None,
        })
    }
}

/// Byte-run memory views.
pub struct ByteRunResolver;

impl Resolver for ByteRunResolver {
    fn resolve(&self, _ser: &Serializer, ty: &TypeIdent) -> Result<Option<Arc<dyn Formatter>>> {
        Ok(ty
            .is_builtin(builtin::BYTES)
            .then(|| Arc::new(ByteRunFormatter) as Arc<dyn Formatter>))
    }
}

fn constructed_over<'a>(ty: &'a TypeIdent, id: u16, arity: usize) -> Option<&'a [TypeIdent]> {
    match ty {
        TypeIdent::Constructed { def, args }
            if def.is_builtin(id) && args.len() == arity =>
        {
            Some(args)
        }
        _ => None,
    }
}

/// Per-kind immutable collection formatters.
pub struct ImmutableResolver;

impl Resolver for ImmutableResolver {
    fn resolve(&self, _ser: &Serializer, ty: &TypeIdent) -> Result<Option<Arc<dyn Formatter>>> {
        for id in [builtin::IMM_LIST, builtin::IMM_SET] {
            if let Some(args) = constructed_over(ty, id, 1) {
                return Ok(Some(Arc::new(SequenceFormatter::new(args[0].clone()))));
            }
        }
        if let Some(args) = constructed_over(ty, builtin::IMM_MAP, 2) {
            return Ok(Some(Arc::new(MapFormatter::new(
                args[0].clone(),
                args[1].clone(),
            ))));
        }
        Ok(None)
    }
}

/// Pair, list, queue, stack.
pub struct CommonCollectionResolver;

impl Resolver for CommonCollectionResolver {
    fn resolve(&self, _ser: &Serializer, ty: &TypeIdent) -> Result<Option<Arc<dyn Formatter>>> {
        if let Some(args) = constructed_over(ty, builtin::PAIR, 2) {
            return Ok(Some(Arc::new(PairFormatter::new(
                args[0].clone(),
                args[1].clone(),
            ))));
        }
        for id in [builtin::LIST, builtin::QUEUE, builtin::STACK] {
            if let Some(args) = constructed_over(ty, id, 1) {
                return Ok(Some(Arc::new(SequenceFormatter::new(args[0].clone()))));
            }
        }
        Ok(None)
    }
}

/// Keyed collections.
pub struct KeyedResolver;

impl Resolver for KeyedResolver {
    fn resolve(&self, _ser: &Serializer, ty: &TypeIdent) -> Result<Option<Arc<dyn Formatter>>> {
        if let Some(args) = constructed_over(ty, builtin::MAP, 2) {
            return Ok(Some(Arc::new(MapFormatter::new(
                args[0].clone(),
                args[1].clone(),
            ))));
        }
        if let Some(args) = constructed_over(ty, builtin::SET, 1) {
            return Ok(Some(Arc::new(SequenceFormatter::new(args[0].clone()))));
        }
        Ok(None)
    }
}

/// Registered generic collections with an add method.
pub struct AddCollectionResolver;

impl Resolver for AddCollectionResolver {
    fn resolve(&self, ser: &Serializer, ty: &TypeIdent) -> Result<Option<Arc<dyn Formatter>>> {
        let TypeIdent::Constructed { def, args } = ty else {
            return Ok(None);
        };
        if args.len() != 1 {
            return Ok(None);
        }
        let Some(type_def) = ser.registry().def_of(def) else {
            return Ok(None);
        };
        Ok(matches!(type_def.body, TypeBody::Collection)
            .then(|| Arc::new(SequenceFormatter::new(args[0].clone())) as Arc<dyn Formatter>))
    }
}
