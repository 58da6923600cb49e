// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dynamic values and reference-typed object cells.
//!
//! Inline data (primitives, strings, aggregates, sequences) lives directly in
//! a [`Value`]. Reference-typed data lives behind an [`ObjRef`]: a shared,
//! mutable cell carrying the object's dynamic type and body. Reference
//! identity is `Rc` pointer identity, never structural equality: two equal
//! strings are two values, but two clones of one `ObjRef` are one object.

use super::ident::TypeIdent;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// A reference-typed object: dynamic type plus body.
///
/// A freshly allocated decode slot holds an uninitialized cell (`ty` unset).
/// The content formatter must initialize the cell before any nested decode
/// can observe it; a back-reference that reads an uninitialized cell is a
/// wire-format error.
#[derive(Debug)]
pub struct ObjCell {
    pub ty: Option<TypeIdent>,
    pub body: Value,
}

impl ObjCell {
    pub fn uninit() -> Self {
        Self {
            ty: None,
            body: Value::Null,
        }
    }

    pub fn is_init(&self) -> bool {
        self.ty.is_some()
    }
}

/// Shared handle to an object cell. Cloning the handle shares the object.
pub type ObjRef = Rc<RefCell<ObjCell>>;

/// Allocate a new object with the given dynamic type and body.
pub fn new_object(ty: TypeIdent, body: Value) -> ObjRef {
    Rc::new(RefCell::new(ObjCell { ty: Some(ty), body }))
}

/// A dynamic value.
#[derive(Debug, Clone)]
pub enum Value {
    /// Null reference.
    Null,

    // Primitives
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    /// 128-bit decimal as four i32 words.
    Decimal([i32; 4]),
    /// UTF-16 code unit.
    Char16(u16),
    Str(String),
    Bytes(Vec<u8>),

    // Builtin value-type singletons
    Duration { secs: i64, nanos: i32 },
    Timestamp { secs: i64, nanos: u32 },
    Uuid([u8; 16]),
    I128(i128),
    U128(u128),
    Bits(Vec<bool>),

    /// Enum value as its underlying integer.
    Enum(i64),

    /// Inline aggregate: member name to member value.
    Struct(HashMap<String, Value>),

    /// Single-dimensional sequence (arrays, lists, queues, stacks, sets).
    Seq(Vec<Value>),

    /// Multi-dimensional array: per-dimension lengths and lower bounds,
    /// elements in row-major order.
    NdArray {
        lens: Vec<u32>,
        lowers: Vec<u32>,
        elems: Vec<Value>,
    },

    /// Keyed collection as ordered entries.
    Map(Vec<(Value, Value)>),

    /// Reference-typed object.
    Object(ObjRef),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_object(&self) -> Option<&ObjRef> {
        match self {
            Value::Object(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Struct(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[Value]> {
        match self {
            Value::Seq(items) => Some(items),
            _ => None,
        }
    }

    /// Short name of the variant, for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::U8(_) => "u8",
            Value::U16(_) => "u16",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::I8(_) => "i8",
            Value::I16(_) => "i16",
            Value::I32(_) => "i32",
            Value::I64(_) => "i64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Decimal(_) => "decimal",
            Value::Char16(_) => "char16",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Duration { .. } => "duration",
            Value::Timestamp { .. } => "timestamp",
            Value::Uuid(_) => "uuid",
            Value::I128(_) => "i128",
            Value::U128(_) => "u128",
            Value::Bits(_) => "bits",
            Value::Enum(_) => "enum",
            Value::Struct(_) => "struct",
            Value::Seq(_) => "seq",
            Value::NdArray { .. } => "ndarray",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
        }
    }
}

// Objects compare by reference identity; everything else is structural.
// Floats compare by bit pattern so NaN round-trips are observable.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::U8(a), Value::U8(b)) => a == b,
            (Value::U16(a), Value::U16(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a.to_bits() == b.to_bits(),
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::Char16(a), Value::Char16(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (
                Value::Duration { secs: s1, nanos: n1 },
                Value::Duration { secs: s2, nanos: n2 },
            ) => s1 == s2 && n1 == n2,
            (
                Value::Timestamp { secs: s1, nanos: n1 },
                Value::Timestamp { secs: s2, nanos: n2 },
            ) => s1 == s2 && n1 == n2,
            (Value::Uuid(a), Value::Uuid(b)) => a == b,
            (Value::I128(a), Value::I128(b)) => a == b,
            (Value::U128(a), Value::U128(b)) => a == b,
            (Value::Bits(a), Value::Bits(b)) => a == b,
            (Value::Enum(a), Value::Enum(b)) => a == b,
            (Value::Struct(a), Value::Struct(b)) => a == b,
            (Value::Seq(a), Value::Seq(b)) => a == b,
            (
                Value::NdArray {
                    lens: l1,
                    lowers: b1,
                    elems: e1,
                },
                Value::NdArray {
                    lens: l2,
                    lowers: b2,
                    elems: e2,
                },
            ) => l1 == l2 && b1 == b2 && e1 == e2,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Structural equality of two object graphs under a bijection of their
/// objects: shared sub-objects must be shared the same way on both sides and
/// cycles must align. This is the observational equality of the round-trip
/// laws.
pub fn graph_eq(a: &Value, b: &Value) -> bool {
    fn cells_eq(
        a: &ObjRef,
        b: &ObjRef,
        fwd: &mut HashMap<usize, usize>,
        rev: &mut HashMap<usize, usize>,
    ) -> bool {
        let pa = Rc::as_ptr(a) as usize;
        let pb = Rc::as_ptr(b) as usize;
        match (fwd.get(&pa), rev.get(&pb)) {
            (Some(&mapped), Some(&back)) => return mapped == pb && back == pa,
            (None, None) => {}
            _ => return false,
        }
        fwd.insert(pa, pb);
        rev.insert(pb, pa);
        let ca = a.borrow();
        let cb = b.borrow();
        ca.ty == cb.ty && values_eq(&ca.body, &cb.body, fwd, rev)
    }

    fn values_eq(
        a: &Value,
        b: &Value,
        fwd: &mut HashMap<usize, usize>,
        rev: &mut HashMap<usize, usize>,
    ) -> bool {
        match (a, b) {
            (Value::Object(ra), Value::Object(rb)) => cells_eq(ra, rb, fwd, rev),
            (Value::Struct(ma), Value::Struct(mb)) => {
                if ma.len() != mb.len() {
                    return false;
                }
                for (k, va) in ma {
                    let Some(vb) = mb.get(k) else { return false };
                    if !values_eq(va, vb, fwd, rev) {
                        return false;
                    }
                }
                true
            }
            (Value::Seq(xs), Value::Seq(ys)) => {
                xs.len() == ys.len()
                    && xs.iter().zip(ys).all(|(x, y)| values_eq(x, y, fwd, rev))
            }
            (
                Value::NdArray {
                    lens: l1,
                    lowers: b1,
                    elems: e1,
                },
                Value::NdArray {
                    lens: l2,
                    lowers: b2,
                    elems: e2,
                },
            ) => {
                l1 == l2
                    && b1 == b2
                    && e1.len() == e2.len()
                    && e1.iter().zip(e2).all(|(x, y)| values_eq(x, y, fwd, rev))
            }
            (Value::Map(xs), Value::Map(ys)) => {
                xs.len() == ys.len()
                    && xs.iter().zip(ys).all(|((ka, va), (kb, vb))| {
                        values_eq(ka, kb, fwd, rev) && values_eq(va, vb, fwd, rev)
                    })
            }
            _ => a == b,
        }
    }

    let mut fwd = HashMap::new();
    let mut rev = HashMap::new();
    values_eq(a, b, &mut fwd, &mut rev)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ident::builtin;

    fn any_ty() -> TypeIdent {
        TypeIdent::BuiltinDef(builtin::ANY)
    }

    #[test]
    fn test_object_equality_is_identity() {
        let a = new_object(any_ty(), Value::U32(1));
        let b = new_object(any_ty(), Value::U32(1));
        assert_eq!(Value::Object(a.clone()), Value::Object(a.clone()));
        assert_ne!(Value::Object(a), Value::Object(b));
    }

    #[test]
    fn test_graph_eq_sharing() {
        // [x, x] vs [y, y] are equal graphs; [x, x] vs [y, z] are not,
        // even when every leaf matches.
        let x = new_object(any_ty(), Value::U32(7));
        let shared = Value::Seq(vec![Value::Object(x.clone()), Value::Object(x)]);

        let y = new_object(any_ty(), Value::U32(7));
        let same_shape = Value::Seq(vec![Value::Object(y.clone()), Value::Object(y)]);

        let y2 = new_object(any_ty(), Value::U32(7));
        let z = new_object(any_ty(), Value::U32(7));
        let split = Value::Seq(vec![Value::Object(y2), Value::Object(z)]);

        assert!(graph_eq(&shared, &same_shape));
        assert!(!graph_eq(&shared, &split));
    }

    #[test]
    fn test_graph_eq_cycle() {
        let make_loop = || {
            let node = new_object(any_ty(), Value::Null);
            let mut fields = HashMap::new();
            fields.insert("next".to_string(), Value::Object(node.clone()));
            node.borrow_mut().body = Value::Struct(fields);
            Value::Object(node)
        };
        assert!(graph_eq(&make_loop(), &make_loop()));
    }

    #[test]
    fn test_float_equality_by_bits() {
        assert_eq!(Value::F64(f64::NAN), Value::F64(f64::NAN));
        assert_ne!(Value::F64(0.0), Value::F64(-0.0));
    }
}
