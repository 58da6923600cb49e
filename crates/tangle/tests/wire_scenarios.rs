// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Literal wire-format checks: exact bytes for primitives, varints, enums,
//! reference tags, and the compact known-definition form.

mod common;

use common::{fixture, leaf_value};
use tangle::model::{builtin, new_object, TypeIdent, Value};
use tangle::session::{DecodeSession, EncodeSession};
use tangle::wire::{Reader, Writer};
use tangle::{Config, Serializer};

#[test]
fn test_u32_encodes_little_endian() {
    let fx = fixture();
    let ser = Serializer::new(fx.registry);
    let ty = TypeIdent::BuiltinDef(builtin::U32);

    let bytes = ser
        .encode_value(&ty, &Value::U32(0x0102_0304))
        .expect("encode u32");
    assert_eq!(bytes, [0x04, 0x03, 0x02, 0x01]);

    let back = ser.decode_value(&ty, &bytes).expect("decode u32");
    assert_eq!(back, Value::U32(0x0102_0304));
}

#[test]
fn test_varuint_boundary() {
    let mut w = Writer::new();
    w.write_varu64(127);
    assert_eq!(w.as_slice(), &[0x7F]);

    let mut w = Writer::new();
    w.write_varu64(128);
    assert_eq!(w.as_slice(), &[0x80, 0x01]);
}

#[test]
fn test_zigzag_small_values() {
    for (value, expected) in [(-1i64, 0x01u8), (1, 0x02), (-2, 0x03)] {
        let mut w = Writer::new();
        w.write_vari64(value);
        assert_eq!(w.as_slice(), &[expected]);
    }
}

#[test]
fn test_enum_over_u8_is_one_byte() {
    let fx = fixture();
    let ser = Serializer::new(fx.registry);

    let bytes = ser
        .encode_value(&fx.color, &Value::Enum(2))
        .expect("encode enum");
    assert_eq!(bytes, [0x02]);

    let back = ser.decode_value(&fx.color, &bytes).expect("decode enum");
    assert_eq!(back, Value::Enum(2));
}

#[test]
fn test_shared_reference_slots_new_new_back() {
    // Three reference slots [a, b, a]: the first two are fresh encounters,
    // the third is a back-reference to identity index 0 (varuint 2).
    let fx = fixture();
    let ser = Serializer::new(fx.registry);

    let a = new_object(fx.leaf.clone(), leaf_value(7));
    let b = new_object(fx.leaf.clone(), leaf_value(8));
    let seq = Value::Seq(vec![
        Value::Object(a.clone()),
        Value::Object(b),
        Value::Object(a),
    ]);

    let arr_ty = TypeIdent::sz_array(TypeIdent::BuiltinDef(builtin::ANY));
    let f = ser.content_formatter(&arr_ty).expect("array formatter");

    let mut sess = EncodeSession::new();
    let mut w = Writer::new();
    f.encode(&ser, &mut sess, &mut w, &seq).expect("encode");
    let bytes = w.into_bytes();

    // varuint element count, then the first slot's NEW tag.
    assert_eq!(bytes[0], 0x03);
    assert_eq!(bytes[1], 0x01);
    // The final slot is a bare back-reference to index 0.
    assert_eq!(*bytes.last().expect("nonempty"), 0x02);

    let mut sess = DecodeSession::new(usize::MAX);
    let mut r = Reader::new(&bytes);
    let out = f.decode(&ser, &mut sess, &mut r).expect("decode");
    assert!(r.is_eof());

    let Value::Seq(items) = out else {
        panic!("expected sequence, got {}", out.kind_name());
    };
    let first = items[0].as_object().expect("object slot");
    let second = items[1].as_object().expect("object slot");
    let third = items[2].as_object().expect("object slot");
    assert!(std::rc::Rc::ptr_eq(first, third));
    assert!(!std::rc::Rc::ptr_eq(first, second));
}

#[test]
fn test_null_reference_is_single_zero_byte() {
    let fx = fixture();
    let ser = Serializer::new(fx.registry);

    let bytes = ser
        .encode_value(&fx.node, &Value::Null)
        .expect("encode null");
    assert_eq!(bytes, [0x00]);
    let back = ser.decode_value(&fx.node, &bytes).expect("decode null");
    assert_eq!(back, Value::Null);
}

#[test]
fn test_trusted_package_type_tag_is_compact() {
    let fx = fixture();
    let untrusted = Serializer::new(fx.registry.clone());
    let trusted = Serializer::with_config(
        Config::new().with_known_package("demo"),
        fx.registry.clone(),
    );

    let any = TypeIdent::BuiltinDef(builtin::ANY);
    let make = || Value::Object(new_object(fx.leaf.clone(), leaf_value(1)));

    let long = untrusted.encode_value(&any, &make()).expect("long form");
    let short = trusted.encode_value(&any, &make()).expect("short form");
    // NEW tag + tag byte + 8-byte hash + payload beats the dotted name.
    assert!(short.len() < long.len());

    let back = trusted.decode_value(&any, &short).expect("decode short");
    let obj = back.as_object().expect("object");
    assert_eq!(obj.borrow().ty.as_ref(), Some(&fx.leaf));
}

#[test]
fn test_trailing_data_is_malformed() {
    let fx = fixture();
    let ser = Serializer::new(fx.registry);
    let ty = TypeIdent::BuiltinDef(builtin::U32);

    let err = ser
        .decode_value(&ty, &[0x01, 0x00, 0x00, 0x00, 0xFF])
        .unwrap_err();
    assert!(matches!(err, tangle::Error::Malformed { offset: 4, .. }));
}
