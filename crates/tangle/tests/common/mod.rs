// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared fixture: a small registered type space used across the
//! integration tests.

use std::collections::HashMap;
use std::sync::Arc;
use tangle::model::{
    builtin, FieldSpec, PackageDef, TypeDef, TypeIdent, TypeRegistry, Value,
};

pub struct Fixture {
    pub registry: Arc<TypeRegistry>,
    /// Open (non-sealed) class with a self-typed `next` field and an i32
    /// `value` field.
    pub node: TypeIdent,
    /// Sealed class with a single u32 field `n`.
    pub leaf: TypeIdent,
    /// u8-backed enum {A=0, B=1, C=2}.
    pub color: TypeIdent,
    /// Blittable value struct {a: u32, b: u8}, declared size 5.
    pub packed: TypeIdent,
    /// Value struct {x: i32, y: i32} without declared layout.
    pub point: TypeIdent,
}

pub fn fixture() -> Fixture {
    let registry = Arc::new(TypeRegistry::new());
    registry.register_package(PackageDef::new("demo", [1, 0, 0, 0]));

    let node = TypeIdent::NamedDef {
        full_name: "demo.Node".into(),
        package: tangle::model::PackageIdent::Named {
            name: "demo".into(),
            version: [1, 0, 0, 0],
        },
    };
    registry.register_type(
        TypeDef::class("demo", "demo.Node")
            .with_field(FieldSpec::new("value", TypeIdent::BuiltinDef(builtin::I32)))
            .with_field(FieldSpec::new("next", node.clone())),
    );

    let leaf = registry.register_type(
        TypeDef::class("demo", "demo.Leaf")
            .sealed()
            .with_field(FieldSpec::new("n", TypeIdent::BuiltinDef(builtin::U32))),
    );

    let color = registry.register_type(TypeDef::enumeration(
        "demo",
        "demo.Color",
        builtin::U8,
        vec![("A".into(), 0), ("B".into(), 1), ("C".into(), 2)],
    ));

    let packed = registry.register_type(
        TypeDef::value_struct("demo", "demo.Packed")
            .with_field(FieldSpec::new("a", TypeIdent::BuiltinDef(builtin::U32)))
            .with_field(FieldSpec::new("b", TypeIdent::BuiltinDef(builtin::U8)))
            .with_layout(5),
    );

    let point = registry.register_type(
        TypeDef::value_struct("demo", "demo.Point")
            .with_field(FieldSpec::new("x", TypeIdent::BuiltinDef(builtin::I32)))
            .with_field(FieldSpec::new("y", TypeIdent::BuiltinDef(builtin::I32))),
    );

    Fixture {
        registry,
        node,
        leaf,
        color,
        packed,
        point,
    }
}

pub fn struct_value(entries: &[(&str, Value)]) -> Value {
    let mut fields = HashMap::new();
    for (name, value) in entries {
        fields.insert((*name).to_string(), value.clone());
    }
    Value::Struct(fields)
}

pub fn leaf_value(n: u32) -> Value {
    struct_value(&[("n", Value::U32(n))])
}
