// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # Tangle - identity-preserving binary object-graph serializer
//!
//! Converts reference-typed, polymorphic object graphs to and from compact
//! byte sequences, preserving the whole graph exactly: shared sub-objects
//! stay shared after a round trip, cycles round-trip, polymorphic references
//! carry enough metadata to reconstruct their dynamic type, and provably
//! safe aggregates are copied field for field.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use tangle::model::{builtin, FieldSpec, TypeDef, TypeIdent, TypeRegistry, Value};
//! use tangle::Serializer;
//! use std::collections::HashMap;
//!
//! // Describe the types the serializer may encounter.
//! let registry = Arc::new(TypeRegistry::new());
//! let point = registry.register_type(
//!     TypeDef::value_struct("demo", "demo.Point")
//!         .with_field(FieldSpec::new("x", TypeIdent::BuiltinDef(builtin::I32)))
//!         .with_field(FieldSpec::new("y", TypeIdent::BuiltinDef(builtin::I32))),
//! );
//!
//! let ser = Serializer::new(registry);
//!
//! let mut fields = HashMap::new();
//! fields.insert("x".to_string(), Value::I32(3));
//! fields.insert("y".to_string(), Value::I32(-4));
//!
//! let bytes = ser.encode_value(&point, &Value::Struct(fields.clone())).unwrap();
//! let back = ser.decode_value(&point, &bytes).unwrap();
//! assert_eq!(back, Value::Struct(fields));
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                      Serializer (kernel)                     |
//! |   caches | session pools | encode/decode entry points        |
//! +--------------------------------------------------------------+
//! |  Reference engine (refs)   |  Resolver chain (fmt)           |
//! |  null/new/back tags,       |  arrays, collections, enums,    |
//! |  cycles, polymorphism      |  blittable copy, by-member      |
//! +--------------------------------------------------------------+
//! |  Identity codec (codec)    |  By-member plans (plan)         |
//! |  type/package/method wire  |  member selection, blittability |
//! +--------------------------------------------------------------+
//! |  Type space (model)  |  Sessions  |  Name map  |  Wire codec |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Guarantees
//!
//! - One identity index per object reachable in a top-level encode; later
//!   occurrences are back-references. Identity never crosses calls.
//! - Decode allocates a slot before its payload decodes, so cyclic children
//!   resolve without back-patching.
//! - The member plan used to encode a type is the plan used to decode it;
//!   there is no schema tolerance.
//! - All multi-byte scalars are little-endian.

/// Wire codec for type, package, and method identities.
pub mod codec;
/// Serializer configuration record.
pub mod config;
/// Failure taxonomy.
pub mod error;
/// Formatters and the resolver chain.
pub mod fmt;
/// Kernel facade: caches, pools, entry points.
pub mod kernel;
/// Type space, identities, and dynamic values.
pub mod model;
/// Well-known name maps.
pub mod names;
/// By-member plans (member selection, blittability).
pub mod plan;
/// Reference engine (identity, cycles, polymorphic dispatch).
pub mod refs;
/// Per-call session state.
pub mod session;
/// Buffer codec: little-endian scalars, varints, strings, raw runs.
pub mod wire;

pub use config::Config;
pub use error::{Error, Result};
pub use fmt::{Formatter, Resolver};
pub use kernel::Serializer;
pub use model::{TypeIdent, TypeRegistry, Value};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
