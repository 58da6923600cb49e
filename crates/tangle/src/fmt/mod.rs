// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Formatters and the resolver chain.
//!
//! A formatter encodes and decodes values of one type. A resolver, given a
//! type identity, produces a formatter or declines; resolvers are tried in
//! order and the first hit wins. Users prepend their own resolvers; the
//! built-in chain below covers arrays, byte runs, the collection kinds,
//! value-type singletons, blittable raw copy, enums, primitives, and, as
//! the last resort for registered aggregates, the by-member routine.

pub mod by_member;
pub mod collections;
pub mod generic;
pub mod primitives;
pub mod singletons;

use crate::error::{Error, Result};
use crate::kernel::Serializer;
use crate::model::{ObjRef, TypeIdent, Value};
use crate::session::{DecodeSession, EncodeSession};
use crate::wire::{Reader, Writer};
use std::sync::Arc;

/// Encodes and decodes values of one type.
pub trait Formatter: Send + Sync {
    fn encode(
        &self,
        ser: &Serializer,
        sess: &mut EncodeSession,
        w: &mut Writer,
        value: &Value,
    ) -> Result<()>;

    fn decode(
        &self,
        ser: &Serializer,
        sess: &mut DecodeSession,
        r: &mut Reader<'_>,
    ) -> Result<Value>;

    /// Decode into an already-allocated object cell.
    ///
    /// The default reads the whole value first and then initializes the
    /// cell; that is only sound for bodies that cannot reference their own
    /// cell. Formatters for self-referential bodies (aggregates, sequences,
    /// maps) override this to install a shell in the cell *before* any
    /// nested decode runs.
    fn decode_into(
        &self,
        ser: &Serializer,
        sess: &mut DecodeSession,
        r: &mut Reader<'_>,
        obj: &ObjRef,
        ty: &TypeIdent,
    ) -> Result<()> {
        let value = self.decode(ser, sess, r)?;
        let mut cell = obj.borrow_mut();
        cell.ty = Some(ty.clone());
        cell.body = value;
        Ok(())
    }
}

/// Produces a formatter for a type, or declines.
pub trait Resolver: Send + Sync {
    fn resolve(&self, ser: &Serializer, ty: &TypeIdent) -> Result<Option<Arc<dyn Formatter>>>;
}

/// The built-in resolver chain, in its fixed order.
pub fn builtin_resolvers() -> Vec<Arc<dyn Resolver>> {
    vec![
        Arc::new(CustomResolver),
        Arc::new(collections::ArrayResolver),
        Arc::new(collections::ByteRunResolver),
        Arc::new(collections::ImmutableResolver),
        Arc::new(collections::CommonCollectionResolver),
        Arc::new(singletons::SingletonResolver),
        Arc::new(collections::KeyedResolver),
        Arc::new(collections::AddCollectionResolver),
        Arc::new(by_member::BlittableResolver),
        Arc::new(primitives::EnumResolver),
        Arc::new(primitives::PrimitiveResolver),
        Arc::new(by_member::ByMemberResolver),
    ]
}

/// Per-type formatter overrides registered in the configuration.
struct CustomResolver;

impl Resolver for CustomResolver {
    fn resolve(&self, ser: &Serializer, ty: &TypeIdent) -> Result<Option<Arc<dyn Formatter>>> {
        Ok(ser.config().custom_formatters.get(ty).cloned())
    }
}

/// Encode-side mismatch between a value and the slot's declared type.
pub(crate) fn mismatch(expected: &str, value: &Value) -> Error {
    Error::InvalidValue {
        reason: format!("expected {} value, got {}", expected, value.kind_name()),
    }
}
