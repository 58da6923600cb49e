// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Wire codec for type, package, and method identities.
//!
//! Type identities pack a 3-bit case tag into the low bits of one byte and a
//! 5-bit inline number (rank − 1, parameter index) into the high bits,
//! followed by operands in a fixed order. The inline field carries values
//! 0..=30 directly; 31 escapes to a following varuint. Decode resolves every
//! identity against the registered type space before returning, so an
//! undecodable name surfaces as *type-not-found* at the point of use.

mod method_codec;
mod type_codec;

pub use type_codec::known_type_hash;

use crate::error::Result;
use crate::model::{PackageLoader, TypeIdent, TypeRegistry};
use crate::names::NameMap;
use crate::wire::{Reader, Writer};
use std::sync::Arc;

// Type identity case tags (low 3 bits).
pub(crate) const TAG_SZ_ARRAY: u8 = 0;
pub(crate) const TAG_ARRAY: u8 = 1;
pub(crate) const TAG_TYPE_PARAM: u8 = 2;
pub(crate) const TAG_METHOD_PARAM: u8 = 3;
pub(crate) const TAG_CONSTRUCTED: u8 = 4;
pub(crate) const TAG_BUILTIN_DEF: u8 = 5;
pub(crate) const TAG_KNOWN_DEF: u8 = 6;
pub(crate) const TAG_NAMED_DEF: u8 = 7;

/// Inline-number escape: the 5-bit field is exhausted, a varuint follows.
pub(crate) const INLINE_ESCAPE: u8 = 31;

/// Write a tag byte, spilling large inline numbers into a varuint.
pub(crate) fn write_tag(w: &mut Writer, case: u8, inline: u64) {
    if inline < u64::from(INLINE_ESCAPE) {
        w.write_u8(case | ((inline as u8) << 3));
    } else {
        w.write_u8(case | (INLINE_ESCAPE << 3));
        w.write_varu64(inline);
    }
}

/// Read a tag byte back into (case, inline number).
pub(crate) fn read_tag(r: &mut Reader<'_>) -> Result<(u8, u64)> {
    let byte = r.read_u8()?;
    let case = byte & 0x07;
    let inline = byte >> 3;
    if inline == INLINE_ESCAPE {
        Ok((case, r.read_varu64()?))
    } else {
        Ok((case, u64::from(inline)))
    }
}

/// Identity codec bound to a type space and its trust lists.
pub struct IdentCodec {
    registry: Arc<TypeRegistry>,
    known_packages: NameMap<String>,
    known_types: NameMap<TypeIdent>,
    loader: Option<PackageLoader>,
}

impl IdentCodec {
    /// Build the codec, hashing the trusted packages and every registered
    /// type they contain. The known-type hash input is
    /// `package-name "/" type-full-name`.
    pub fn new(
        registry: Arc<TypeRegistry>,
        known_package_names: &[String],
        loader: Option<PackageLoader>,
    ) -> Self {
        let known_packages =
            NameMap::build(known_package_names.iter().cloned(), |name| name.clone());

        let trusted: Vec<(TypeIdent, String)> = registry
            .all_types()
            .into_iter()
            .filter(|(_, def)| known_package_names.iter().any(|p| *p == def.package))
            .map(|(ident, def)| (ident, format!("{}/{}", def.package, def.full_name)))
            .collect();
        let names: std::collections::HashMap<TypeIdent, String> = trusted
            .iter()
            .map(|(ident, name)| (ident.clone(), name.clone()))
            .collect();
        let known_types = NameMap::build(
            trusted.into_iter().map(|(ident, _)| ident),
            move |ident| names[ident].clone(),
        );

        Self {
            registry,
            known_packages,
            known_types,
            loader,
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub(crate) fn known_packages(&self) -> &NameMap<String> {
        &self.known_packages
    }

    pub(crate) fn known_types(&self) -> &NameMap<TypeIdent> {
        &self.known_types
    }

    pub(crate) fn loader(&self) -> Option<&PackageLoader> {
        self.loader.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip_inline() {
        let mut w = Writer::new();
        write_tag(&mut w, TAG_ARRAY, 3);
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), 1);
        let mut r = Reader::new(&bytes);
        assert_eq!(read_tag(&mut r).expect("tag"), (TAG_ARRAY, 3));
    }

    #[test]
    fn test_tag_roundtrip_escaped() {
        let mut w = Writer::new();
        write_tag(&mut w, TAG_TYPE_PARAM, 200);
        let bytes = w.into_bytes();
        assert!(bytes.len() > 1);
        let mut r = Reader::new(&bytes);
        assert_eq!(read_tag(&mut r).expect("tag"), (TAG_TYPE_PARAM, 200));
    }

    #[test]
    fn test_tag_boundary_at_escape() {
        // 30 fits inline; 31 must escape.
        let mut w = Writer::new();
        write_tag(&mut w, TAG_ARRAY, 30);
        assert_eq!(w.len(), 1);

        let mut w = Writer::new();
        write_tag(&mut w, TAG_ARRAY, 31);
        assert_eq!(w.len(), 2);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(read_tag(&mut r).expect("tag"), (TAG_ARRAY, 31));
    }
}
