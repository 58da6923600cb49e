// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type and package identity encoding.

use super::{
    read_tag, write_tag, IdentCodec, TAG_ARRAY, TAG_BUILTIN_DEF, TAG_CONSTRUCTED, TAG_KNOWN_DEF,
    TAG_METHOD_PARAM, TAG_NAMED_DEF, TAG_SZ_ARRAY, TAG_TYPE_PARAM,
};
use crate::error::{Error, Result};
use crate::model::{PackageIdent, TypeIdent};
use crate::names::name_hash;
use crate::wire::{Reader, Writer};

impl IdentCodec {
    /// Encode a type identity. Named definitions inside trusted packages
    /// collapse to their 8-byte known-definition form.
    pub fn encode_type(&self, w: &mut Writer, ident: &TypeIdent) -> Result<()> {
        match ident {
            TypeIdent::SzArray(elem) => {
                write_tag(w, TAG_SZ_ARRAY, 0);
                self.encode_type(w, elem)
            }
            TypeIdent::Array { rank, elem } => {
                if *rank == 0 {
                    return Err(Error::InvalidValue {
                        reason: "array rank must be at least 1".into(),
                    });
                }
                write_tag(w, TAG_ARRAY, u64::from(*rank) - 1);
                self.encode_type(w, elem)
            }
            TypeIdent::TypeParam { index, parent } => {
                write_tag(w, TAG_TYPE_PARAM, u64::from(*index));
                self.encode_type(w, parent)
            }
            TypeIdent::MethodParam { index, parent } => {
                write_tag(w, TAG_METHOD_PARAM, u64::from(*index));
                self.encode_method(w, parent)
            }
            TypeIdent::Constructed { def, args } => {
                // The argument count is not transmitted; the definition's
                // arity fixes it on decode, so it must match here.
                let arity = self.registry().generic_arity_of(def)?;
                if args.len() != usize::from(arity) {
                    return Err(Error::InvalidValue {
                        reason: format!(
                            "{} takes {} type arguments, got {}",
                            def,
                            arity,
                            args.len()
                        ),
                    });
                }
                write_tag(w, TAG_CONSTRUCTED, 0);
                self.encode_type(w, def)?;
                for arg in args {
                    self.encode_type(w, arg)?;
                }
                Ok(())
            }
            TypeIdent::BuiltinDef(id) => {
                write_tag(w, TAG_BUILTIN_DEF, 0);
                w.write_varu64(u64::from(*id));
                Ok(())
            }
            TypeIdent::KnownDef(hash) => {
                write_tag(w, TAG_KNOWN_DEF, 0);
                w.write_u64_le(*hash);
                Ok(())
            }
            TypeIdent::NamedDef { full_name, package } => {
                if let Some(hash) = self.known_types().hash_of(ident) {
                    write_tag(w, TAG_KNOWN_DEF, 0);
                    w.write_u64_le(hash);
                    return Ok(());
                }
                write_tag(w, TAG_NAMED_DEF, 0);
                w.write_str(full_name);
                self.encode_package(w, package);
                Ok(())
            }
        }
    }

    /// Decode a type identity and resolve it against the type space. The
    /// returned identity is canonical, so it keys the formatter caches.
    pub fn decode_type(&self, r: &mut Reader<'_>) -> Result<TypeIdent> {
        let at = r.offset();
        let (case, inline) = read_tag(r)?;
        match case {
            TAG_SZ_ARRAY => Ok(TypeIdent::sz_array(self.decode_type(r)?)),
            TAG_ARRAY => {
                let rank = inline + 1;
                if rank > u64::from(u8::MAX) {
                    return Err(Error::malformed(at, "array rank out of range"));
                }
                Ok(TypeIdent::array(rank as u8, self.decode_type(r)?))
            }
            TAG_TYPE_PARAM => {
                let parent = self.decode_type(r)?;
                let arity = self.registry().generic_arity_of(&parent)?;
                if inline >= u64::from(arity) {
                    return Err(Error::TypeNotFound {
                        name: format!("{} has no formal parameter {}", parent, inline),
                    });
                }
                Ok(TypeIdent::TypeParam {
                    index: inline as u32,
                    parent: Box::new(parent),
                })
            }
            TAG_METHOD_PARAM => {
                let parent = self.decode_method(r)?;
                Ok(TypeIdent::MethodParam {
                    index: inline as u32,
                    parent: Box::new(parent),
                })
            }
            TAG_CONSTRUCTED => {
                let def = self.decode_type(r)?;
                let arity = self.registry().generic_arity_of(&def)?;
                let mut args = Vec::with_capacity(usize::from(arity));
                for _ in 0..arity {
                    args.push(self.decode_type(r)?);
                }
                Ok(TypeIdent::Constructed {
                    def: Box::new(def),
                    args,
                })
            }
            TAG_BUILTIN_DEF => {
                let id = r.read_varu16()?;
                Ok(TypeIdent::BuiltinDef(id))
            }
            TAG_KNOWN_DEF => {
                let hash = r.read_u64_le()?;
                self.known_types()
                    .by_hash(hash)
                    .cloned()
                    .ok_or_else(|| Error::TypeNotFound {
                        name: format!("known definition #{:016x}", hash),
                    })
            }
            TAG_NAMED_DEF => {
                let full_name = r.read_str()?;
                let package_name = self.decode_package(r)?;
                let def = self
                    .registry()
                    .type_def(&package_name, &full_name)
                    .ok_or_else(|| Error::TypeNotFound {
                        name: format!("{} in {}", full_name, package_name),
                    })?;
                Ok(self.registry().canonical_ident(&def))
            }
            _ => unreachable!("3-bit case tag"),
        }
    }

    /// Package identity: one bool (well-known?), then either the 8-byte hash
    /// or (name, four signed version varints).
    pub(crate) fn encode_package(&self, w: &mut Writer, package: &PackageIdent) {
        match package {
            PackageIdent::Known(hash) => {
                w.write_bool(true);
                w.write_u64_le(*hash);
            }
            PackageIdent::Named { name, version } => {
                if let Some(hash) = self.known_packages().hash_of(name) {
                    w.write_bool(true);
                    w.write_u64_le(hash);
                    return;
                }
                w.write_bool(false);
                w.write_str(name);
                for part in version {
                    w.write_vari32(*part);
                }
            }
        }
    }

    /// Decode a package identity down to a registered package name,
    /// consulting the loader for unknown named packages.
    pub(crate) fn decode_package(&self, r: &mut Reader<'_>) -> Result<String> {
        if r.read_bool()? {
            let hash = r.read_u64_le()?;
            return self
                .known_packages()
                .by_hash(hash)
                .cloned()
                .ok_or_else(|| Error::TypeNotFound {
                    name: format!("known package #{:016x}", hash),
                });
        }
        let name = r.read_str()?;
        let mut version = [0i32; 4];
        for part in &mut version {
            *part = r.read_vari32()?;
        }
        if self.registry().package(&name).is_none() {
            let loaded = self
                .loader()
                .and_then(|load| load(&name, version))
                .ok_or_else(|| Error::TypeNotFound {
                    name: format!(
                        "package {} {}.{}.{}.{}",
                        name, version[0], version[1], version[2], version[3]
                    ),
                })?;
            log::debug!("installing loader-provided package {}", name);
            self.registry().install(loaded);
        }
        Ok(name)
    }
}

/// Hash a trusted type's compact form the way the codec does.
pub fn known_type_hash(package: &str, full_name: &str) -> u64 {
    name_hash(&format!("{}/{}", package, full_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{builtin, FieldSpec, LoadedPackage, PackageDef, TypeDef, TypeRegistry};
    use std::sync::Arc;

    fn codec_with(known: &[&str]) -> (Arc<TypeRegistry>, IdentCodec) {
        let registry = Arc::new(TypeRegistry::new());
        registry.register_package(PackageDef::new("acme", [1, 2, 3, 4]));
        registry.register_type(
            TypeDef::class("acme", "acme.Widget")
                .with_field(FieldSpec::new("id", TypeIdent::BuiltinDef(builtin::U32))),
        );
        registry.register_type(TypeDef::class("acme", "acme.Wrapper").with_generic_arity(1));
        let known: Vec<String> = known.iter().map(|s| s.to_string()).collect();
        let codec = IdentCodec::new(registry.clone(), &known, None);
        (registry, codec)
    }

    fn roundtrip(codec: &IdentCodec, ident: &TypeIdent) -> TypeIdent {
        let mut w = Writer::new();
        codec.encode_type(&mut w, ident).expect("encode type");
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let out = codec.decode_type(&mut r).expect("decode type");
        assert!(r.is_eof(), "codec must consume its own bytes");
        out
    }

    #[test]
    fn test_builtin_roundtrip() {
        let (_, codec) = codec_with(&[]);
        let ident = TypeIdent::BuiltinDef(builtin::U32);
        assert_eq!(roundtrip(&codec, &ident), ident);
    }

    #[test]
    fn test_array_roundtrip() {
        let (_, codec) = codec_with(&[]);
        let sz = TypeIdent::sz_array(TypeIdent::BuiltinDef(builtin::STRING));
        assert_eq!(roundtrip(&codec, &sz), sz);

        let nd = TypeIdent::array(3, TypeIdent::BuiltinDef(builtin::F64));
        assert_eq!(roundtrip(&codec, &nd), nd);
    }

    #[test]
    fn test_named_def_roundtrip_untrusted() {
        let (registry, codec) = codec_with(&[]);
        let def = registry
            .type_def("acme", "acme.Widget")
            .expect("widget registered");
        let ident = registry.canonical_ident(&def);
        assert_eq!(roundtrip(&codec, &ident), ident);
    }

    #[test]
    fn test_trusted_package_collapses_to_hash() {
        let (registry, codec) = codec_with(&["acme"]);
        let def = registry
            .type_def("acme", "acme.Widget")
            .expect("widget registered");
        let ident = registry.canonical_ident(&def);

        let mut w = Writer::new();
        codec.encode_type(&mut w, &ident).expect("encode type");
        let bytes = w.into_bytes();
        // Tag byte + 8-byte hash, nothing else.
        assert_eq!(bytes.len(), 9);
        assert_eq!(bytes[0] & 0x07, TAG_KNOWN_DEF);
        let hash = u64::from_le_bytes(bytes[1..9].try_into().expect("8 bytes"));
        assert_eq!(hash, known_type_hash("acme", "acme.Widget"));

        let mut r = Reader::new(&bytes);
        assert_eq!(codec.decode_type(&mut r).expect("decode"), ident);
    }

    #[test]
    fn test_constructed_arity_not_transmitted() {
        let (registry, codec) = codec_with(&[]);
        let def = registry
            .type_def("acme", "acme.Wrapper")
            .expect("wrapper registered");
        let wrapper = registry.canonical_ident(&def);
        let closed = TypeIdent::constructed(
            wrapper,
            vec![TypeIdent::BuiltinDef(builtin::U32)],
        );
        assert_eq!(roundtrip(&codec, &closed), closed);

        let list = TypeIdent::constructed(
            TypeIdent::BuiltinDef(builtin::MAP),
            vec![
                TypeIdent::BuiltinDef(builtin::STRING),
                TypeIdent::BuiltinDef(builtin::U64),
            ],
        );
        assert_eq!(roundtrip(&codec, &list), list);
    }

    #[test]
    fn test_type_param_validates_arity() {
        let (registry, codec) = codec_with(&[]);
        let def = registry
            .type_def("acme", "acme.Wrapper")
            .expect("wrapper registered");
        let wrapper = registry.canonical_ident(&def);

        let ok = TypeIdent::TypeParam {
            index: 0,
            parent: Box::new(wrapper.clone()),
        };
        assert_eq!(roundtrip(&codec, &ok), ok);

        let bad = TypeIdent::TypeParam {
            index: 5,
            parent: Box::new(wrapper),
        };
        let mut w = Writer::new();
        codec.encode_type(&mut w, &bad).expect("encode");
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert!(matches!(
            codec.decode_type(&mut r),
            Err(Error::TypeNotFound { .. })
        ));
    }

    #[test]
    fn test_unknown_type_fails() {
        let (_, codec) = codec_with(&[]);
        let ident = TypeIdent::NamedDef {
            full_name: "acme.Ghost".into(),
            package: crate::model::PackageIdent::Named {
                name: "acme".into(),
                version: [1, 2, 3, 4],
            },
        };
        let mut w = Writer::new();
        codec.encode_type(&mut w, &ident).expect("encode");
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert!(matches!(
            codec.decode_type(&mut r),
            Err(Error::TypeNotFound { .. })
        ));
    }

    #[test]
    fn test_loader_fallback() {
        let registry = Arc::new(TypeRegistry::new());
        let loader: crate::model::PackageLoader = Arc::new(|name, version| {
            (name == "plugins").then(|| LoadedPackage {
                package: PackageDef::new("plugins", version),
                types: vec![TypeDef::class("plugins", "plugins.Ext")],
            })
        });
        let codec = IdentCodec::new(registry.clone(), &[], Some(loader));

        let ident = TypeIdent::NamedDef {
            full_name: "plugins.Ext".into(),
            package: crate::model::PackageIdent::Named {
                name: "plugins".into(),
                version: [0, 9, 0, 0],
            },
        };
        let mut w = Writer::new();
        codec.encode_type(&mut w, &ident).expect("encode");
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let decoded = codec.decode_type(&mut r).expect("loader resolves package");
        assert_eq!(
            decoded,
            TypeIdent::NamedDef {
                full_name: "plugins.Ext".into(),
                package: crate::model::PackageIdent::Named {
                    name: "plugins".into(),
                    version: [0, 9, 0, 0],
                },
            }
        );
        assert!(registry.type_def("plugins", "plugins.Ext").is_some());
    }
}
