// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Method identity encoding and matcher-based re-identification.
//!
//! An open generic method's parameter types may refer back to the method
//! itself, so parameters are encoded as symbolic [`Matcher`] trees rather
//! than type identities. Decode rebuilds the tree and selects the first
//! registered candidate whose parameter sequence satisfies it.

use super::{read_tag, write_tag, IdentCodec};
use crate::error::{Error, Result};
use crate::model::{Matcher, MethodDef, MethodIdent, PackageIdent, ParamShape, TypeIdent};
use crate::wire::{Reader, Writer};
use std::sync::Arc;

// Method identity case tags.
const M_CTOR_DEF: u8 = 0;
const M_CONSTRUCTED_GENERIC: u8 = 1;
const M_MEMBER_DEF: u8 = 2;
const M_MODULE_DEF: u8 = 3;

// Matcher case tags (low 3 bits of a packed tag byte, like type identities).
const X_SZ_ARRAY: u8 = 0;
const X_ARRAY: u8 = 1;
const X_TYPE_PARAM: u8 = 2;
const X_METHOD_PARAM: u8 = 3;
const X_CONSTRUCTED: u8 = 4;

impl IdentCodec {
    pub fn encode_method(&self, w: &mut Writer, ident: &MethodIdent) -> Result<()> {
        match ident {
            MethodIdent::CtorDef { declaring, params } => {
                w.write_u8(M_CTOR_DEF);
                self.encode_type(w, declaring)?;
                self.encode_matchers(w, params)
            }
            MethodIdent::ConstructedGeneric { def, args } => {
                let arity = match def.as_ref() {
                    MethodIdent::MemberDef { generic_arity, .. } => *generic_arity,
                    _ => {
                        return Err(Error::InvalidValue {
                            reason: "constructed generic method needs an open member definition"
                                .into(),
                        })
                    }
                };
                if args.len() != usize::from(arity) {
                    return Err(Error::InvalidValue {
                        reason: format!(
                            "method takes {} type arguments, got {}",
                            arity,
                            args.len()
                        ),
                    });
                }
                w.write_u8(M_CONSTRUCTED_GENERIC);
                self.encode_method(w, def)?;
                for arg in args {
                    self.encode_type(w, arg)?;
                }
                Ok(())
            }
            MethodIdent::MemberDef {
                declaring,
                name,
                generic_arity,
                params,
            } => {
                w.write_u8(M_MEMBER_DEF);
                self.encode_type(w, declaring)?;
                w.write_str(name);
                w.write_varu64(u64::from(*generic_arity));
                self.encode_matchers(w, params)
            }
            MethodIdent::ModuleDef {
                package,
                name,
                params,
            } => {
                w.write_u8(M_MODULE_DEF);
                self.encode_package(w, package);
                w.write_str(name);
                self.encode_matchers(w, params)
            }
        }
    }

    pub fn decode_method(&self, r: &mut Reader<'_>) -> Result<MethodIdent> {
        let at = r.offset();
        match r.read_u8()? {
            M_CTOR_DEF => Ok(MethodIdent::CtorDef {
                declaring: self.decode_type(r)?,
                params: self.decode_matchers(r)?,
            }),
            M_CONSTRUCTED_GENERIC => {
                let def = self.decode_method(r)?;
                let arity = match &def {
                    MethodIdent::MemberDef { generic_arity, .. } => *generic_arity,
                    _ => {
                        return Err(Error::malformed(
                            at,
                            "constructed generic method over a non-generic definition",
                        ))
                    }
                };
                let mut args = Vec::with_capacity(usize::from(arity));
                for _ in 0..arity {
                    args.push(self.decode_type(r)?);
                }
                Ok(MethodIdent::ConstructedGeneric {
                    def: Box::new(def),
                    args,
                })
            }
            M_MEMBER_DEF => {
                let declaring = self.decode_type(r)?;
                let name = r.read_str()?;
                let generic_arity = r.read_varu64()?;
                if generic_arity > u64::from(u8::MAX) {
                    return Err(Error::malformed(at, "generic arity out of range"));
                }
                Ok(MethodIdent::MemberDef {
                    declaring,
                    name,
                    generic_arity: generic_arity as u8,
                    params: self.decode_matchers(r)?,
                })
            }
            M_MODULE_DEF => {
                let package_name = self.decode_package(r)?;
                let version = self
                    .registry()
                    .package(&package_name)
                    .map_or(crate::model::DEFAULT_VERSION, |p| p.version);
                Ok(MethodIdent::ModuleDef {
                    package: PackageIdent::Named {
                        name: package_name,
                        version,
                    },
                    name: r.read_str()?,
                    params: self.decode_matchers(r)?,
                })
            }
            other => Err(Error::malformed(
                at,
                format!("unknown method identity tag {}", other),
            )),
        }
    }

    fn encode_matchers(&self, w: &mut Writer, matchers: &[Matcher]) -> Result<()> {
        w.write_varu64(matchers.len() as u64);
        for m in matchers {
            self.encode_matcher(w, m)?;
        }
        Ok(())
    }

    fn decode_matchers(&self, r: &mut Reader<'_>) -> Result<Vec<Matcher>> {
        let count = r.read_varu32()? as usize;
        let mut out = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            out.push(self.decode_matcher(r)?);
        }
        Ok(out)
    }

    fn encode_matcher(&self, w: &mut Writer, m: &Matcher) -> Result<()> {
        match m {
            Matcher::SzArray(elem) => {
                write_tag(w, X_SZ_ARRAY, 0);
                self.encode_matcher(w, elem)
            }
            Matcher::Array { rank, elem } => {
                if *rank == 0 {
                    return Err(Error::InvalidValue {
                        reason: "array rank must be at least 1".into(),
                    });
                }
                write_tag(w, X_ARRAY, u64::from(*rank) - 1);
                self.encode_matcher(w, elem)
            }
            Matcher::TypeParam { index, parent } => {
                write_tag(w, X_TYPE_PARAM, u64::from(*index));
                self.encode_type(w, parent)
            }
            Matcher::MethodParam { index } => {
                write_tag(w, X_METHOD_PARAM, u64::from(*index));
                Ok(())
            }
            Matcher::Constructed { def, args } => {
                let arity = self.arity_or_zero(def);
                if args.len() != usize::from(arity) {
                    return Err(Error::InvalidValue {
                        reason: format!(
                            "matcher for {} takes {} arguments, got {}",
                            def,
                            arity,
                            args.len()
                        ),
                    });
                }
                write_tag(w, X_CONSTRUCTED, 0);
                self.encode_type(w, def)?;
                for arg in args {
                    self.encode_matcher(w, arg)?;
                }
                Ok(())
            }
        }
    }

    fn decode_matcher(&self, r: &mut Reader<'_>) -> Result<Matcher> {
        let at = r.offset();
        let (case, inline) = read_tag(r)?;
        match case {
            X_SZ_ARRAY => Ok(Matcher::SzArray(Box::new(self.decode_matcher(r)?))),
            X_ARRAY => {
                let rank = inline + 1;
                if rank > u64::from(u8::MAX) {
                    return Err(Error::malformed(at, "array rank out of range"));
                }
                Ok(Matcher::Array {
                    rank: rank as u8,
                    elem: Box::new(self.decode_matcher(r)?),
                })
            }
            X_TYPE_PARAM => Ok(Matcher::TypeParam {
                index: inline as u32,
                parent: Box::new(self.decode_type(r)?),
            }),
            X_METHOD_PARAM => Ok(Matcher::MethodParam {
                index: inline as u32,
            }),
            X_CONSTRUCTED => {
                let def = self.decode_type(r)?;
                let arity = self.arity_or_zero(&def);
                let mut args = Vec::with_capacity(usize::from(arity));
                for _ in 0..arity {
                    args.push(self.decode_matcher(r)?);
                }
                Ok(Matcher::Constructed {
                    def: Box::new(def),
                    args,
                })
            }
            other => Err(Error::malformed(
                at,
                format!("unknown matcher tag {}", other),
            )),
        }
    }

    /// Generic arity of a definition, zero for plain types. Matcher argument
    /// counts derive from this, mirroring constructed type identities.
    fn arity_or_zero(&self, def: &TypeIdent) -> u8 {
        self.registry().generic_arity_of(def).unwrap_or(0)
    }

    /// Select the first registered method satisfying a decoded identity.
    pub fn resolve_method(&self, ident: &MethodIdent) -> Result<Arc<MethodDef>> {
        let candidates = self.registry().methods();
        let found = match ident {
            MethodIdent::ConstructedGeneric { def, .. } => return self.resolve_method(def),
            MethodIdent::CtorDef { declaring, params } => {
                candidates.into_iter().find(|m| {
                    m.is_ctor
                        && m.declaring.as_ref() == Some(declaring)
                        && params_satisfied(params, &m.params, Some(declaring))
                })
            }
            MethodIdent::MemberDef {
                declaring,
                name,
                generic_arity,
                params,
            } => candidates.into_iter().find(|m| {
                !m.is_ctor
                    && m.declaring.as_ref() == Some(declaring)
                    && m.name == *name
                    && m.generic_arity == *generic_arity
                    && params_satisfied(params, &m.params, Some(declaring))
            }),
            MethodIdent::ModuleDef {
                package,
                name,
                params,
            } => {
                let package_name = match package {
                    PackageIdent::Named { name, .. } => name.clone(),
                    PackageIdent::Known(hash) => self
                        .known_packages()
                        .by_hash(*hash)
                        .cloned()
                        .ok_or_else(|| Error::TypeNotFound {
                            name: format!("known package #{:016x}", hash),
                        })?,
                };
                candidates.into_iter().find(|m| {
                    m.declaring.is_none()
                        && m.package.as_deref() == Some(package_name.as_str())
                        && m.name == *name
                        && params_satisfied(params, &m.params, None)
                })
            }
        };
        found.ok_or_else(|| Error::TypeNotFound {
            name: format!("no method satisfies {}", ident),
        })
    }
}

fn params_satisfied(
    matchers: &[Matcher],
    shapes: &[ParamShape],
    declaring: Option<&TypeIdent>,
) -> bool {
    matchers.len() == shapes.len()
        && matchers
            .iter()
            .zip(shapes)
            .all(|(m, s)| satisfies(m, s, declaring))
}

fn satisfies(m: &Matcher, shape: &ParamShape, declaring: Option<&TypeIdent>) -> bool {
    match (m, shape) {
        (_, ParamShape::Ground(t)) => satisfies_ground(m, t),
        (Matcher::SzArray(me), ParamShape::SzArray(se)) => satisfies(me, se, declaring),
        (
            Matcher::Array { rank: r1, elem: me },
            ParamShape::Array { rank: r2, elem: se },
        ) => r1 == r2 && satisfies(me, se, declaring),
        (Matcher::TypeParam { index, parent }, ParamShape::TypeParam { index: i2 }) => {
            index == i2 && declaring.is_some_and(|d| d == parent.as_ref())
        }
        (Matcher::MethodParam { index }, ParamShape::MethodParam { index: i2 }) => index == i2,
        (
            Matcher::Constructed { def, args },
            ParamShape::Constructed {
                def: d2,
                args: shapes,
            },
        ) => {
            def.as_ref() == d2
                && args.len() == shapes.len()
                && args
                    .iter()
                    .zip(shapes)
                    .all(|(a, s)| satisfies(a, s, declaring))
        }
        _ => false,
    }
}

/// Match a matcher against a fully ground parameter type.
fn satisfies_ground(m: &Matcher, ty: &TypeIdent) -> bool {
    match (m, ty) {
        (Matcher::SzArray(me), TypeIdent::SzArray(e)) => satisfies_ground(me, e),
        (
            Matcher::Array { rank: r1, elem: me },
            TypeIdent::Array { rank: r2, elem: e },
        ) => r1 == r2 && satisfies_ground(me, e),
        (
            Matcher::TypeParam { index, parent },
            TypeIdent::TypeParam {
                index: i2,
                parent: p2,
            },
        ) => index == i2 && parent == p2,
        (Matcher::Constructed { def, args }, t) => {
            if args.is_empty() {
                t == def.as_ref()
            } else if let TypeIdent::Constructed { def: d2, args: ga } = t {
                def == d2
                    && args.len() == ga.len()
                    && args.iter().zip(ga).all(|(a, g)| satisfies_ground(a, g))
            } else {
                false
            }
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{builtin, PackageDef, TypeDef, TypeRegistry};

    fn setup() -> (Arc<TypeRegistry>, IdentCodec, TypeIdent) {
        let registry = Arc::new(TypeRegistry::new());
        registry.register_package(PackageDef::new("acme", [1, 0, 0, 0]));
        let ops = registry.register_type(TypeDef::class("acme", "acme.Ops"));

        // fn acme.Ops::swap<T>(items: T[], count: u32)
        registry.register_method(MethodDef {
            declaring: Some(ops.clone()),
            package: None,
            name: "swap".into(),
            is_ctor: false,
            generic_arity: 1,
            params: vec![
                ParamShape::SzArray(Box::new(ParamShape::MethodParam { index: 0 })),
                ParamShape::Ground(TypeIdent::BuiltinDef(builtin::U32)),
            ],
        });
        // fn acme.Ops::swap(items: u8[]), the non-generic overload
        registry.register_method(MethodDef {
            declaring: Some(ops.clone()),
            package: None,
            name: "swap".into(),
            is_ctor: false,
            generic_arity: 0,
            params: vec![ParamShape::Ground(TypeIdent::sz_array(
                TypeIdent::BuiltinDef(builtin::U8),
            ))],
        });

        let codec = IdentCodec::new(registry.clone(), &[], None);
        (registry, codec, ops)
    }

    fn roundtrip(codec: &IdentCodec, ident: &MethodIdent) -> MethodIdent {
        let mut w = Writer::new();
        codec.encode_method(&mut w, ident).expect("encode method");
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let out = codec.decode_method(&mut r).expect("decode method");
        assert!(r.is_eof(), "codec must consume its own bytes");
        out
    }

    fn swap_open(ops: &TypeIdent) -> MethodIdent {
        MethodIdent::MemberDef {
            declaring: ops.clone(),
            name: "swap".into(),
            generic_arity: 1,
            params: vec![
                Matcher::SzArray(Box::new(Matcher::MethodParam { index: 0 })),
                Matcher::exact(TypeIdent::BuiltinDef(builtin::U32)),
            ],
        }
    }

    #[test]
    fn test_member_def_roundtrip() {
        let (_, codec, ops) = setup();
        let ident = swap_open(&ops);
        assert_eq!(roundtrip(&codec, &ident), ident);
    }

    #[test]
    fn test_open_generic_selected_by_matcher() {
        let (_, codec, ops) = setup();
        let resolved = codec
            .resolve_method(&swap_open(&ops))
            .expect("matcher selects the generic overload");
        assert_eq!(resolved.generic_arity, 1);
    }

    #[test]
    fn test_ground_overload_selected_by_matcher() {
        let (_, codec, ops) = setup();
        let ident = MethodIdent::MemberDef {
            declaring: ops,
            name: "swap".into(),
            generic_arity: 0,
            params: vec![Matcher::SzArray(Box::new(Matcher::exact(
                TypeIdent::BuiltinDef(builtin::U8),
            )))],
        };
        let resolved = codec
            .resolve_method(&ident)
            .expect("matcher selects the ground overload");
        assert_eq!(resolved.generic_arity, 0);
    }

    #[test]
    fn test_constructed_generic_roundtrip_and_resolve() {
        let (_, codec, ops) = setup();
        let ident = MethodIdent::ConstructedGeneric {
            def: Box::new(swap_open(&ops)),
            args: vec![TypeIdent::BuiltinDef(builtin::STRING)],
        };
        assert_eq!(roundtrip(&codec, &ident), ident);
        assert!(codec.resolve_method(&ident).is_ok());
    }

    #[test]
    fn test_no_candidate_is_type_not_found() {
        let (_, codec, ops) = setup();
        let ident = MethodIdent::MemberDef {
            declaring: ops,
            name: "missing".into(),
            generic_arity: 0,
            params: vec![],
        };
        assert!(matches!(
            codec.resolve_method(&ident),
            Err(Error::TypeNotFound { .. })
        ));
    }

    #[test]
    fn test_method_param_type_roundtrip() {
        // A type identity whose parent is a method: the mutual recursion of
        // the two codecs.
        let (_, codec, ops) = setup();
        let ident = TypeIdent::MethodParam {
            index: 0,
            parent: Box::new(swap_open(&ops)),
        };
        let mut w = Writer::new();
        codec.encode_type(&mut w, &ident).expect("encode");
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(codec.decode_type(&mut r).expect("decode"), ident);
    }
}
