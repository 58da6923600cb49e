// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Type, package, and method identities.
//!
//! A [`TypeIdent`] names a type structurally: arrays and constructed generics
//! nest, leaf definitions are builtin ids, well-known hashes, or
//! (full name, package) pairs. Identities are the keys of every formatter
//! cache and the payload of the type codec, so they are cheap to hash and
//! compare and carry no registry state.

use std::fmt;

/// Well-known builtin definition ids.
///
/// These occupy the `BuiltinDef` leaf space and never change value: they are
/// part of the wire contract.
pub mod builtin {
    pub const BOOL: u16 = 0;
    pub const U8: u16 = 1;
    pub const U16: u16 = 2;
    pub const U32: u16 = 3;
    pub const U64: u16 = 4;
    pub const I8: u16 = 5;
    pub const I16: u16 = 6;
    pub const I32: u16 = 7;
    pub const I64: u16 = 8;
    pub const F32: u16 = 9;
    pub const F64: u16 = 10;
    pub const DECIMAL: u16 = 11;
    pub const CHAR16: u16 = 12;
    pub const STRING: u16 = 13;
    pub const BYTES: u16 = 14;
    pub const DURATION: u16 = 15;
    pub const TIMESTAMP: u16 = 16;
    pub const UUID: u16 = 17;
    pub const I128: u16 = 18;
    pub const U128: u16 = 19;
    pub const BITS: u16 = 20;
    /// The abstract root reference type ("any object").
    pub const ANY: u16 = 21;
    pub const PAIR: u16 = 22;
    pub const LIST: u16 = 23;
    pub const QUEUE: u16 = 24;
    pub const STACK: u16 = 25;
    pub const SET: u16 = 26;
    pub const MAP: u16 = 27;
    pub const IMM_LIST: u16 = 28;
    pub const IMM_SET: u16 = 29;
    pub const IMM_MAP: u16 = 30;

    /// Generic arity of a builtin definition, if it is an open generic.
    pub fn generic_arity(id: u16) -> Option<u8> {
        match id {
            LIST | QUEUE | STACK | SET | IMM_LIST | IMM_SET => Some(1),
            PAIR | MAP | IMM_MAP => Some(2),
            _ => None,
        }
    }

    pub fn name(id: u16) -> &'static str {
        match id {
            BOOL => "bool",
            U8 => "u8",
            U16 => "u16",
            U32 => "u32",
            U64 => "u64",
            I8 => "i8",
            I16 => "i16",
            I32 => "i32",
            I64 => "i64",
            F32 => "f32",
            F64 => "f64",
            DECIMAL => "decimal",
            CHAR16 => "char16",
            STRING => "string",
            BYTES => "bytes",
            DURATION => "duration",
            TIMESTAMP => "timestamp",
            UUID => "uuid",
            I128 => "i128",
            U128 => "u128",
            BITS => "bits",
            ANY => "any",
            PAIR => "pair",
            LIST => "list",
            QUEUE => "queue",
            STACK => "stack",
            SET => "set",
            MAP => "map",
            IMM_LIST => "imm_list",
            IMM_SET => "imm_set",
            IMM_MAP => "imm_map",
            _ => "builtin?",
        }
    }
}

/// Package identity: a well-known hash from the trust list, or a name plus
/// a four-part version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PackageIdent {
    Known(u64),
    Named { name: String, version: [i32; 4] },
}

impl fmt::Display for PackageIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageIdent::Known(hash) => write!(f, "pkg#{:016x}", hash),
            PackageIdent::Named { name, version } => write!(
                f,
                "{} {}.{}.{}.{}",
                name, version[0], version[1], version[2], version[3]
            ),
        }
    }
}

/// Structural type identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeIdent {
    /// Zero-lower-bound single-dimensional array.
    SzArray(Box<TypeIdent>),
    /// Multi-dimensional array of the given rank.
    Array { rank: u8, elem: Box<TypeIdent> },
    /// Formal generic parameter of a type, by position.
    TypeParam { index: u32, parent: Box<TypeIdent> },
    /// Formal generic parameter of a method, by position.
    MethodParam { index: u32, parent: Box<MethodIdent> },
    /// Closed generic: open definition plus ground arguments. The argument
    /// count is never transmitted; the definition's arity fixes it.
    Constructed {
        def: Box<TypeIdent>,
        args: Vec<TypeIdent>,
    },
    /// Builtin definition (see [`builtin`]).
    BuiltinDef(u16),
    /// Compact form of a definition whose package is on the trust list.
    KnownDef(u64),
    /// Full-name definition within a package.
    NamedDef {
        full_name: String,
        package: PackageIdent,
    },
}

impl TypeIdent {
    pub fn sz_array(elem: TypeIdent) -> Self {
        TypeIdent::SzArray(Box::new(elem))
    }

    pub fn array(rank: u8, elem: TypeIdent) -> Self {
        TypeIdent::Array {
            rank,
            elem: Box::new(elem),
        }
    }

    pub fn constructed(def: TypeIdent, args: Vec<TypeIdent>) -> Self {
        TypeIdent::Constructed {
            def: Box::new(def),
            args,
        }
    }

    pub const fn is_builtin(&self, id: u16) -> bool {
        matches!(self, TypeIdent::BuiltinDef(b) if *b == id)
    }

    /// The definition at the head of this identity, if any: `list<T>` gives
    /// `list`, arrays give none.
    pub fn head_def(&self) -> Option<&TypeIdent> {
        match self {
            TypeIdent::Constructed { def, .. } => Some(def),
            TypeIdent::BuiltinDef(_) | TypeIdent::KnownDef(_) | TypeIdent::NamedDef { .. } => {
                Some(self)
            }
            _ => None,
        }
    }
}

impl fmt::Display for TypeIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeIdent::SzArray(elem) => write!(f, "{}[]", elem),
            TypeIdent::Array { rank, elem } => write!(f, "{}[rank {}]", elem, rank),
            TypeIdent::TypeParam { index, parent } => write!(f, "{}!{}", parent, index),
            TypeIdent::MethodParam { index, parent } => write!(f, "{}!!{}", parent, index),
            TypeIdent::Constructed { def, args } => {
                write!(f, "{}<", def)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ">")
            }
            TypeIdent::BuiltinDef(id) => write!(f, "{}", builtin::name(*id)),
            TypeIdent::KnownDef(hash) => write!(f, "type#{:016x}", hash),
            TypeIdent::NamedDef { full_name, package } => {
                write!(f, "{} in {}", full_name, package)
            }
        }
    }
}

/// Method identity. Open generic methods are identified symbolically through
/// [`Matcher`] trees, because their parameter types may refer back to the
/// method itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MethodIdent {
    /// Constructor of the declaring type.
    CtorDef {
        declaring: TypeIdent,
        params: Vec<Matcher>,
    },
    /// Closed generic method: open definition plus ground type arguments.
    ConstructedGeneric {
        def: Box<MethodIdent>,
        args: Vec<TypeIdent>,
    },
    /// Method declared on a type, selected by name, generic arity, and
    /// parameter matchers.
    MemberDef {
        declaring: TypeIdent,
        name: String,
        generic_arity: u8,
        params: Vec<Matcher>,
    },
    /// Package-level (free) function.
    ModuleDef {
        package: PackageIdent,
        name: String,
        params: Vec<Matcher>,
    },
}

impl fmt::Display for MethodIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodIdent::CtorDef { declaring, .. } => write!(f, "{}::new", declaring),
            MethodIdent::ConstructedGeneric { def, args } => {
                write!(f, "{}<{} args>", def, args.len())
            }
            MethodIdent::MemberDef {
                declaring, name, ..
            } => write!(f, "{}::{}", declaring, name),
            MethodIdent::ModuleDef { package, name, .. } => write!(f, "{}::{}", package, name),
        }
    }
}

/// Symbolic description of a parameter type, used to re-identify open
/// generic methods without encoding self-referential type identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Matcher {
    SzArray(Box<Matcher>),
    Array { rank: u8, elem: Box<Matcher> },
    /// The parent type's formal parameter at `index`.
    TypeParam { index: u32, parent: Box<TypeIdent> },
    /// The candidate method's own formal parameter at `index`.
    MethodParam { index: u32 },
    /// A constructed (or plain, when `args` is empty) definition.
    Constructed {
        def: Box<TypeIdent>,
        args: Vec<Matcher>,
    },
}

impl Matcher {
    pub fn exact(def: TypeIdent) -> Self {
        Matcher::Constructed {
            def: Box::new(def),
            args: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ident_equality_is_structural() {
        let a = TypeIdent::sz_array(TypeIdent::BuiltinDef(builtin::U32));
        let b = TypeIdent::sz_array(TypeIdent::BuiltinDef(builtin::U32));
        let c = TypeIdent::sz_array(TypeIdent::BuiltinDef(builtin::U64));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_builtin_arity() {
        assert_eq!(builtin::generic_arity(builtin::LIST), Some(1));
        assert_eq!(builtin::generic_arity(builtin::MAP), Some(2));
        assert_eq!(builtin::generic_arity(builtin::U32), None);
    }

    #[test]
    fn test_display_constructed() {
        let ident = TypeIdent::constructed(
            TypeIdent::BuiltinDef(builtin::LIST),
            vec![TypeIdent::BuiltinDef(builtin::STRING)],
        );
        assert_eq!(ident.to_string(), "list<string>");
    }

    #[test]
    fn test_head_def() {
        let list = TypeIdent::constructed(
            TypeIdent::BuiltinDef(builtin::LIST),
            vec![TypeIdent::BuiltinDef(builtin::U8)],
        );
        assert_eq!(
            list.head_def(),
            Some(&TypeIdent::BuiltinDef(builtin::LIST))
        );
        let arr = TypeIdent::sz_array(TypeIdent::BuiltinDef(builtin::U8));
        assert_eq!(arr.head_def(), None);
    }
}
