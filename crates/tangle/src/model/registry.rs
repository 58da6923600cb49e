// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The registered type space.
//!
//! Rust has no runtime reflection, so the serializer works against
//! user-registered definitions: packages (named, versioned code units),
//! types (aggregates, enums, collections) with their field and property
//! descriptors, and methods. The registry is the sole authority the decoder
//! consults when reconstructing a type from its wire identity.
//!
//! Registration is insert-only. Definitions are immutable once published;
//! lookups after publication are cheap snapshot reads.

use super::ident::{builtin, PackageIdent, TypeIdent};
use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Version given to packages that are created implicitly at type
/// registration.
pub const DEFAULT_VERSION: [i32; 4] = [1, 0, 0, 0];

/// A named, versioned code unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDef {
    pub name: String,
    pub version: [i32; 4],
}

impl PackageDef {
    pub fn new(name: impl Into<String>, version: [i32; 4]) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

/// How a property's setter is shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetterKind {
    /// No setter at all.
    None,
    /// Ordinary setter.
    Set,
    /// Init-only setter.
    Init,
    /// Hand-written setter body (not expressible as a field access).
    Explicit,
}

/// A persisted or persistable field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub ty: TypeIdent,
    pub public: bool,
    pub readonly: bool,
    /// Compiler-synthesized backing field of a property.
    pub synthesized: bool,
    /// `Some(true)` forces inclusion, `Some(false)` forces exclusion;
    /// force-include wins over every filter.
    pub force: Option<bool>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, ty: TypeIdent) -> Self {
        Self {
            name: name.into(),
            ty,
            public: true,
            readonly: false,
            synthesized: false,
            force: None,
        }
    }

    pub fn non_public(mut self) -> Self {
        self.public = false;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn synthesized(mut self) -> Self {
        self.synthesized = true;
        self
    }

    pub fn force_include(mut self) -> Self {
        self.force = Some(true);
        self
    }

    pub fn force_exclude(mut self) -> Self {
        self.force = Some(false);
        self
    }
}

/// A property with its accessor shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertySpec {
    pub name: String,
    pub ty: TypeIdent,
    pub has_get: bool,
    pub setter: SetterKind,
    /// Name of the compiler-synthesized field this property reads/writes.
    pub backing_field: Option<String>,
}

impl PropertySpec {
    /// An auto-property with getter and setter, backed by a synthesized
    /// field named after the property.
    pub fn auto(name: impl Into<String>, ty: TypeIdent) -> Self {
        let name = name.into();
        let backing = format!("<{}>__backing", name);
        Self {
            name,
            ty,
            has_get: true,
            setter: SetterKind::Set,
            backing_field: Some(backing),
        }
    }

    pub fn get_only(mut self) -> Self {
        self.setter = SetterKind::None;
        self
    }

    pub fn init_only(mut self) -> Self {
        self.setter = SetterKind::Init;
        self
    }

    pub fn set_only(mut self) -> Self {
        self.has_get = false;
        self
    }

    /// An explicit (hand-written) accessor pair with no backing field.
    pub fn explicit(name: impl Into<String>, ty: TypeIdent) -> Self {
        Self {
            name: name.into(),
            ty,
            has_get: true,
            setter: SetterKind::Explicit,
            backing_field: None,
        }
    }
}

/// What a registered type is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeBody {
    /// Fields and properties, persisted by member.
    Aggregate {
        fields: Vec<FieldSpec>,
        props: Vec<PropertySpec>,
    },
    /// Enumeration over an underlying builtin integer.
    Enum {
        underlying: u16,
        variants: Vec<(String, i64)>,
    },
    /// Element-appendable collection; used as an open generic definition.
    Collection,
}

/// A registered type definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDef {
    /// Canonical dotted/plus-nested full name within the package.
    pub full_name: String,
    pub package: String,
    /// Inline aggregate (copied by value) rather than reference type.
    pub value_type: bool,
    pub sealed: bool,
    /// Base type for inheritance chains.
    pub base: Option<TypeIdent>,
    pub body: TypeBody,
    /// Declared-sequential layout (a blittability prerequisite).
    pub layout_sequential: bool,
    /// Declared byte size of the aggregate, when layout is sequential.
    pub declared_size: Option<u32>,
    pub has_default_ctor: bool,
    /// Arity when this is an open generic definition; 0 otherwise.
    pub generic_arity: u8,
}

impl TypeDef {
    /// A reference type with a public no-arg constructor.
    pub fn class(package: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            package: package.into(),
            value_type: false,
            sealed: false,
            base: None,
            body: TypeBody::Aggregate {
                fields: Vec::new(),
                props: Vec::new(),
            },
            layout_sequential: false,
            declared_size: None,
            has_default_ctor: true,
            generic_arity: 0,
        }
    }

    /// An inline aggregate (value type).
    pub fn value_struct(package: impl Into<String>, full_name: impl Into<String>) -> Self {
        let mut def = Self::class(package, full_name);
        def.value_type = true;
        def.sealed = true;
        def
    }

    /// An enumeration over the given builtin integer id.
    pub fn enumeration(
        package: impl Into<String>,
        full_name: impl Into<String>,
        underlying: u16,
        variants: Vec<(String, i64)>,
    ) -> Self {
        let mut def = Self::value_struct(package, full_name);
        def.body = TypeBody::Enum {
            underlying,
            variants,
        };
        def
    }

    /// An open generic collection definition with an add method.
    pub fn collection(package: impl Into<String>, full_name: impl Into<String>) -> Self {
        let mut def = Self::class(package, full_name);
        def.sealed = true;
        def.body = TypeBody::Collection;
        def.generic_arity = 1;
        def
    }

    pub fn sealed(mut self) -> Self {
        self.sealed = true;
        self
    }

    pub fn without_default_ctor(mut self) -> Self {
        self.has_default_ctor = false;
        self
    }

    pub fn with_base(mut self, base: TypeIdent) -> Self {
        self.base = Some(base);
        self
    }

    pub fn with_field(mut self, field: FieldSpec) -> Self {
        if let TypeBody::Aggregate { fields, .. } = &mut self.body {
            fields.push(field);
        }
        self
    }

    pub fn with_property(mut self, prop: PropertySpec) -> Self {
        if let TypeBody::Aggregate { props, .. } = &mut self.body {
            props.push(prop);
        }
        self
    }

    /// Declared-sequential layout with the given aggregate size.
    pub fn with_layout(mut self, size: u32) -> Self {
        self.layout_sequential = true;
        self.declared_size = Some(size);
        self
    }

    pub fn with_generic_arity(mut self, arity: u8) -> Self {
        self.generic_arity = arity;
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        match &self.body {
            TypeBody::Aggregate { fields, .. } => fields,
            _ => &[],
        }
    }

    pub fn props(&self) -> &[PropertySpec] {
        match &self.body {
            TypeBody::Aggregate { props, .. } => props,
            _ => &[],
        }
    }
}

/// Shape of a registered method parameter. Occurrences of the declaring
/// type's or the method's own formal parameters stay symbolic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamShape {
    Ground(TypeIdent),
    SzArray(Box<ParamShape>),
    Array { rank: u8, elem: Box<ParamShape> },
    TypeParam { index: u32 },
    MethodParam { index: u32 },
    Constructed { def: TypeIdent, args: Vec<ParamShape> },
}

/// A registered method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDef {
    /// Declaring type; `None` for package-level functions.
    pub declaring: Option<TypeIdent>,
    /// Declaring package for package-level functions.
    pub package: Option<String>,
    pub name: String,
    pub is_ctor: bool,
    pub generic_arity: u8,
    pub params: Vec<ParamShape>,
}

/// A package produced by a [`PackageLoader`], ready to install.
pub struct LoadedPackage {
    pub package: PackageDef,
    pub types: Vec<TypeDef>,
}

/// Decode-time fallback consulted when a named definition's package is
/// neither registered nor on the trust list.
pub type PackageLoader =
    Arc<dyn Fn(&str, [i32; 4]) -> Option<LoadedPackage> + Send + Sync>;

#[derive(Default)]
struct Inner {
    packages: HashMap<String, Arc<PackageDef>>,
    types: HashMap<(String, String), Arc<TypeDef>>,
    methods: Vec<Arc<MethodDef>>,
}

/// The registered type space.
#[derive(Default)]
pub struct TypeRegistry {
    inner: RwLock<Inner>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a package. A package already present keeps its first
    /// registration.
    pub fn register_package(&self, package: PackageDef) {
        let mut inner = self.inner.write();
        inner
            .packages
            .entry(package.name.clone())
            .or_insert_with(|| Arc::new(package));
    }

    /// Register a type and return its canonical identity. The owning package
    /// is created implicitly (with [`DEFAULT_VERSION`]) when absent.
    pub fn register_type(&self, def: TypeDef) -> TypeIdent {
        let mut inner = self.inner.write();
        let package = inner
            .packages
            .entry(def.package.clone())
            .or_insert_with(|| {
                Arc::new(PackageDef::new(def.package.clone(), DEFAULT_VERSION))
            })
            .clone();
        let ident = TypeIdent::NamedDef {
            full_name: def.full_name.clone(),
            package: PackageIdent::Named {
                name: package.name.clone(),
                version: package.version,
            },
        };
        let key = (def.package.clone(), def.full_name.clone());
        inner.types.entry(key).or_insert_with(|| Arc::new(def));
        ident
    }

    pub fn register_method(&self, method: MethodDef) {
        self.inner.write().methods.push(Arc::new(method));
    }

    /// Install a loader-provided package and its types.
    pub fn install(&self, loaded: LoadedPackage) {
        self.register_package(loaded.package);
        for def in loaded.types {
            self.register_type(def);
        }
    }

    pub fn package(&self, name: &str) -> Option<Arc<PackageDef>> {
        self.inner.read().packages.get(name).cloned()
    }

    pub fn type_def(&self, package: &str, full_name: &str) -> Option<Arc<TypeDef>> {
        self.inner
            .read()
            .types
            .get(&(package.to_string(), full_name.to_string()))
            .cloned()
    }

    /// Definition behind a named identity.
    pub fn def_of(&self, ident: &TypeIdent) -> Option<Arc<TypeDef>> {
        match ident {
            TypeIdent::NamedDef { full_name, package } => {
                let pkg_name = match package {
                    PackageIdent::Named { name, .. } => name,
                    PackageIdent::Known(_) => return None,
                };
                self.type_def(pkg_name, full_name)
            }
            _ => None,
        }
    }

    /// Canonical identity of a registered definition.
    pub fn canonical_ident(&self, def: &TypeDef) -> TypeIdent {
        let version = self
            .package(&def.package)
            .map_or(DEFAULT_VERSION, |p| p.version);
        TypeIdent::NamedDef {
            full_name: def.full_name.clone(),
            package: PackageIdent::Named {
                name: def.package.clone(),
                version,
            },
        }
    }

    /// Snapshot of all registered types with their canonical identities.
    pub fn all_types(&self) -> Vec<(TypeIdent, Arc<TypeDef>)> {
        let inner = self.inner.read();
        inner
            .types
            .values()
            .map(|def| {
                let version = inner
                    .packages
                    .get(&def.package)
                    .map_or(DEFAULT_VERSION, |p| p.version);
                (
                    TypeIdent::NamedDef {
                        full_name: def.full_name.clone(),
                        package: PackageIdent::Named {
                            name: def.package.clone(),
                            version,
                        },
                    },
                    def.clone(),
                )
            })
            .collect()
    }

    pub fn methods(&self) -> Vec<Arc<MethodDef>> {
        self.inner.read().methods.clone()
    }

    /// Arity of an open generic definition, for reconstructing constructed
    /// types whose argument count is not transmitted.
    pub fn generic_arity_of(&self, def_ident: &TypeIdent) -> Result<u8> {
        match def_ident {
            TypeIdent::BuiltinDef(id) => builtin::generic_arity(*id)
                .ok_or_else(|| Error::TypeNotFound {
                    name: format!("{} is not an open generic definition", def_ident),
                }),
            TypeIdent::NamedDef { .. } => {
                let def = self.def_of(def_ident).ok_or_else(|| Error::TypeNotFound {
                    name: def_ident.to_string(),
                })?;
                if def.generic_arity == 0 {
                    return Err(Error::TypeNotFound {
                        name: format!("{} is not an open generic definition", def_ident),
                    });
                }
                Ok(def.generic_arity)
            }
            _ => Err(Error::TypeNotFound {
                name: format!("{} cannot head a constructed type", def_ident),
            }),
        }
    }

    /// Whether values of this type live behind references.
    pub fn is_reference(&self, ident: &TypeIdent) -> Result<bool> {
        match ident {
            TypeIdent::SzArray(_) | TypeIdent::Array { .. } => Ok(true),
            TypeIdent::BuiltinDef(id) => Ok(*id == builtin::ANY),
            TypeIdent::Constructed { def, .. } => match def.as_ref() {
                TypeIdent::BuiltinDef(id) => Ok(matches!(
                    *id,
                    builtin::LIST
                        | builtin::QUEUE
                        | builtin::STACK
                        | builtin::SET
                        | builtin::MAP
                        | builtin::IMM_LIST
                        | builtin::IMM_SET
                        | builtin::IMM_MAP
                )),
                _ => self.is_reference(def),
            },
            TypeIdent::NamedDef { .. } => {
                let def = self.def_of(ident).ok_or_else(|| Error::TypeNotFound {
                    name: ident.to_string(),
                })?;
                Ok(!def.value_type)
            }
            TypeIdent::KnownDef(hash) => Err(Error::TypeNotFound {
                name: format!("unresolved known definition #{:016x}", hash),
            }),
            TypeIdent::TypeParam { .. } | TypeIdent::MethodParam { .. } => {
                Err(Error::TypeNotFound {
                    name: format!("open parameter {}", ident),
                })
            }
        }
    }

    /// Whether the declared type admits no dynamic subtype at a slot:
    /// sealed definitions, and arrays of sealed elements.
    pub fn is_sealed(&self, ident: &TypeIdent) -> Result<bool> {
        match ident {
            TypeIdent::SzArray(elem) | TypeIdent::Array { elem, .. } => self.is_sealed(elem),
            TypeIdent::BuiltinDef(id) => Ok(*id != builtin::ANY),
            TypeIdent::Constructed { def, .. } => match def.as_ref() {
                TypeIdent::BuiltinDef(_) => Ok(true),
                _ => self.is_sealed(def),
            },
            TypeIdent::NamedDef { .. } => {
                let def = self.def_of(ident).ok_or_else(|| Error::TypeNotFound {
                    name: ident.to_string(),
                })?;
                Ok(def.sealed)
            }
            TypeIdent::KnownDef(hash) => Err(Error::TypeNotFound {
                name: format!("unresolved known definition #{:016x}", hash),
            }),
            TypeIdent::TypeParam { .. } | TypeIdent::MethodParam { .. } => Ok(false),
        }
    }

    /// Whether this is an inline aggregate none of whose persisted fields is
    /// writable; such values cannot contain references back to their own box.
    pub fn is_readonly_aggregate(&self, ident: &TypeIdent) -> bool {
        self.def_of(ident).is_some_and(|def| {
            def.value_type && def.fields().iter().all(|f| f.readonly)
        })
    }
}
