// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The registered type space and the dynamic value model.

pub mod ident;
pub mod registry;
pub mod value;

pub use ident::{builtin, Matcher, MethodIdent, PackageIdent, TypeIdent};
pub use registry::{
    FieldSpec, LoadedPackage, MethodDef, PackageDef, PackageLoader, ParamShape, PropertySpec,
    SetterKind, TypeBody, TypeDef, TypeRegistry, DEFAULT_VERSION,
};
pub use value::{graph_eq, new_object, ObjCell, ObjRef, Value};
