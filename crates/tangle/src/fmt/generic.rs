// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Generic formatter templates.
//!
//! A template targets a type term with variables; a ground type that unifies
//! with the term (every variable receiving exactly one ground binding)
//! instantiates the template through its factory. Construction prefers the
//! kernel-taking factory, so instantiated formatters can obtain child
//! formatters recursively; a parameterless factory is the fallback.

use super::{Formatter, Resolver};
use crate::error::{Error, Result};
use crate::kernel::Serializer;
use crate::model::TypeIdent;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A type term: a type identity with variables in leaf positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeTerm {
    /// A variable, numbered 0..arity.
    Var(u8),
    /// Exactly this ground type.
    Exact(TypeIdent),
    SzArray(Box<TypeTerm>),
    Array { rank: u8, elem: Box<TypeTerm> },
    Constructed { def: TypeIdent, args: Vec<TypeTerm> },
}

/// Structural unification of a term against a ground type, accumulating a
/// substitution. Variables bind any ground type; identical ground types
/// unify; constructed types unify by definition equality and pointwise
/// argument unification; arrays unify only with arrays of the same shape
/// (single-dimensional and rank-1 multi-dimensional are distinct).
pub fn unify(term: &TypeTerm, ground: &TypeIdent, subst: &mut BTreeMap<u8, TypeIdent>) -> bool {
    match (term, ground) {
        (TypeTerm::Var(v), _) => match subst.get(v) {
            Some(bound) => bound == ground,
            None => {
                subst.insert(*v, ground.clone());
                true
            }
        },
        (TypeTerm::Exact(t), g) => t == g,
        (TypeTerm::SzArray(te), TypeIdent::SzArray(ge)) => unify(te, ge, subst),
        (
            TypeTerm::Array { rank: r1, elem: te },
            TypeIdent::Array { rank: r2, elem: ge },
        ) => r1 == r2 && unify(te, ge, subst),
        (
            TypeTerm::Constructed { def, args },
            TypeIdent::Constructed {
                def: gdef,
                args: gargs,
            },
        ) => {
            def == gdef.as_ref()
                && args.len() == gargs.len()
                && args
                    .iter()
                    .zip(gargs)
                    .all(|(t, g)| unify(t, g, subst))
        }
        _ => false,
    }
}

type KernelFactory =
    Arc<dyn Fn(&Serializer, &[TypeIdent]) -> Result<Arc<dyn Formatter>> + Send + Sync>;
type PlainFactory = Arc<dyn Fn(&[TypeIdent]) -> Result<Arc<dyn Formatter>> + Send + Sync>;

/// Resolver that instantiates a formatter template for every ground type
/// unifying with its target term.
pub struct TemplateResolver {
    target: TypeTerm,
    arity: u8,
    with_kernel: Option<KernelFactory>,
    plain: Option<PlainFactory>,
}

impl TemplateResolver {
    pub fn new(target: TypeTerm, arity: u8) -> Self {
        Self {
            target,
            arity,
            with_kernel: None,
            plain: None,
        }
    }

    /// Factory receiving the kernel facade (preferred at instantiation).
    pub fn with_kernel_factory(
        mut self,
        factory: impl Fn(&Serializer, &[TypeIdent]) -> Result<Arc<dyn Formatter>>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.with_kernel = Some(Arc::new(factory));
        self
    }

    /// Parameterless fallback factory.
    pub fn with_plain_factory(
        mut self,
        factory: impl Fn(&[TypeIdent]) -> Result<Arc<dyn Formatter>> + Send + Sync + 'static,
    ) -> Self {
        self.plain = Some(Arc::new(factory));
        self
    }
}

impl Resolver for TemplateResolver {
    fn resolve(&self, ser: &Serializer, ty: &TypeIdent) -> Result<Option<Arc<dyn Formatter>>> {
        let mut subst = BTreeMap::new();
        if !unify(&self.target, ty, &mut subst) {
            return Ok(None);
        }
        // Every declared variable must have received a unique ground binding.
        let mut args = Vec::with_capacity(usize::from(self.arity));
        for v in 0..self.arity {
            match subst.get(&v) {
                Some(bound) => args.push(bound.clone()),
                None => return Ok(None),
            }
        }
        if let Some(factory) = &self.with_kernel {
            return factory(ser, &args).map(Some);
        }
        if let Some(factory) = &self.plain {
            return factory(&args).map(Some);
        }
        Err(Error::MissingFormatter {
            ty: format!("template for {} has no factory", ty),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::builtin;

    fn string_ty() -> TypeIdent {
        TypeIdent::BuiltinDef(builtin::STRING)
    }

    fn u64_ty() -> TypeIdent {
        TypeIdent::BuiltinDef(builtin::U64)
    }

    #[test]
    fn test_unify_variables_bind_ground_types() {
        let term = TypeTerm::Constructed {
            def: TypeIdent::BuiltinDef(builtin::MAP),
            args: vec![TypeTerm::Var(0), TypeTerm::Var(1)],
        };
        let ground = TypeIdent::constructed(
            TypeIdent::BuiltinDef(builtin::MAP),
            vec![string_ty(), u64_ty()],
        );
        let mut subst = BTreeMap::new();
        assert!(unify(&term, &ground, &mut subst));
        assert_eq!(subst.get(&0), Some(&string_ty()));
        assert_eq!(subst.get(&1), Some(&u64_ty()));
    }

    #[test]
    fn test_unify_repeated_variable_must_agree() {
        let term = TypeTerm::Constructed {
            def: TypeIdent::BuiltinDef(builtin::MAP),
            args: vec![TypeTerm::Var(0), TypeTerm::Var(0)],
        };
        let same = TypeIdent::constructed(
            TypeIdent::BuiltinDef(builtin::MAP),
            vec![string_ty(), string_ty()],
        );
        let differs = TypeIdent::constructed(
            TypeIdent::BuiltinDef(builtin::MAP),
            vec![string_ty(), u64_ty()],
        );
        assert!(unify(&term, &same, &mut BTreeMap::new()));
        assert!(!unify(&term, &differs, &mut BTreeMap::new()));
    }

    #[test]
    fn test_unify_array_shape_parity() {
        let sz_term = TypeTerm::SzArray(Box::new(TypeTerm::Var(0)));
        let sz = TypeIdent::sz_array(u64_ty());
        let rank1 = TypeIdent::array(1, u64_ty());

        assert!(unify(&sz_term, &sz, &mut BTreeMap::new()));
        // Single-dimensional and rank-1 general arrays are distinct shapes.
        assert!(!unify(&sz_term, &rank1, &mut BTreeMap::new()));
    }

    #[test]
    fn test_unify_exact_and_mismatch() {
        let term = TypeTerm::Exact(u64_ty());
        assert!(unify(&term, &u64_ty(), &mut BTreeMap::new()));
        assert!(!unify(&term, &string_ty(), &mut BTreeMap::new()));
    }
}
