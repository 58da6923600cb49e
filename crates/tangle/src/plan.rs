// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! By-member plans.
//!
//! A plan is the interpreted form of a user aggregate's read/write routine:
//! which members persist, in which stable order, whether the type may be
//! copied field-for-field without dispatch (blittable), and how instances are
//! constructed. Plans are built once per type and cached for the process
//! lifetime; encode and decode walk the same plan, so there is no schema
//! tolerance.

use crate::error::{Error, Result};
use crate::fmt::Formatter;
use crate::kernel::Serializer;
use crate::model::{builtin, SetterKind, TypeDef, TypeIdent, TypeRegistry};
use std::sync::{Arc, OnceLock};

/// Field selection knobs (the user-configured filter of member selection).
#[derive(Debug, Clone, Copy)]
pub struct MemberFilter {
    /// Admit non-public fields.
    pub include_non_public: bool,
    /// Admit read-only fields.
    pub include_readonly: bool,
}

impl Default for MemberFilter {
    fn default() -> Self {
        Self {
            include_non_public: false,
            include_readonly: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Field,
    Property,
}

/// One persisted member: name, declared type, accessor kind, and the cached
/// child formatter.
pub struct MemberSpec {
    pub name: String,
    pub ty: TypeIdent,
    pub kind: MemberKind,
    formatter: OnceLock<Arc<dyn Formatter>>,
}

impl MemberSpec {
    fn new(name: String, ty: TypeIdent, kind: MemberKind) -> Self {
        Self {
            name,
            ty,
            kind,
            formatter: OnceLock::new(),
        }
    }

    /// Child formatter for this member's declared type, resolved once.
    pub fn formatter(&self, ser: &Serializer) -> Result<Arc<dyn Formatter>> {
        if let Some(f) = self.formatter.get() {
            return Ok(f.clone());
        }
        let resolved = ser.formatter_for(&self.ty)?;
        let _ = self.formatter.set(resolved.clone());
        Ok(resolved)
    }
}

/// The compiled (interpreted) read/write routine of one user aggregate.
pub struct MemberPlan {
    pub ty: TypeIdent,
    pub blittable: bool,
    /// Raw-allocate without running a constructor (user opt-in for types
    /// with no public no-arg constructor).
    pub construct_uninitialized: bool,
    pub members: Vec<MemberSpec>,
    pub declared_size: Option<u32>,
}

/// Build the plan for a registered aggregate.
pub fn build_plan(
    registry: &TypeRegistry,
    filter: MemberFilter,
    construct_uninitialized_opt_in: bool,
    ident: &TypeIdent,
    def: &TypeDef,
) -> Result<MemberPlan> {
    let default_constructible = def.has_default_ctor || def.value_type;
    if !default_constructible && !construct_uninitialized_opt_in {
        return Err(Error::MissingFormatter {
            ty: format!("{} has no usable constructor", ident),
        });
    }

    let mut members = Vec::new();
    let mut chain_pos: u32 = 0;
    let mut current = Some(def.clone());
    // Most-derived first; the chain position is the primary sort key.
    while let Some(def) = current {
        collect_members(&def, filter, chain_pos, &mut members)?;
        current = match &def.base {
            Some(base_ident) => Some(
                registry
                    .def_of(base_ident)
                    .ok_or_else(|| Error::TypeNotFound {
                        name: base_ident.to_string(),
                    })?
                    .as_ref()
                    .clone(),
            ),
            None => None,
        };
        chain_pos += 1;
        if chain_pos > 64 {
            return Err(Error::TypeNotFound {
                name: format!("inheritance chain of {} does not terminate", ident),
            });
        }
    }

    members.sort_by(|(pa, a), (pb, b)| pa.cmp(pb).then_with(|| a.name.cmp(&b.name)));
    // A derived member shadows a base member of the same name.
    let mut seen = std::collections::HashSet::new();
    let members: Vec<MemberSpec> = members
        .into_iter()
        .filter(|(_, m)| seen.insert(m.name.clone()))
        .map(|(_, m)| m)
        .collect();

    let blittable = def.value_type && blittable_size(registry, filter, ident).is_some();

    Ok(MemberPlan {
        ty: ident.clone(),
        blittable,
        construct_uninitialized: !default_constructible,
        members,
        declared_size: def.declared_size,
    })
}

fn collect_members(
    def: &TypeDef,
    filter: MemberFilter,
    chain_pos: u32,
    out: &mut Vec<(u32, MemberSpec)>,
) -> Result<()> {
    for field in def.fields() {
        // Synthesized backing fields are excluded here; their owning
        // property pulls them back in below.
        if field.synthesized {
            continue;
        }
        let include = match field.force {
            Some(forced) => forced,
            None => {
                (field.public || filter.include_non_public)
                    && (!field.readonly || filter.include_readonly)
            }
        };
        if include {
            out.push((
                chain_pos,
                MemberSpec::new(field.name.clone(), field.ty.clone(), MemberKind::Field),
            ));
        }
    }

    for prop in def.props() {
        // Set-only properties are ignored.
        if !prop.has_get {
            continue;
        }
        match prop.setter {
            SetterKind::Explicit => {
                return Err(Error::UnsupportedHost {
                    reason: format!(
                        "property {}.{} has explicit accessors and no backing field",
                        def.full_name, prop.name
                    ),
                });
            }
            SetterKind::None | SetterKind::Set | SetterKind::Init => {
                // Backed properties re-express as their backing field, so
                // get-only and init-only auto-properties round-trip.
                if prop.backing_field.is_none() {
                    log::debug!(
                        "skipping computed property {}.{}",
                        def.full_name,
                        prop.name
                    );
                    continue;
                }
                out.push((
                    chain_pos,
                    MemberSpec::new(prop.name.clone(), prop.ty.clone(), MemberKind::Property),
                ));
            }
        }
    }
    Ok(())
}

/// Fixed byte width of a builtin definition, when it has one.
pub fn builtin_width(id: u16) -> Option<u32> {
    match id {
        builtin::BOOL | builtin::U8 | builtin::I8 => Some(1),
        builtin::U16 | builtin::I16 | builtin::CHAR16 => Some(2),
        builtin::U32 | builtin::I32 | builtin::F32 => Some(4),
        builtin::U64 | builtin::I64 | builtin::F64 => Some(8),
        builtin::DURATION | builtin::TIMESTAMP => Some(12),
        builtin::DECIMAL | builtin::UUID | builtin::I128 | builtin::U128 => Some(16),
        _ => None,
    }
}

/// Byte size of a type under the raw-copy discipline, or `None` when the
/// type is not blittable. An aggregate is blittable iff it is a value type
/// with declared-sequential layout, every persisted member is blittable, and
/// the member sizes sum to the declared aggregate size (no padding).
pub fn blittable_size(
    registry: &TypeRegistry,
    filter: MemberFilter,
    ident: &TypeIdent,
) -> Option<u32> {
    match ident {
        TypeIdent::BuiltinDef(id) => builtin_width(*id),
        TypeIdent::NamedDef { .. } => {
            let def = registry.def_of(ident)?;
            if let crate::model::TypeBody::Enum { underlying, .. } = &def.body {
                return builtin_width(*underlying);
            }
            if !def.value_type || !def.layout_sequential {
                return None;
            }
            let declared = def.declared_size?;
            let mut sum: u32 = 0;
            let mut scratch = Vec::new();
            collect_members(&def, filter, 0, &mut scratch).ok()?;
            for (_, member) in &scratch {
                sum = sum.checked_add(blittable_size(registry, filter, &member.ty)?)?;
            }
            (sum == declared).then_some(declared)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldSpec, PropertySpec, TypeDef, TypeRegistry};

    fn u32_ty() -> TypeIdent {
        TypeIdent::BuiltinDef(builtin::U32)
    }

    fn u8_ty() -> TypeIdent {
        TypeIdent::BuiltinDef(builtin::U8)
    }

    fn plan_for(registry: &TypeRegistry, ident: &TypeIdent) -> Result<MemberPlan> {
        let def = registry.def_of(ident).expect("definition registered");
        build_plan(registry, MemberFilter::default(), false, ident, &def)
    }

    #[test]
    fn test_stable_order_by_chain_then_name() {
        let registry = TypeRegistry::new();
        let base = registry.register_type(
            TypeDef::class("acme", "acme.Base")
                .with_field(FieldSpec::new("alpha", u32_ty()))
                .with_field(FieldSpec::new("zeta", u32_ty())),
        );
        let derived = registry.register_type(
            TypeDef::class("acme", "acme.Derived")
                .with_base(base)
                .with_field(FieldSpec::new("mid", u32_ty()))
                .with_field(FieldSpec::new("beta", u32_ty())),
        );

        let plan = plan_for(&registry, &derived).expect("plan builds");
        let names: Vec<&str> = plan.members.iter().map(|m| m.name.as_str()).collect();
        // Derived members first (sorted by name), then base members.
        assert_eq!(names, ["beta", "mid", "alpha", "zeta"]);
    }

    #[test]
    fn test_field_filter_and_force() {
        let registry = TypeRegistry::new();
        let ident = registry.register_type(
            TypeDef::class("acme", "acme.Mixed")
                .with_field(FieldSpec::new("visible", u32_ty()))
                .with_field(FieldSpec::new("hidden", u32_ty()).non_public())
                .with_field(FieldSpec::new("pulled", u32_ty()).non_public().force_include())
                .with_field(FieldSpec::new("dropped", u32_ty()).force_exclude()),
        );

        let plan = plan_for(&registry, &ident).expect("plan builds");
        let names: Vec<&str> = plan.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["pulled", "visible"]);
    }

    #[test]
    fn test_auto_properties_round_trip_via_backing_field() {
        let registry = TypeRegistry::new();
        let ident = registry.register_type(
            TypeDef::class("acme", "acme.Props")
                .with_property(PropertySpec::auto("name", TypeIdent::BuiltinDef(builtin::STRING)))
                .with_property(PropertySpec::auto("score", u32_ty()).get_only())
                .with_property(PropertySpec::auto("tag", u32_ty()).init_only())
                .with_property(PropertySpec::auto("sink", u32_ty()).set_only()),
        );

        let plan = plan_for(&registry, &ident).expect("plan builds");
        let names: Vec<&str> = plan.members.iter().map(|m| m.name.as_str()).collect();
        // Set-only is ignored; backed get-only and init-only survive.
        assert_eq!(names, ["name", "score", "tag"]);
        assert!(plan.members.iter().all(|m| m.kind == MemberKind::Property));
    }

    #[test]
    fn test_synthesized_fields_excluded_from_enumeration() {
        let registry = TypeRegistry::new();
        let ident = registry.register_type(
            TypeDef::class("acme", "acme.Backed")
                .with_field(FieldSpec::new("<id>__backing", u32_ty()).synthesized())
                .with_property(
                    PropertySpec::auto("id", u32_ty()),
                ),
        );
        let plan = plan_for(&registry, &ident).expect("plan builds");
        let names: Vec<&str> = plan.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["id"]);
    }

    #[test]
    fn test_explicit_property_is_unsupported() {
        let registry = TypeRegistry::new();
        let ident = registry.register_type(
            TypeDef::class("acme", "acme.Opaque")
                .with_property(PropertySpec::explicit("window", u32_ty())),
        );
        assert!(matches!(
            plan_for(&registry, &ident),
            Err(Error::UnsupportedHost { .. })
        ));
    }

    #[test]
    fn test_constructibility_policy() {
        let registry = TypeRegistry::new();
        let ident =
            registry.register_type(TypeDef::class("acme", "acme.NoCtor").without_default_ctor());
        let def = registry.def_of(&ident).expect("registered");

        assert!(matches!(
            build_plan(&registry, MemberFilter::default(), false, &ident, &def),
            Err(Error::MissingFormatter { .. })
        ));

        let plan = build_plan(&registry, MemberFilter::default(), true, &ident, &def)
            .expect("uninitialized opt-in allows the plan");
        assert!(plan.construct_uninitialized);
    }

    #[test]
    fn test_blittable_requires_no_padding() {
        let registry = TypeRegistry::new();
        // u32 + u8, declared size 5: packed, blittable.
        let packed = registry.register_type(
            TypeDef::value_struct("acme", "acme.Packed")
                .with_field(FieldSpec::new("a", u32_ty()))
                .with_field(FieldSpec::new("b", u8_ty()))
                .with_layout(5),
        );
        // Same fields, declared size 8: padding, not blittable.
        let padded = registry.register_type(
            TypeDef::value_struct("acme", "acme.Padded")
                .with_field(FieldSpec::new("a", u32_ty()))
                .with_field(FieldSpec::new("b", u8_ty()))
                .with_layout(8),
        );

        let filter = MemberFilter::default();
        assert_eq!(blittable_size(&registry, filter, &packed), Some(5));
        assert_eq!(blittable_size(&registry, filter, &padded), None);

        assert!(plan_for(&registry, &packed).expect("packed plan").blittable);
        assert!(!plan_for(&registry, &padded).expect("padded plan").blittable);
    }

    #[test]
    fn test_blittable_nested_and_string_poison() {
        let registry = TypeRegistry::new();
        let inner = registry.register_type(
            TypeDef::value_struct("acme", "acme.Inner")
                .with_field(FieldSpec::new("x", u32_ty()))
                .with_layout(4),
        );
        let nested = registry.register_type(
            TypeDef::value_struct("acme", "acme.Nested")
                .with_field(FieldSpec::new("inner", inner))
                .with_field(FieldSpec::new("y", u32_ty()))
                .with_layout(8),
        );
        let stringy = registry.register_type(
            TypeDef::value_struct("acme", "acme.Stringy")
                .with_field(FieldSpec::new("s", TypeIdent::BuiltinDef(builtin::STRING)))
                .with_layout(8),
        );

        let filter = MemberFilter::default();
        assert_eq!(blittable_size(&registry, filter, &nested), Some(8));
        assert_eq!(blittable_size(&registry, filter, &stringy), None);
    }

    #[test]
    fn test_reference_type_never_blittable() {
        let registry = TypeRegistry::new();
        let ident = registry.register_type(
            TypeDef::class("acme", "acme.Obj")
                .with_field(FieldSpec::new("a", u32_ty())),
        );
        let plan = plan_for(&registry, &ident).expect("plan builds");
        assert!(!plan.blittable);
    }
}
