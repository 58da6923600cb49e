// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! By-member and blittable formatters for registered aggregates.
//!
//! The by-member routine walks the type's member plan: each member encodes
//! through the formatter of its declared type, concatenated in the plan's
//! stable order with no framing. The blittable routine is the authorized
//! shortcut: every member is a fixed-width scalar (or a nested blittable
//! aggregate), so the fields are written directly without dispatch. Both
//! routines produce identical bytes for a blittable type.

use super::{mismatch, Formatter, Resolver};
use crate::error::{Error, Result};
use crate::kernel::Serializer;
use crate::model::{builtin, ObjRef, TypeBody, TypeIdent, Value};
use crate::plan::MemberPlan;
use crate::session::{DecodeSession, EncodeSession};
use crate::wire::{Reader, Writer};
use std::collections::HashMap;
use std::sync::Arc;

/// Interpreted member-by-member routine.
pub struct ByMemberFormatter {
    plan: Arc<MemberPlan>,
}

impl ByMemberFormatter {
    pub fn new(plan: Arc<MemberPlan>) -> Self {
        Self { plan }
    }
}

impl Formatter for ByMemberFormatter {
    fn encode(
        &self,
        ser: &Serializer,
        sess: &mut EncodeSession,
        w: &mut Writer,
        value: &Value,
    ) -> Result<()> {
        let Value::Struct(fields) = value else {
            return Err(mismatch("aggregate", value));
        };
        for member in &self.plan.members {
            let field = fields.get(&member.name).ok_or_else(|| Error::InvalidValue {
                reason: format!("{} is missing member {}", self.plan.ty, member.name),
            })?;
            member.formatter(ser)?.encode(ser, sess, w, field)?;
        }
        Ok(())
    }

    fn decode(
        &self,
        ser: &Serializer,
        sess: &mut DecodeSession,
        r: &mut Reader<'_>,
    ) -> Result<Value> {
        let mut fields = HashMap::with_capacity(self.plan.members.len());
        for member in &self.plan.members {
            let value = member.formatter(ser)?.decode(ser, sess, r)?;
            fields.insert(member.name.clone(), value);
        }
        Ok(Value::Struct(fields))
    }

    fn decode_into(
        &self,
        ser: &Serializer,
        sess: &mut DecodeSession,
        r: &mut Reader<'_>,
        obj: &ObjRef,
        ty: &TypeIdent,
    ) -> Result<()> {
        // Install the shell before the first member decodes, so members can
        // reach back to this object through cycles.
        {
            let mut cell = obj.borrow_mut();
            cell.ty = Some(ty.clone());
            cell.body = Value::Struct(HashMap::with_capacity(self.plan.members.len()));
        }
        for member in &self.plan.members {
            let value = member.formatter(ser)?.decode(ser, sess, r)?;
            if let Value::Struct(fields) = &mut obj.borrow_mut().body {
                fields.insert(member.name.clone(), value);
            }
        }
        Ok(())
    }
}

/// Field-for-field copy of a blittable aggregate.
pub struct BlittableFormatter {
    plan: Arc<MemberPlan>,
}

impl BlittableFormatter {
    pub fn new(plan: Arc<MemberPlan>) -> Self {
        Self { plan }
    }
}

impl Formatter for BlittableFormatter {
    fn encode(
        &self,
        ser: &Serializer,
        _sess: &mut EncodeSession,
        w: &mut Writer,
        value: &Value,
    ) -> Result<()> {
        write_raw_aggregate(ser, w, &self.plan, value)
    }

    fn decode(
        &self,
        ser: &Serializer,
        _sess: &mut DecodeSession,
        r: &mut Reader<'_>,
    ) -> Result<Value> {
        read_raw_aggregate(ser, r, &self.plan)
    }
}

fn write_raw_aggregate(
    ser: &Serializer,
    w: &mut Writer,
    plan: &MemberPlan,
    value: &Value,
) -> Result<()> {
    let Value::Struct(fields) = value else {
        return Err(mismatch("aggregate", value));
    };
    for member in &plan.members {
        let field = fields.get(&member.name).ok_or_else(|| Error::InvalidValue {
            reason: format!("{} is missing member {}", plan.ty, member.name),
        })?;
        write_raw(ser, w, &member.ty, field)?;
    }
    Ok(())
}

fn read_raw_aggregate(ser: &Serializer, r: &mut Reader<'_>, plan: &MemberPlan) -> Result<Value> {
    let mut fields = HashMap::with_capacity(plan.members.len());
    for member in &plan.members {
        fields.insert(member.name.clone(), read_raw(ser, r, &member.ty)?);
    }
    Ok(Value::Struct(fields))
}

fn write_raw(ser: &Serializer, w: &mut Writer, ty: &TypeIdent, value: &Value) -> Result<()> {
    if let TypeIdent::BuiltinDef(id) = ty {
        match (*id, value) {
            (builtin::BOOL, Value::Bool(v)) => w.write_bool(*v),
            (builtin::U8, Value::U8(v)) => w.write_u8(*v),
            (builtin::U16, Value::U16(v)) => w.write_u16_le(*v),
            (builtin::U32, Value::U32(v)) => w.write_u32_le(*v),
            (builtin::U64, Value::U64(v)) => w.write_u64_le(*v),
            (builtin::I8, Value::I8(v)) => w.write_i8(*v),
            (builtin::I16, Value::I16(v)) => w.write_i16_le(*v),
            (builtin::I32, Value::I32(v)) => w.write_i32_le(*v),
            (builtin::I64, Value::I64(v)) => w.write_i64_le(*v),
            (builtin::F32, Value::F32(v)) => w.write_f32_le(*v),
            (builtin::F64, Value::F64(v)) => w.write_f64_le(*v),
            (builtin::CHAR16, Value::Char16(v)) => w.write_char16(*v),
            (builtin::DECIMAL, Value::Decimal(words)) => w.write_decimal(words),
            (builtin::DURATION, Value::Duration { secs, nanos }) => {
                w.write_i64_le(*secs);
                w.write_i32_le(*nanos);
            }
            (builtin::TIMESTAMP, Value::Timestamp { secs, nanos }) => {
                w.write_i64_le(*secs);
                w.write_u32_le(*nanos);
            }
            (builtin::UUID, Value::Uuid(bytes)) => w.write_bytes(bytes),
            (builtin::I128, Value::I128(v)) => w.write_i128_le(*v),
            (builtin::U128, Value::U128(v)) => w.write_u128_le(*v),
            _ => return Err(mismatch(builtin::name(*id), value)),
        }
        return Ok(());
    }
    let def = ser.registry().def_of(ty).ok_or_else(|| Error::TypeNotFound {
        name: ty.to_string(),
    })?;
    if let TypeBody::Enum { underlying, .. } = &def.body {
        return write_raw(
            ser,
            w,
            &TypeIdent::BuiltinDef(*underlying),
            &raw_enum_value(*underlying, value)?,
        );
    }
    let plan = ser.member_plan(ty)?;
    write_raw_aggregate(ser, w, &plan, value)
}

fn read_raw(ser: &Serializer, r: &mut Reader<'_>, ty: &TypeIdent) -> Result<Value> {
    if let TypeIdent::BuiltinDef(id) = ty {
        return Ok(match *id {
            builtin::BOOL => Value::Bool(r.read_bool()?),
            builtin::U8 => Value::U8(r.read_u8()?),
            builtin::U16 => Value::U16(r.read_u16_le()?),
            builtin::U32 => Value::U32(r.read_u32_le()?),
            builtin::U64 => Value::U64(r.read_u64_le()?),
            builtin::I8 => Value::I8(r.read_i8()?),
            builtin::I16 => Value::I16(r.read_i16_le()?),
            builtin::I32 => Value::I32(r.read_i32_le()?),
            builtin::I64 => Value::I64(r.read_i64_le()?),
            builtin::F32 => Value::F32(r.read_f32_le()?),
            builtin::F64 => Value::F64(r.read_f64_le()?),
            builtin::CHAR16 => Value::Char16(r.read_char16()?),
            builtin::DECIMAL => Value::Decimal(r.read_decimal()?),
            builtin::DURATION => Value::Duration {
                secs: r.read_i64_le()?,
                nanos: r.read_i32_le()?,
            },
            builtin::TIMESTAMP => Value::Timestamp {
                secs: r.read_i64_le()?,
                nanos: r.read_u32_le()?,
            },
            builtin::UUID => {
                let mut out = [0u8; 16];
                out.copy_from_slice(r.read_bytes(16)?);
                Value::Uuid(out)
            }
            builtin::I128 => Value::I128(r.read_i128_le()?),
            builtin::U128 => Value::U128(r.read_u128_le()?),
            other => {
                return Err(Error::MissingFormatter {
                    ty: builtin::name(other).into(),
                })
            }
        });
    }
    let def = ser.registry().def_of(ty).ok_or_else(|| Error::TypeNotFound {
        name: ty.to_string(),
    })?;
    if let TypeBody::Enum { underlying, .. } = &def.body {
        let raw = read_raw(ser, r, &TypeIdent::BuiltinDef(*underlying))?;
        return Ok(Value::Enum(raw_to_i64(&raw)));
    }
    let plan = ser.member_plan(ty)?;
    read_raw_aggregate(ser, r, &plan)
}

fn raw_enum_value(underlying: u16, value: &Value) -> Result<Value> {
    let Value::Enum(raw) = value else {
        return Err(mismatch("enum", value));
    };
    let narrow_err = || Error::InvalidValue {
        reason: format!(
            "enum value {} does not fit its underlying {}",
            raw,
            builtin::name(underlying)
        ),
    };
    Ok(match underlying {
        builtin::U8 => Value::U8(u8::try_from(*raw).map_err(|_| narrow_err())?),
        builtin::U16 => Value::U16(u16::try_from(*raw).map_err(|_| narrow_err())?),
        builtin::U32 => Value::U32(u32::try_from(*raw).map_err(|_| narrow_err())?),
        builtin::U64 => Value::U64(u64::try_from(*raw).map_err(|_| narrow_err())?),
        builtin::I8 => Value::I8(i8::try_from(*raw).map_err(|_| narrow_err())?),
        builtin::I16 => Value::I16(i16::try_from(*raw).map_err(|_| narrow_err())?),
        builtin::I32 => Value::I32(i32::try_from(*raw).map_err(|_| narrow_err())?),
        builtin::I64 => Value::I64(*raw),
        _ => return Err(narrow_err()),
    })
}

fn raw_to_i64(value: &Value) -> i64 {
    match value {
        Value::U8(v) => i64::from(*v),
        Value::U16(v) => i64::from(*v),
        Value::U32(v) => i64::from(*v),
        Value::U64(v) => *v as i64,
        Value::I8(v) => i64::from(*v),
        Value::I16(v) => i64::from(*v),
        Value::I32(v) => i64::from(*v),
        Value::I64(v) => *v,
        _ => 0,
    }
}

/// Raw copy for blittable aggregates.
pub struct BlittableResolver;

impl Resolver for BlittableResolver {
    fn resolve(&self, ser: &Serializer, ty: &TypeIdent) -> Result<Option<Arc<dyn Formatter>>> {
        let Some(def) = ser.registry().def_of(ty) else {
            return Ok(None);
        };
        if !def.value_type || !matches!(def.body, TypeBody::Aggregate { .. }) {
            return Ok(None);
        }
        let plan = ser.member_plan(ty)?;
        Ok(plan
            .blittable
            .then(|| Arc::new(BlittableFormatter::new(plan)) as Arc<dyn Formatter>))
    }
}

/// Last resort for registered aggregates: the by-member routine.
pub struct ByMemberResolver;

impl Resolver for ByMemberResolver {
    fn resolve(&self, ser: &Serializer, ty: &TypeIdent) -> Result<Option<Arc<dyn Formatter>>> {
        let Some(def) = ser.registry().def_of(ty) else {
            return Ok(None);
        };
        if !matches!(def.body, TypeBody::Aggregate { .. }) {
            return Ok(None);
        }
        let plan = ser.member_plan(ty)?;
        Ok(Some(Arc::new(ByMemberFormatter::new(plan))))
    }
}
