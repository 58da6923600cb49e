// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Primitive and enum formatters.

use super::{mismatch, Formatter, Resolver};
use crate::error::{Error, Result};
use crate::kernel::Serializer;
use crate::model::{builtin, TypeBody, TypeIdent, Value};
use crate::session::{DecodeSession, EncodeSession};
use crate::wire::{Reader, Writer};
use std::sync::Arc;

/// Fixed-width scalars, decimal, UTF-16 code units, and strings.
pub struct PrimitiveFormatter {
    id: u16,
}

impl PrimitiveFormatter {
    pub fn new(id: u16) -> Self {
        Self { id }
    }
}

impl Formatter for PrimitiveFormatter {
    fn encode(
        &self,
        _ser: &Serializer,
        _sess: &mut EncodeSession,
        w: &mut Writer,
        value: &Value,
    ) -> Result<()> {
        match (self.id, value) {
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
            (builtin::DECIMAL, Value::Decimal(words)) => w.write_decimal(words),
            (builtin::CHAR16, Value::Char16(unit)) => w.write_char16(*unit),
            (builtin::STRING, Value::Str(s)) => w.write_str(s),
            _ => return Err(mismatch(builtin::name(self.id), value)),
        }
        Ok(())
    }

    fn decode(
        &self,
        _ser: &Serializer,
        sess: &mut DecodeSession,
        r: &mut Reader<'_>,
    ) -> Result<Value> {
        Ok(match self.id {
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
            builtin::DECIMAL => Value::Decimal(r.read_decimal()?),
            builtin::CHAR16 => Value::Char16(r.read_char16()?),
            builtin::STRING => {
                let s = r.read_str()?;
                sess.consume(s.len())?;
                Value::Str(s)
            }
            other => {
                return Err(Error::MissingFormatter {
                    ty: builtin::name(other).into(),
                })
            }
        })
    }
}

/// Enum formatter: dispatches through the underlying integer.
pub struct EnumFormatter {
    underlying: u16,
}

impl EnumFormatter {
    pub fn new(underlying: u16) -> Self {
        Self { underlying }
    }

    fn range_err(&self, raw: i64) -> Error {
        Error::InvalidValue {
            reason: format!(
                "enum value {} does not fit its underlying {}",
                raw,
                builtin::name(self.underlying)
            ),
        }
    }
}

impl Formatter for EnumFormatter {
    fn encode(
        &self,
        _ser: &Serializer,
        _sess: &mut EncodeSession,
        w: &mut Writer,
        value: &Value,
    ) -> Result<()> {
        let raw = match value {
            Value::Enum(raw) => *raw,
            other => return Err(mismatch("enum", other)),
        };
        match self.underlying {
            builtin::U8 => w.write_u8(u8::try_from(raw).map_err(|_| self.range_err(raw))?),
            builtin::U16 => w.write_u16_le(u16::try_from(raw).map_err(|_| self.range_err(raw))?),
            builtin::U32 => w.write_u32_le(u32::try_from(raw).map_err(|_| self.range_err(raw))?),
            builtin::U64 => w.write_u64_le(u64::try_from(raw).map_err(|_| self.range_err(raw))?),
            builtin::I8 => w.write_i8(i8::try_from(raw).map_err(|_| self.range_err(raw))?),
            builtin::I16 => w.write_i16_le(i16::try_from(raw).map_err(|_| self.range_err(raw))?),
            builtin::I32 => w.write_i32_le(i32::try_from(raw).map_err(|_| self.range_err(raw))?),
            builtin::I64 => w.write_i64_le(raw),
            other => {
                return Err(Error::InvalidValue {
                    reason: format!("{} cannot underlie an enum", builtin::name(other)),
                })
            }
        }
        Ok(())
    }

    fn decode(
        &self,
        _ser: &Serializer,
        _sess: &mut DecodeSession,
        r: &mut Reader<'_>,
    ) -> Result<Value> {
        let raw = match self.underlying {
            builtin::U8 => i64::from(r.read_u8()?),
            builtin::U16 => i64::from(r.read_u16_le()?),
            builtin::U32 => i64::from(r.read_u32_le()?),
            builtin::U64 => {
                let v = r.read_u64_le()?;
                i64::try_from(v).map_err(|_| {
                    Error::malformed(r.offset(), "u64 enum value exceeds representable range")
                })?
            }
            builtin::I8 => i64::from(r.read_i8()?),
            builtin::I16 => i64::from(r.read_i16_le()?),
            builtin::I32 => i64::from(r.read_i32_le()?),
            builtin::I64 => r.read_i64_le()?,
            other => {
                return Err(Error::MissingFormatter {
                    ty: format!("enum over {}", builtin::name(other)),
                })
            }
        };
        Ok(Value::Enum(raw))
    }
}

/// Resolver for the primitive singletons.
pub struct PrimitiveResolver;

impl Resolver for PrimitiveResolver {
    fn resolve(&self, _ser: &Serializer, ty: &TypeIdent) -> Result<Option<Arc<dyn Formatter>>> {
        let TypeIdent::BuiltinDef(id) = ty else {
            return Ok(None);
        };
        Ok(match *id {
            builtin::BOOL
            | builtin::U8
            | builtin::U16
            | builtin::U32
            | builtin::U64
            | builtin::I8
            | builtin::I16
            | builtin::I32
            | builtin::I64
            | builtin::F32
            | builtin::F64
            | builtin::DECIMAL
            | builtin::CHAR16
            | builtin::STRING => Some(Arc::new(PrimitiveFormatter::new(*id))),
            _ => None,
        })
    }
}

/// Resolver for registered enumerations.
pub struct EnumResolver;

impl Resolver for EnumResolver {
    fn resolve(&self, ser: &Serializer, ty: &TypeIdent) -> Result<Option<Arc<dyn Formatter>>> {
        let Some(def) = ser.registry().def_of(ty) else {
            return Ok(None);
        };
        match &def.body {
            TypeBody::Enum { underlying, .. } => {
                Ok(Some(Arc::new(EnumFormatter::new(*underlying))))
            }
            _ => Ok(None),
        }
    }
}
