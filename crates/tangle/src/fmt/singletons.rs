// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Formatters for the builtin value-type singletons: duration, timestamp,
//! uuid, 128-bit integers, and bit vectors.

use super::{mismatch, Formatter, Resolver};
use crate::error::Result;
use crate::kernel::Serializer;
use crate::model::{builtin, TypeIdent, Value};
use crate::session::{DecodeSession, EncodeSession};
use crate::wire::{Reader, Writer};
use std::sync::Arc;

/// Signed seconds plus a sub-second nanosecond part.
pub struct DurationFormatter;

impl Formatter for DurationFormatter {
    fn encode(
        &self,
        _ser: &Serializer,
        _sess: &mut EncodeSession,
        w: &mut Writer,
        value: &Value,
    ) -> Result<()> {
        let Value::Duration { secs, nanos } = value else {
            return Err(mismatch("duration", value));
        };
        w.write_i64_le(*secs);
        w.write_i32_le(*nanos);
        Ok(())
    }

    fn decode(
        &self,
        _ser: &Serializer,
        _sess: &mut DecodeSession,
        r: &mut Reader<'_>,
    ) -> Result<Value> {
        Ok(Value::Duration {
            secs: r.read_i64_le()?,
            nanos: r.read_i32_le()?,
        })
    }
}

/// Seconds since the epoch plus nanoseconds.
pub struct TimestampFormatter;

impl Formatter for TimestampFormatter {
    fn encode(
        &self,
        _ser: &Serializer,
        _sess: &mut EncodeSession,
        w: &mut Writer,
        value: &Value,
    ) -> Result<()> {
        let Value::Timestamp { secs, nanos } = value else {
            return Err(mismatch("timestamp", value));
        };
        w.write_i64_le(*secs);
        w.write_u32_le(*nanos);
        Ok(())
    }

    fn decode(
        &self,
        _ser: &Serializer,
        _sess: &mut DecodeSession,
        r: &mut Reader<'_>,
    ) -> Result<Value> {
        Ok(Value::Timestamp {
            secs: r.read_i64_le()?,
            nanos: r.read_u32_le()?,
        })
    }
}

/// Sixteen raw bytes.
pub struct UuidFormatter;

impl Formatter for UuidFormatter {
    fn encode(
        &self,
        _ser: &Serializer,
        _sess: &mut EncodeSession,
        w: &mut Writer,
        value: &Value,
    ) -> Result<()> {
        let Value::Uuid(bytes) = value else {
            return Err(mismatch("uuid", value));
        };
        w.write_bytes(bytes);
        Ok(())
    }

    fn decode(
        &self,
        _ser: &Serializer,
        _sess: &mut DecodeSession,
        r: &mut Reader<'_>,
    ) -> Result<Value> {
        let bytes = r.read_bytes(16)?;
        let mut out = [0u8; 16];
        out.copy_from_slice(bytes);
        Ok(Value::Uuid(out))
    }
}

/// 128-bit integers, little-endian.
pub struct Int128Formatter {
    signed: bool,
}

impl Int128Formatter {
    pub fn new(signed: bool) -> Self {
        Self { signed }
    }
}

impl Formatter for Int128Formatter {
    fn encode(
        &self,
        _ser: &Serializer,
        _sess: &mut EncodeSession,
        w: &mut Writer,
        value: &Value,
    ) -> Result<()> {
        match (self.signed, value) {
            (true, Value::I128(v)) => w.write_i128_le(*v),
            (false, Value::U128(v)) => w.write_u128_le(*v),
            (true, other) => return Err(mismatch("i128", other)),
            (false, other) => return Err(mismatch("u128", other)),
        }
        Ok(())
    }

    fn decode(
        &self,
        _ser: &Serializer,
        _sess: &mut DecodeSession,
        r: &mut Reader<'_>,
    ) -> Result<Value> {
        Ok(if self.signed {
            Value::I128(r.read_i128_le()?)
        } else {
            Value::U128(r.read_u128_le()?)
        })
    }
}

/// Bit vector: varuint bit count, then the bits packed LSB-first.
pub struct BitsFormatter;

impl Formatter for BitsFormatter {
    fn encode(
        &self,
        _ser: &Serializer,
        _sess: &mut EncodeSession,
        w: &mut Writer,
        value: &Value,
    ) -> Result<()> {
        let Value::Bits(bits) = value else {
            return Err(mismatch("bits", value));
        };
        w.write_varu64(bits.len() as u64);
        let mut byte = 0u8;
        for (i, bit) in bits.iter().enumerate() {
            if *bit {
                byte |= 1 << (i % 8);
            }
            if i % 8 == 7 {
                w.write_u8(byte);
                byte = 0;
            }
        }
        if bits.len() % 8 != 0 {
            w.write_u8(byte);
        }
        Ok(())
    }

    fn decode(
        &self,
        _ser: &Serializer,
        sess: &mut DecodeSession,
        r: &mut Reader<'_>,
    ) -> Result<Value> {
        let count = r.read_varu64()? as usize;
        let byte_len = count.div_ceil(8);
        sess.consume(byte_len)?;
        let packed = r.read_bytes(byte_len)?;
        let mut bits = Vec::with_capacity(count);
        for i in 0..count {
            bits.push(packed[i / 8] & (1 << (i % 8)) != 0);
        }
        Ok(Value::Bits(bits))
    }
}

/// Resolver for the value-type singletons.
pub struct SingletonResolver;

impl Resolver for SingletonResolver {
    fn resolve(&self, _ser: &Serializer, ty: &TypeIdent) -> Result<Option<Arc<dyn Formatter>>> {
        let TypeIdent::BuiltinDef(id) = ty else {
            return Ok(None);
        };
        Ok(match *id {
            builtin::DURATION => Some(Arc::new(DurationFormatter)),
            builtin::TIMESTAMP => Some(Arc::new(TimestampFormatter)),
            builtin::UUID => Some(Arc::new(UuidFormatter)),
            builtin::I128 => Some(Arc::new(Int128Formatter::new(true))),
            builtin::U128 => Some(Arc::new(Int128Formatter::new(false))),
            builtin::BITS => Some(Arc::new(BitsFormatter)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Bit packing is the only nontrivial wire layout here; pin it.
    #[test]
    fn test_bits_packing_layout() {
        let bits = vec![true, false, false, false, false, false, false, false, true];
        let mut packed = 0u8;
        for (i, bit) in bits.iter().take(8).enumerate() {
            if *bit {
                packed |= 1 << i;
            }
        }
        assert_eq!(packed, 0x01);
        assert_eq!(bits.len().div_ceil(8), 2);
    }
}
