// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Failure taxonomy for encode/decode operations.
//!
//! All failures unwind to the top-level entry point; nothing is silently
//! recovered. Session state is returned to its pool on every path.

use std::fmt;

/// Serialization/deserialization error.
#[derive(Debug, Clone)]
pub enum Error {
    /// Wire-format violation: truncated read, bad bool byte, overlong varint,
    /// back-reference to an empty or out-of-range slot, trailing data.
    Malformed { offset: usize, reason: String },

    /// A type, package, or method identity could not be resolved against the
    /// registered type space.
    TypeNotFound { name: String },

    /// The resolver chain produced no formatter for the requested type.
    MissingFormatter { ty: String },

    /// The per-decode allocation approximation passed the configured ceiling.
    QuotaExceeded { limit: usize, requested: usize },

    /// The registered type space cannot express a required access path
    /// (e.g. a property with explicit accessors and no backing field).
    UnsupportedHost { reason: String },

    /// Encode-side usage error: the supplied value does not match the
    /// declared type of the slot being written.
    InvalidValue { reason: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Malformed { offset, reason } => {
                write!(f, "malformed input at offset {}: {}", offset, reason)
            }
            Error::TypeNotFound { name } => write!(f, "type not found: {}", name),
            Error::MissingFormatter { ty } => write!(f, "no formatter for type: {}", ty),
            Error::QuotaExceeded { limit, requested } => {
                write!(
                    f,
                    "allocation quota exceeded: limit {} bytes, running total {}",
                    limit, requested
                )
            }
            Error::UnsupportedHost { reason } => write!(f, "unsupported host: {}", reason),
            Error::InvalidValue { reason } => write!(f, "invalid value: {}", reason),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a malformed-input error.
    pub(crate) fn malformed(offset: usize, reason: impl Into<String>) -> Self {
        Error::Malformed {
            offset,
            reason: reason.into(),
        }
    }
}
