// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Buffer codec: little-endian scalars, LEB128 varints, length-prefixed
//! strings, raw byte runs.

pub mod cursor;
pub mod varint;

pub use cursor::{Reader, Writer};
pub use varint::{unzigzag32, unzigzag64, zigzag32, zigzag64};
