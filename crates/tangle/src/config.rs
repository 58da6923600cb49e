// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Serializer configuration.

use crate::fmt::{Formatter, Resolver};
use crate::model::{PackageLoader, TypeIdent};
use crate::plan::MemberFilter;
use std::collections::HashMap;
use std::sync::Arc;

/// Default ceiling for the per-decode allocation approximation.
pub const DEFAULT_MAX_ALLOCATED_BYTES: usize = 256 * 1024 * 1024;

/// Recognized options of a serializer instance.
///
/// Trusted packages get the compact 8-byte hash encoding for themselves and
/// every type they contain. The allocation ceiling is a hard cap: a decode
/// whose running approximation passes it aborts with *quota-exceeded*.
pub struct Config {
    /// Packages whose types encode in the compact known-hash form.
    pub known_packages: Vec<String>,
    /// Hard cap for the per-decode allocation approximation.
    pub max_allocated_bytes: usize,
    /// Field selection filter for by-member plans.
    pub member_filter: MemberFilter,
    /// Allow raw allocation (skip constructors) for types without a usable
    /// no-arg constructor.
    pub construct_uninitialized: bool,
    /// User resolvers, tried before the built-in chain.
    pub resolvers: Vec<Arc<dyn Resolver>>,
    /// Per-type formatter overrides.
    pub custom_formatters: HashMap<TypeIdent, Arc<dyn Formatter>>,
    /// Decode-time fallback for packages outside the registry.
    pub package_loader: Option<PackageLoader>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            known_packages: Vec::new(),
            max_allocated_bytes: DEFAULT_MAX_ALLOCATED_BYTES,
            member_filter: MemberFilter::default(),
            construct_uninitialized: false,
            resolvers: Vec::new(),
            custom_formatters: HashMap::new(),
            package_loader: None,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_known_package(mut self, name: impl Into<String>) -> Self {
        self.known_packages.push(name.into());
        self
    }

    pub fn with_max_allocated_bytes(mut self, ceiling: usize) -> Self {
        self.max_allocated_bytes = ceiling;
        self
    }

    pub fn with_member_filter(mut self, filter: MemberFilter) -> Self {
        self.member_filter = filter;
        self
    }

    pub fn with_construct_uninitialized(mut self, allow: bool) -> Self {
        self.construct_uninitialized = allow;
        self
    }

    /// Prepend a user resolver; user resolvers run before the built-ins in
    /// the order given.
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    /// Override the formatter for one type.
    pub fn with_formatter(mut self, ty: TypeIdent, formatter: Arc<dyn Formatter>) -> Self {
        self.custom_formatters.insert(ty, formatter);
        self
    }

    pub fn with_package_loader(mut self, loader: PackageLoader) -> Self {
        self.package_loader = Some(loader);
        self
    }
}
