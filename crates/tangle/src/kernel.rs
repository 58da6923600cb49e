// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! The kernel facade.
//!
//! A [`Serializer`] owns the configuration, the identity codec, the
//! formatter caches, the by-member plan cache, and the session pools. One
//! instance may be used from many threads: caches are concurrent and
//! insert-only (materialization is idempotent), and every top-level call
//! takes its own session from a pool and returns it on all paths.
//!
//! Encoding a graph that another thread is mutating is not detected: the
//! resulting bytes may describe an object state that never existed. The
//! kernel itself stays consistent either way.

use crate::codec::IdentCodec;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fmt::{builtin_resolvers, Formatter, Resolver};
use crate::model::{TypeIdent, TypeRegistry};
use crate::plan::{build_plan, MemberPlan};
use crate::refs::RefFormatter;
use crate::session::{DecodeSession, EncodeSession};
use crate::wire::{Reader, Writer};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// Sessions kept around for reuse per kind.
const SESSION_POOL_CAP: usize = 64;

/// A decode session that has been reset, so its slot vector is empty.
///
/// `DecodeSession` itself is not `Send` (live slots hold `Rc` handles), but
/// an empty one owns no shared state, so the pool may hand it to any thread.
struct IdleDecodeSession(DecodeSession);

// SAFETY: constructed only from a session whose reset() ran, i.e. whose slot
// vector is empty; there is no Rc left to alias across threads.
unsafe impl Send for IdleDecodeSession {}

/// The serializer kernel.
pub struct Serializer {
    config: Config,
    idents: IdentCodec,
    resolvers: Vec<Arc<dyn Resolver>>,
    ref_formatters: DashMap<TypeIdent, Arc<dyn Formatter>>,
    content_formatters: DashMap<TypeIdent, Arc<dyn Formatter>>,
    plans: DashMap<TypeIdent, Arc<MemberPlan>>,
    encode_pool: Mutex<Vec<EncodeSession>>,
    decode_pool: Mutex<Vec<IdleDecodeSession>>,
}

impl Serializer {
    /// Kernel over a type space with default configuration.
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Self::with_config(Config::default(), registry)
    }

    pub fn with_config(config: Config, registry: Arc<TypeRegistry>) -> Self {
        let idents = IdentCodec::new(
            registry,
            &config.known_packages,
            config.package_loader.clone(),
        );
        let resolvers: Vec<Arc<dyn Resolver>> = config
            .resolvers
            .iter()
            .cloned()
            .chain(builtin_resolvers())
            .collect();
        Self {
            config,
            idents,
            resolvers,
            ref_formatters: DashMap::new(),
            content_formatters: DashMap::new(),
            plans: DashMap::new(),
            encode_pool: Mutex::new(Vec::new()),
            decode_pool: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &TypeRegistry {
        self.idents.registry()
    }

    pub fn ident_codec(&self) -> &IdentCodec {
        &self.idents
    }

    /// Encode a value under its declared (static) type.
    pub fn encode_value(&self, declared: &TypeIdent, value: &crate::model::Value) -> Result<Vec<u8>> {
        let mut w = Writer::new();
        self.encode_into(declared, value, &mut w)?;
        Ok(w.into_bytes())
    }

    /// Encode into an existing writer.
    pub fn encode_into(
        &self,
        declared: &TypeIdent,
        value: &crate::model::Value,
        w: &mut Writer,
    ) -> Result<()> {
        let mut sess = self.take_encode_session();
        let result = self
            .formatter_for(declared)
            .and_then(|f| f.encode(self, &mut sess, w, value));
        self.return_encode_session(sess);
        result
    }

    /// Decode a whole buffer into a value of the declared type. Bytes left
    /// over after the value are *malformed* (trailing data).
    pub fn decode_value(&self, declared: &TypeIdent, bytes: &[u8]) -> Result<crate::model::Value> {
        let mut r = Reader::new(bytes);
        let mut sess = self.take_decode_session();
        let result = self
            .formatter_for(declared)
            .and_then(|f| f.decode(self, &mut sess, &mut r))
            .and_then(|value| {
                if r.is_eof() {
                    Ok(value)
                } else {
                    Err(Error::malformed(
                        r.offset(),
                        format!("{} trailing bytes after value", r.remaining()),
                    ))
                }
            });
        self.return_decode_session(sess);
        result
    }

    /// Static-type dispatch: reference kinds get the reference engine over
    /// the declared type, value kinds get the content formatter directly.
    pub fn formatter_for(&self, declared: &TypeIdent) -> Result<Arc<dyn Formatter>> {
        if !self.registry().is_reference(declared)? {
            return self.content_formatter(declared);
        }
        if let Some(f) = self.ref_formatters.get(declared) {
            return Ok(f.clone());
        }
        let sealed = self.registry().is_sealed(declared)?;
        let f: Arc<dyn Formatter> = Arc::new(RefFormatter::new(declared.clone(), sealed));
        self.ref_formatters.insert(declared.clone(), f.clone());
        Ok(f)
    }

    /// Materialize (or fetch) the content formatter for a type by walking
    /// the resolver chain; the first resolver that produces one wins.
    pub fn content_formatter(&self, ty: &TypeIdent) -> Result<Arc<dyn Formatter>> {
        if let Some(f) = self.content_formatters.get(ty) {
            return Ok(f.clone());
        }
        for resolver in &self.resolvers {
            if let Some(f) = resolver.resolve(self, ty)? {
                log::debug!("materialized formatter for {}", ty);
                self.content_formatters.insert(ty.clone(), f.clone());
                return Ok(f);
            }
        }
        Err(Error::MissingFormatter { ty: ty.to_string() })
    }

    /// Cached by-member plan of a registered aggregate.
    pub fn member_plan(&self, ty: &TypeIdent) -> Result<Arc<MemberPlan>> {
        if let Some(plan) = self.plans.get(ty) {
            return Ok(plan.clone());
        }
        let def = self
            .registry()
            .def_of(ty)
            .ok_or_else(|| Error::TypeNotFound {
                name: ty.to_string(),
            })?;
        let plan = Arc::new(build_plan(
            self.registry(),
            self.config.member_filter,
            self.config.construct_uninitialized,
            ty,
            &def,
        )?);
        self.plans.insert(ty.clone(), plan.clone());
        Ok(plan)
    }

    fn take_encode_session(&self) -> EncodeSession {
        self.encode_pool.lock().pop().unwrap_or_default()
    }

    fn return_encode_session(&self, mut sess: EncodeSession) {
        sess.reset();
        let mut pool = self.encode_pool.lock();
        if pool.len() < SESSION_POOL_CAP {
            pool.push(sess);
        }
    }

    fn take_decode_session(&self) -> DecodeSession {
        match self.decode_pool.lock().pop() {
            Some(IdleDecodeSession(mut sess)) => {
                sess.reset(self.config.max_allocated_bytes);
                sess
            }
            None => DecodeSession::new(self.config.max_allocated_bytes),
        }
    }

    fn return_decode_session(&self, mut sess: DecodeSession) {
        sess.reset(self.config.max_allocated_bytes);
        let mut pool = self.decode_pool.lock();
        if pool.len() < SESSION_POOL_CAP {
            pool.push(IdleDecodeSession(sess));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TypeRegistry;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_kernel_is_shareable_across_threads() {
        assert_send_sync::<Serializer>();
        // And actually usable from another thread.
        let ser = Arc::new(Serializer::new(Arc::new(TypeRegistry::new())));
        let ser2 = ser.clone();
        let handle = std::thread::spawn(move || {
            let ty = crate::model::TypeIdent::BuiltinDef(crate::model::builtin::U32);
            ser2.encode_value(&ty, &crate::model::Value::U32(5))
                .expect("encode on a second thread")
        });
        let bytes = handle.join().expect("thread completes");
        assert_eq!(bytes, [5, 0, 0, 0]);
    }
}
