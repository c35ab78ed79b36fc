//! Process-wide header cache (spec §4.2).
//!
//! Maps a signing-credential fingerprint to its precomputed, base64url-
//! encoded `{alg, kid, typ: "JWT"}` header string, so the builder's hot path
//! skips JSON serialization on every call. Backed by `dashmap`, the same
//! concurrent map `raif-s-naffah-xapi-rs` reaches for elsewhere in its
//! stack; entries never expire, only grow, since the set of distinct
//! signing credentials in a process is small in practice.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Map, Value};

use crate::credentials::SigningCredentials;
use crate::error::Result;

/// A fingerprint identifying a `SigningCredentials` well enough to cache its
/// encoded header: `kid`, algorithm, and a hash of the key material (never
/// the key material itself).
pub type Fingerprint = u64;

/// A concurrent, insert-only cache from fingerprint to encoded header.
#[derive(Debug, Default)]
pub struct HeaderCache {
    entries: DashMap<Fingerprint, Arc<str>>,
}

impl HeaderCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of distinct headers currently cached. Exposed for tests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fingerprints a `SigningCredentials`: `keyId || algorithm ||
    /// keyMaterialIdentity`, as spec.md names it. Key material is hashed,
    /// never copied into the fingerprint.
    pub fn fingerprint(sc: &SigningCredentials) -> Fingerprint {
        let mut hasher = DefaultHasher::new();
        sc.key.key_id().hash(&mut hasher);
        sc.algorithm.hash(&mut hasher);
        match sc.key.symmetric_secret() {
            Some(secret) => secret.hash(&mut hasher),
            None => 0u8.hash(&mut hasher),
        }
        hasher.finish()
    }

    /// Returns the cached encoded header for `fingerprint`, computing and
    /// inserting it via `build` on a miss. If another caller races us and
    /// inserts first, our computation is discarded and the existing
    /// (byte-identical) entry is returned — "at-most-one computation" is
    /// not guaranteed, but at-most-one-survives is.
    pub fn get_or_insert_with(
        &self,
        fingerprint: Fingerprint,
        build: impl FnOnce() -> Result<String>,
    ) -> Result<Arc<str>> {
        if let Some(existing) = self.entries.get(&fingerprint) {
            return Ok(existing.clone());
        }
        let built: Arc<str> = Arc::from(build()?.into_boxed_str());
        let entry = self
            .entries
            .entry(fingerprint)
            .or_insert_with(|| built.clone());
        Ok(entry.clone())
    }
}

/// Builds the compact `{alg, kid?, typ: "JWT"}` JWS header JSON, matching
/// spec §4.3 step 1.
pub fn jws_header_json(sc: &SigningCredentials) -> Map<String, Value> {
    let mut header = Map::new();
    header.insert("alg".into(), Value::String(sc.algorithm.clone()));
    if let Some(kid) = sc.key.key_id() {
        header.insert("kid".into(), Value::String(kid.to_owned()));
    }
    header.insert("typ".into(), Value::String("JWT".into()));
    header
}
