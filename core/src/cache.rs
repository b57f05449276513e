//! Result caching for the runner's read-through path.
//!
//! # Design
//! Fingerprints are `"<namespace>:<TypeName>:<digest>"`. The digest covers
//! the merged request options minus the body and minus any ignored headers
//! (request ids, trace ids). The options are serialized as RFC 8785
//! canonical JSON, where object keys are sorted, before hashing with
//! SHA-256. Two option sets with the same pairs in any order therefore share
//! a digest, and sets that differ in any hashed value do not.
//!
//! Caching is opt-in: `NullCache`, the runner's default, never hits.
//! `StoreCache` puts a real `CacheBackend` behind the `Cache` contract and
//! refuses to write entries whose TTL it cannot resolve.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::blueprint::RequestOptions;
use crate::model::Target;
use crate::outcome::Outcome;

pub const DEFAULT_NAMESPACE: &str = "api-blueprint";
/// Type segment of fingerprints for blueprints without a target type.
pub const UNTYPED: &str = "Response";

/// How long a cached result should live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ttl {
    For(Duration),
    /// Looked up in the cache's named TTL table.
    Named(String),
}

/// Options passed along with a cache write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheOptions {
    pub ttl: Option<Ttl>,
}

impl CacheOptions {
    pub fn ttl(duration: Duration) -> Self {
        Self {
            ttl: Some(Ttl::For(duration)),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            ttl: Some(Ttl::Named(name.into())),
        }
    }
}

/// Fingerprint generator shared by cache implementations.
#[derive(Debug, Clone)]
pub struct CacheKeys {
    namespace: String,
    ignored_headers: Vec<String>,
}

impl Default for CacheKeys {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}

impl CacheKeys {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ignored_headers: Vec::new(),
        }
    }

    /// Leave `name` out of the digest. Matching ignores case and treats
    /// `_` and `-` alike.
    pub fn ignore_header(mut self, name: &str) -> Self {
        self.ignored_headers.push(normalize_header(name));
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn generate(&self, target: Option<&dyn Target>, options: &RequestOptions) -> String {
        if let Some(key) = target.and_then(|target| target.cache_key(&self.namespace, options)) {
            return key;
        }
        let type_name = target.map_or(UNTYPED, |target| target.name());
        format!("{}:{}:{}", self.namespace, type_name, self.digest(options))
    }

    /// Hex SHA-256 of the canonical, body-less options.
    pub fn digest(&self, options: &RequestOptions) -> String {
        let headers: Map<String, Value> = options
            .headers
            .iter()
            .filter(|(name, _)| !self.is_ignored(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        let mut surface = Map::new();
        surface.insert("http_method".to_string(), Value::from(options.http_method.as_str()));
        surface.insert("url".to_string(), Value::String(options.url.clone()));
        surface.insert("headers".to_string(), Value::Object(headers));
        surface.insert("params".to_string(), Value::Object(options.params.clone()));
        let surface = Value::Object(surface);

        let canonical = serde_jcs::to_vec(&surface).unwrap_or_else(|_| surface.to_string().into_bytes());
        hex_encode(&Sha256::digest(&canonical))
    }

    fn is_ignored(&self, name: &str) -> bool {
        let name = normalize_header(name);
        self.ignored_headers.iter().any(|ignored| *ignored == name)
    }
}

fn normalize_header(name: &str) -> String {
    name.to_ascii_lowercase().replace('_', "-")
}

fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(char::from(HEX[usize::from(byte >> 4)]));
        out.push(char::from(HEX[usize::from(byte & 0x0f)]));
    }
    out
}

/// Storage contract of the runner's read-through path.
pub trait Cache: Send + Sync {
    fn keys(&self) -> &CacheKeys;

    fn exist(&self, id: &str) -> bool;

    fn read(&self, id: &str) -> Option<Outcome>;

    /// Store `data` under `id` and hand it back.
    fn write(&self, id: &str, data: Outcome, options: &CacheOptions) -> Outcome;

    fn generate_key(&self, target: Option<&dyn Target>, options: &RequestOptions) -> String {
        self.keys().generate(target, options)
    }
}

/// A cache that never stores anything.
#[derive(Debug, Clone, Default)]
pub struct NullCache {
    keys: CacheKeys,
}

impl NullCache {
    pub fn new(keys: CacheKeys) -> Self {
        Self { keys }
    }
}

impl Cache for NullCache {
    fn keys(&self) -> &CacheKeys {
        &self.keys
    }

    fn exist(&self, _id: &str) -> bool {
        false
    }

    fn read(&self, _id: &str) -> Option<Outcome> {
        None
    }

    fn write(&self, _id: &str, data: Outcome, _options: &CacheOptions) -> Outcome {
        data
    }
}

/// A key-value store that can hold outcomes.
pub trait CacheBackend: Send + Sync {
    fn exists(&self, key: &str) -> bool;

    fn get(&self, key: &str) -> Option<Outcome>;

    fn set(&self, key: &str, value: Outcome, ttl: Duration);

    /// Remove every key starting with `prefix`, returning how many went.
    fn delete_prefix(&self, prefix: &str) -> usize;
}

/// `Cache` backed by a `CacheBackend`.
pub struct StoreCache<B> {
    keys: CacheKeys,
    backend: B,
    named_ttls: HashMap<String, Duration>,
}

impl<B: CacheBackend> StoreCache<B> {
    pub fn new(keys: CacheKeys, backend: B) -> Self {
        Self {
            keys,
            backend,
            named_ttls: HashMap::new(),
        }
    }

    /// Make `Ttl::Named(name)` resolve to `duration`.
    pub fn with_named_ttl(mut self, name: impl Into<String>, duration: Duration) -> Self {
        self.named_ttls.insert(name.into(), duration);
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Drop every cached result built for the given type names.
    pub fn expire(&self, type_names: &[&str]) -> usize {
        type_names
            .iter()
            .map(|type_name| {
                tracing::debug!(type_name, "expiring cached results");
                self.backend
                    .delete_prefix(&format!("{}:{}:", self.keys.namespace(), type_name))
            })
            .sum()
    }

    fn resolve_ttl(&self, options: &CacheOptions) -> Option<Duration> {
        match options.ttl.as_ref()? {
            Ttl::For(duration) => Some(*duration),
            Ttl::Named(name) => self.named_ttls.get(name).copied(),
        }
    }
}

impl<B: CacheBackend> Cache for StoreCache<B> {
    fn keys(&self) -> &CacheKeys {
        &self.keys
    }

    fn exist(&self, id: &str) -> bool {
        let hit = self.backend.exists(id);
        if hit {
            tracing::debug!(id, "cache HIT");
        } else {
            tracing::debug!(id, "cache MISS");
        }
        hit
    }

    fn read(&self, id: &str) -> Option<Outcome> {
        self.backend.get(id)
    }

    fn write(&self, id: &str, data: Outcome, options: &CacheOptions) -> Outcome {
        match self.resolve_ttl(options) {
            Some(ttl) if !ttl.is_zero() => {
                tracing::debug!(id, ttl_secs = ttl.as_secs(), "cache WRITE");
                self.backend.set(id, data.clone(), ttl);
            }
            _ => tracing::debug!(id, ?options, "cache SKIPPING WRITE, no TTL"),
        }
        data
    }
}

struct Entry {
    value: Outcome,
    /// `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |expires_at| expires_at > now)
    }
}

/// In-process `CacheBackend` with expiring entries.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheBackend for MemoryStore {
    fn exists(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn get(&self, key: &str) -> Option<Outcome> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .filter(|entry| entry.is_live(Instant::now()))
            .map(|entry| entry.value.clone())
    }

    fn set(&self, key: &str, value: Outcome, ttl: Duration) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        entries.retain(|_, entry| entry.is_live(now));
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: now.checked_add(ttl),
            },
        );
    }

    fn delete_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }
}
