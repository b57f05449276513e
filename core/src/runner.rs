//! Top-level orchestration: default headers, read-through caching and the
//! named blueprint registry.
//!
//! # Design
//! A `Runner` owns the collaborators a blueprint needs at run time: the
//! transport, the cache and the response-logging policy. Blueprints stay
//! plain values and receive the runner by reference.
//!
//! The registry maps names to blueprint factories. `call` looks a name up,
//! builds the blueprint from the supplied arguments and runs it with the
//! cache options stored at registration. Unknown names are an
//! `Error::NotRegistered`.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::blueprint::{Blueprint, CallOptions, Fields};
use crate::cache::{Cache, CacheOptions, NullCache};
use crate::collection::Collection;
use crate::config::ResponseLogging;
use crate::error::Error;
use crate::http::Transport;
use crate::outcome::Outcome;

/// Something the runner can execute.
#[derive(Debug, Clone)]
pub enum Runnable {
    Blueprint(Blueprint),
    Collection(Collection),
}

impl From<Blueprint> for Runnable {
    fn from(blueprint: Blueprint) -> Self {
        Runnable::Blueprint(blueprint)
    }
}

impl From<Collection> for Runnable {
    fn from(collection: Collection) -> Self {
        Runnable::Collection(collection)
    }
}

/// Deferred blueprint construction: arguments in, blueprint out.
pub type BlueprintFactory = Arc<dyn Fn(&[Value]) -> Blueprint + Send + Sync>;

/// One named registry entry.
#[derive(Clone)]
pub struct RegistryEntry {
    pub factory: BlueprintFactory,
    pub cache: CacheOptions,
}

impl RegistryEntry {
    pub fn new<F>(factory: F, cache: CacheOptions) -> Self
    where
        F: Fn(&[Value]) -> Blueprint + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
            cache,
        }
    }
}

pub struct Runner {
    headers: Fields,
    cache: Arc<dyn Cache>,
    transport: Arc<dyn Transport>,
    registry: HashMap<String, RegistryEntry>,
    response_logging: ResponseLogging,
}

impl Runner {
    /// A runner with no default headers, a `NullCache`, an empty registry
    /// and the response-logging policy read from the environment.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            headers: Fields::new(),
            cache: Arc::new(NullCache::default()),
            transport: Arc::new(transport),
            registry: HashMap::new(),
            response_logging: ResponseLogging::from_env(),
        }
    }

    /// Headers sent with every request this runner makes.
    pub fn with_headers(mut self, headers: Fields) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_cache<C: Cache + 'static>(mut self, cache: Arc<C>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_registry(mut self, registry: HashMap<String, RegistryEntry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_response_logging(mut self, response_logging: ResponseLogging) -> Self {
        self.response_logging = response_logging;
        self
    }

    pub fn headers(&self) -> &Fields {
        &self.headers
    }

    pub fn cache(&self) -> &dyn Cache {
        self.cache.as_ref()
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn registry(&self) -> &HashMap<String, RegistryEntry> {
        &self.registry
    }

    pub fn response_logging(&self) -> ResponseLogging {
        self.response_logging
    }

    /// Options every blueprint run by this runner receives.
    pub fn call_options(&self) -> CallOptions {
        CallOptions::new().with_headers(self.headers.clone())
    }

    /// Run `item` without cache write options.
    pub fn run(&self, item: impl Into<Runnable>) -> Result<Outcome, Error> {
        self.run_with(item, &CacheOptions::default())
    }

    /// Run `item`, passing `cache_options` to every cache write.
    pub fn run_with(&self, item: impl Into<Runnable>, cache_options: &CacheOptions) -> Result<Outcome, Error> {
        match item.into() {
            Runnable::Blueprint(blueprint) => self.run_blueprint(&blueprint, cache_options),
            Runnable::Collection(collection) => collection.run(self, cache_options),
        }
    }

    /// Read-through execution of one blueprint.
    pub fn run_blueprint(&self, blueprint: &Blueprint, cache_options: &CacheOptions) -> Result<Outcome, Error> {
        let options = self.call_options();
        let id = self
            .cache
            .generate_key(blueprint.target(), &blueprint.request_options(&options));

        if self.cache.exist(&id) {
            if let Some(cached) = self.cache.read(&id) {
                return Ok(cached);
            }
        }

        let outcome = blueprint.run(options, self)?;
        Ok(self.cache.write(&id, outcome, cache_options))
    }

    /// Store a named blueprint factory.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F, cache_options: CacheOptions)
    where
        F: Fn(&[Value]) -> Blueprint + Send + Sync + 'static,
    {
        self.registry.insert(name.into(), RegistryEntry::new(factory, cache_options));
    }

    /// Build the blueprint registered as `name` from `args` and run it.
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Outcome, Error> {
        let entry = self
            .registry
            .get(name)
            .ok_or_else(|| Error::NotRegistered(name.to_string()))?;
        let blueprint = (entry.factory)(args);
        self.run_with(blueprint, &entry.cache)
    }
}
