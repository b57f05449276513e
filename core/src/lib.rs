//! Declarative HTTP API client pipeline.
//!
//! # Overview
//! A `Blueprint` describes one HTTP request and how to turn its response
//! into domain objects: compose the URL, send through a `Transport`,
//! classify the status, parse the body, rename keys, then build the target.
//! A `Collection` groups named blueprints and can assemble their results
//! into a composite. A `Runner` executes either with default headers,
//! read-through caching and a registry of named blueprint factories.
//!
//! # Design
//! - Blueprints are immutable values; per-call options are merged over the
//!   stored ones on every run.
//! - The transport is a trait object owned by the runner, so the pipeline
//!   is deterministic under test. `UreqTransport` (feature `ureq`) is the
//!   blocking network implementation.
//! - Built objects are `Resource` values erased to JSON attributes plus the
//!   response headers, status and field errors. `Resource::decode` recovers
//!   the typed model.
//! - Cache keys are a SHA-256 digest of the canonical (JCS) request
//!   surface, namespaced by the target type.

pub mod blueprint;
pub mod builder;
pub mod cache;
pub mod collection;
pub mod config;
pub mod error;
pub mod http;
pub mod key_replacer;
pub mod model;
pub mod outcome;
pub mod parser;
pub mod runner;
#[cfg(feature = "ureq")]
pub mod transport;
pub mod url_composer;

#[cfg(test)]
mod testing;

pub use blueprint::{Blueprint, BlueprintBuilder, CallOptions, Fields, RequestOptions};
pub use builder::{BuildInput, Builder, ModelBuilder};
pub use cache::{Cache, CacheBackend, CacheKeys, CacheOptions, MemoryStore, NullCache, StoreCache, Ttl};
pub use collection::Collection;
pub use config::{BlueprintConfig, ResponseLogging};
pub use error::{Error, ResponseError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};
pub use key_replacer::Replacements;
pub use model::{target, FieldErrors, Model, Resource, Target};
pub use outcome::Outcome;
pub use parser::{JsonParser, Parser, Payload};
pub use runner::{RegistryEntry, Runnable, Runner};
#[cfg(feature = "ureq")]
pub use transport::UreqTransport;
