//! Shared blueprint settings and the response-logging policy.
//!
//! # Design
//! `BlueprintConfig` carries the settings a family of endpoints has in
//! common: host, parser, builder, key replacements, default headers,
//! timeout and response logging. It is an immutable value; a more specific
//! configuration is derived by overriding fields on a clone, e.g.
//! `parent.clone().with_host(..)`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::blueprint::{BlueprintBuilder, Fields, DEFAULT_TIMEOUT};
use crate::builder::{Builder, ModelBuilder};
use crate::error::Error;
use crate::http::HttpMethod;
use crate::key_replacer::Replacements;
use crate::model::{target, Model};
use crate::parser::{JsonParser, Parser};
use crate::url_composer;

/// Defaults applied to every blueprint declared through this value.
#[derive(Clone)]
pub struct BlueprintConfig {
    host: String,
    parser: Arc<dyn Parser>,
    builder: Arc<dyn Builder>,
    replacements: Replacements,
    headers: Fields,
    log_responses: bool,
    timeout: Duration,
}

impl Default for BlueprintConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            parser: Arc::new(JsonParser),
            builder: Arc::new(ModelBuilder),
            replacements: Replacements::new(),
            headers: Fields::new(),
            log_responses: false,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl BlueprintConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_parser(mut self, parser: Arc<dyn Parser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_builder(mut self, builder: Arc<dyn Builder>) -> Self {
        self.builder = builder;
        self
    }

    pub fn with_replacements(mut self, replacements: Replacements) -> Self {
        self.replacements = replacements;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_log_responses(mut self, log_responses: bool) -> Self {
        self.log_responses = log_responses;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn replacements(&self) -> &Replacements {
        &self.replacements
    }

    pub fn headers(&self) -> &Fields {
        &self.headers
    }

    pub fn log_responses(&self) -> bool {
        self.log_responses
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start a blueprint for `url` relative to the configured host.
    ///
    /// `method` must name one of the supported HTTP verbs.
    pub fn blueprint(&self, method: &str, url: &str) -> Result<BlueprintBuilder, Error> {
        let method: HttpMethod = method.parse()?;
        Ok(BlueprintBuilder::new(url_composer::compose(&self.host, url))
            .method(method)
            .headers(self.headers.clone())
            .parser(self.parser.clone())
            .builder(self.builder.clone())
            .replacements(self.replacements.clone())
            .log_responses(self.log_responses)
            .timeout(self.timeout))
    }

    /// Like `blueprint`, with `T` as the target type.
    pub fn for_model<T: Model>(&self, method: &str, url: &str) -> Result<BlueprintBuilder, Error> {
        Ok(self.blueprint(method, url)?.target(target::<T>()))
    }
}

impl fmt::Debug for BlueprintConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlueprintConfig")
            .field("host", &self.host)
            .field("replacements", &self.replacements)
            .field("headers", &self.headers)
            .field("log_responses", &self.log_responses)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Whether blueprints asking for response logging get it.
///
/// Outside production the blueprint's own flag decides. In production the
/// override variable must be set as well.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResponseLogging {
    production: bool,
    production_override: bool,
}

impl ResponseLogging {
    /// Names the deployment environment; `production` turns on the guard.
    pub const ENVIRONMENT_VAR: &'static str = "APP_ENV";
    /// Any non-empty value allows response logging in production.
    pub const OVERRIDE_VAR: &'static str = "ENABLE_PRODUCTION_RESPONSE_LOGGING";

    pub fn new(production: bool, production_override: bool) -> Self {
        Self {
            production,
            production_override,
        }
    }

    pub fn from_env() -> Self {
        let production = std::env::var(Self::ENVIRONMENT_VAR)
            .map(|env| env.eq_ignore_ascii_case("production"))
            .unwrap_or(false);
        let production_override = std::env::var(Self::OVERRIDE_VAR)
            .map(|value| !value.is_empty())
            .unwrap_or(false);
        Self::new(production, production_override)
    }

    pub fn allows(&self, log_responses: bool) -> bool {
        if self.production {
            log_responses && self.production_override
        } else {
            log_responses
        }
    }
}
