//! Named groups of blueprints run together.
//!
//! # Design
//! A collection is validated when it is built, not when it runs: names must
//! be unique and every member must be a plain blueprint. Running fans out
//! sequentially in declaration order through the runner's cached path and
//! stops at the first failure.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::blueprint::Blueprint;
use crate::cache::CacheOptions;
use crate::error::Error;
use crate::model::Target;
use crate::outcome::Outcome;
use crate::runner::{Runnable, Runner};

/// An immutable, ordered `name → Blueprint` mapping with an optional
/// composite target.
#[derive(Clone)]
pub struct Collection {
    blueprints: Vec<(String, Blueprint)>,
    target: Option<Arc<dyn Target>>,
}

impl Collection {
    /// Build a collection from `(name, item)` pairs.
    ///
    /// Fails with `Error::Definition` when a name repeats, so the pairs do
    /// not form a mapping, or when an item is not a blueprint.
    pub fn new<I, K, V>(items: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Runnable>,
    {
        let mut seen = HashSet::new();
        let mut blueprints = Vec::new();
        for (name, item) in items {
            let name = name.into();
            if !seen.insert(name.clone()) {
                return Err(Error::Definition(format!(
                    "a collection of blueprints must be a mapping, `{name}` appears twice"
                )));
            }
            match item.into() {
                Runnable::Blueprint(blueprint) => blueprints.push((name, blueprint)),
                Runnable::Collection(_) => {
                    return Err(Error::Definition(format!(
                        "all collection values must be blueprints, `{name}` is a collection"
                    )))
                }
            }
        }
        Ok(Self {
            blueprints,
            target: None,
        })
    }

    /// Assemble results into `target` instead of returning them as a
    /// named mapping.
    pub fn with_target(mut self, target: Arc<dyn Target>) -> Self {
        self.target = Some(target);
        self
    }

    pub fn blueprints(&self) -> &[(String, Blueprint)] {
        &self.blueprints
    }

    pub fn target(&self) -> Option<&dyn Target> {
        self.target.as_deref()
    }

    pub fn len(&self) -> usize {
        self.blueprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blueprints.is_empty()
    }

    /// Turn assembled member results into the collection's result.
    pub fn create(&self, assembled: Vec<(String, Outcome)>) -> Result<Outcome, Error> {
        let Some(target) = &self.target else {
            return Ok(Outcome::Named(assembled));
        };
        let attributes: Map<String, Value> = assembled
            .iter()
            .map(|(name, outcome)| (name.clone(), outcome.to_value()))
            .collect();
        target.construct(attributes).map(Outcome::One)
    }

    /// Run every member through `runner`'s read-through path.
    pub fn run(&self, runner: &Runner, cache_options: &CacheOptions) -> Result<Outcome, Error> {
        let mut assembled = Vec::with_capacity(self.blueprints.len());
        for (name, blueprint) in &self.blueprints {
            tracing::debug!(member = %name, url = blueprint.url(), "running collection member");
            let outcome = runner.run_blueprint(blueprint, cache_options)?;
            assembled.push((name.clone(), outcome));
        }
        self.create(assembled)
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("blueprints", &self.blueprints)
            .field("target", &self.target.as_ref().map(|target| target.name()))
            .finish()
    }
}
