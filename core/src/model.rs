//! Target types and the objects built from responses.
//!
//! # Design
//! A target type is anything a blueprint can construct from a mapping. The
//! pipeline talks to it through the object-safe `Target` trait so one
//! collection can mix blueprints that build different types. Plain serde
//! structs opt in by implementing `Model`; `target::<T>()` wraps them.
//!
//! Construction is deserialization, so serde's type coercion is the
//! attribute validation layer. `Model::validate` adds field-level checks on
//! top. The constructed value is kept as a `Resource`: the model's
//! normalized attributes plus the response status and headers it came
//! from. Use `Resource::decode` to get the typed model back.

use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use crate::blueprint::RequestOptions;
use crate::error::Error;

/// Attribute carrying the response headers into construction.
pub const RESPONSE_HEADERS: &str = "response_headers";
/// Attribute carrying the response status into construction.
pub const RESPONSE_STATUS: &str = "response_status";

/// Field-level validation messages, `field → [message]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Messages recorded for `field`, empty when there are none.
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of fields with at least one message.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(field, messages)| (field.as_str(), messages.as_slice()))
    }

    /// Append every message of `other`.
    pub fn extend(&mut self, other: FieldErrors) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(field, messages)| {
                    let messages = messages.iter().cloned().map(Value::String).collect();
                    (field.clone(), Value::Array(messages))
                })
                .collect(),
        )
    }
}

/// Field key for problems that serde does not tie to one attribute.
pub const BASE_FIELD: &str = "base";

/// Field errors describing why serde rejected a model's attributes.
///
/// A missing attribute is reported as blank on that attribute. Other
/// messages that name an attribute land on it; the rest land on
/// `BASE_FIELD`.
pub(crate) fn construction_errors(message: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if let Some(field) = quoted_field(message, "missing field `") {
        errors.add(field, "can't be blank");
    } else if let Some(field) =
        quoted_field(message, "unknown field `").or_else(|| quoted_field(message, "duplicate field `"))
    {
        errors.add(field, message);
    } else {
        errors.add(BASE_FIELD, message);
    }
    errors
}

fn quoted_field<'a>(message: &'a str, prefix: &str) -> Option<&'a str> {
    message
        .strip_prefix(prefix)
        .and_then(|rest| rest.split_once('`'))
        .map(|(field, _)| field)
}

/// A serde model a blueprint can build.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct City { name: String }
///
/// impl Model for City {
///     const NAME: &'static str = "City";
/// }
/// ```
pub trait Model: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Type name used in cache fingerprints and error messages.
    const NAME: &'static str;

    /// Record field-level problems. A model with errors is invalid.
    fn validate(&self, _errors: &mut FieldErrors) {}

    /// Replace the default cache fingerprint for this type entirely.
    fn cache_key(_namespace: &str, _options: &RequestOptions) -> Option<String> {
        None
    }
}

/// Construction capability consumed by the builder and collections.
pub trait Target: Send + Sync {
    fn name(&self) -> &str;

    /// Build an instance from `attributes`. The synthetic
    /// `response_headers` / `response_status` attributes, when present, end
    /// up on the resource rather than in its attributes.
    fn construct(&self, attributes: Map<String, Value>) -> Result<Resource, Error>;

    /// A custom fingerprint overriding the cache's default algorithm.
    fn cache_key(&self, _namespace: &str, _options: &RequestOptions) -> Option<String> {
        None
    }
}

/// Wrap a `Model` as a shareable `Target`.
pub fn target<T: Model>() -> Arc<dyn Target> {
    Arc::new(ModelTarget::<T>(PhantomData))
}

/// `Target` implementation for serde models.
pub struct ModelTarget<T>(PhantomData<fn() -> T>);

impl<T: Model> Target for ModelTarget<T> {
    fn name(&self) -> &str {
        T::NAME
    }

    fn construct(&self, mut attributes: Map<String, Value>) -> Result<Resource, Error> {
        let (response_headers, response_status) = take_response_fields(&mut attributes);

        let model: T = serde_json::from_value(Value::Object(attributes)).map_err(|err| Error::Construct {
            target: T::NAME.to_string(),
            message: err.to_string(),
        })?;

        let mut errors = FieldErrors::new();
        model.validate(&mut errors);

        let attributes = match serde_json::to_value(&model) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                return Err(Error::Construct {
                    target: T::NAME.to_string(),
                    message: "model does not serialize to a mapping".to_string(),
                })
            }
            Err(err) => {
                return Err(Error::Construct {
                    target: T::NAME.to_string(),
                    message: err.to_string(),
                })
            }
        };

        Ok(Resource {
            type_name: T::NAME.to_string(),
            attributes,
            response_headers,
            response_status,
            errors,
        })
    }

    fn cache_key(&self, namespace: &str, options: &RequestOptions) -> Option<String> {
        T::cache_key(namespace, options)
    }
}

fn take_response_fields(attributes: &mut Map<String, Value>) -> (Option<Vec<(String, String)>>, Option<u16>) {
    let headers = attributes.remove(RESPONSE_HEADERS).and_then(headers_from_value);
    let status = attributes
        .remove(RESPONSE_STATUS)
        .and_then(|status| status.as_u64())
        .and_then(|status| u16::try_from(status).ok());
    (headers, status)
}

/// An object built by a blueprint.
///
/// Serializes to its attributes only: the response status and headers are
/// bookkeeping, not part of the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    type_name: String,
    attributes: Map<String, Value>,
    response_headers: Option<Vec<(String, String)>>,
    response_status: Option<u16>,
    errors: FieldErrors,
}

impl Resource {
    pub fn new(type_name: impl Into<String>, attributes: Map<String, Value>) -> Self {
        Self {
            type_name: type_name.into(),
            attributes,
            response_headers: None,
            response_status: None,
            errors: FieldErrors::new(),
        }
    }

    /// A resource for attributes the target type rejected. The attributes
    /// are kept as received, minus the synthetic response fields.
    pub(crate) fn unconstructed(type_name: &str, mut attributes: Map<String, Value>) -> Self {
        let (response_headers, response_status) = take_response_fields(&mut attributes);
        Self {
            type_name: type_name.to_string(),
            attributes,
            response_headers,
            response_status,
            errors: FieldErrors::new(),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Typed view of the attributes.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_value(Value::Object(self.attributes.clone())).map_err(|err| Error::Construct {
            target: std::any::type_name::<T>().to_string(),
            message: err.to_string(),
        })
    }

    pub fn response_headers(&self) -> Option<&[(String, String)]> {
        self.response_headers.as_deref()
    }

    pub fn response_status(&self) -> Option<u16> {
        self.response_status
    }

    /// True when the response that produced this object had a 2xx status.
    pub fn is_success(&self) -> bool {
        matches!(self.response_status, Some(200..=299))
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut FieldErrors {
        &mut self.errors
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl Serialize for Resource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.attributes.serialize(serializer)
    }
}

/// Encode response headers as the `response_headers` attribute.
pub(crate) fn headers_to_value(headers: &[(String, String)]) -> Value {
    Value::Object(
        headers
            .iter()
            .map(|(name, value)| (name.clone(), Value::String(value.clone())))
            .collect(),
    )
}

fn headers_from_value(value: Value) -> Option<Vec<(String, String)>> {
    match value {
        Value::Object(map) => Some(
            map.into_iter()
                .map(|(name, value)| match value {
                    Value::String(text) => (name, text),
                    other => (name, other.to_string()),
                })
                .collect(),
        ),
        _ => None,
    }
}
