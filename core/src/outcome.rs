//! The value a blueprint, collection or runner call produces.

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use crate::error::Error;
use crate::http::HttpResponse;
use crate::model::{headers_to_value, FieldErrors, Resource};

/// Result of running a blueprint or collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A single object built from a mapping body.
    One(Resource),
    /// One object per element of an array body, in body order.
    Many(Vec<Resource>),
    /// The raw response of a blueprint without a target type.
    Response(HttpResponse),
    /// Pre-send validation failed; no request was made.
    Invalid(FieldErrors),
    /// Collection results in declaration order, when no composite type was
    /// declared.
    Named(Vec<(String, Outcome)>),
    /// Whatever an after-build hook chose to return.
    Value(Value),
}

impl Outcome {
    pub fn as_one(&self) -> Option<&Resource> {
        match self {
            Outcome::One(resource) => Some(resource),
            _ => None,
        }
    }

    pub fn into_one(self) -> Option<Resource> {
        match self {
            Outcome::One(resource) => Some(resource),
            _ => None,
        }
    }

    pub fn as_many(&self) -> Option<&[Resource]> {
        match self {
            Outcome::Many(resources) => Some(resources),
            _ => None,
        }
    }

    pub fn as_response(&self) -> Option<&HttpResponse> {
        match self {
            Outcome::Response(response) => Some(response),
            _ => None,
        }
    }

    pub fn as_invalid(&self) -> Option<&FieldErrors> {
        match self {
            Outcome::Invalid(errors) => Some(errors),
            _ => None,
        }
    }

    /// Look up a named collection member.
    pub fn get(&self, name: &str) -> Option<&Outcome> {
        match self {
            Outcome::Named(members) => members
                .iter()
                .find(|(member, _)| member == name)
                .map(|(_, outcome)| outcome),
            _ => None,
        }
    }

    /// Structured form of the outcome, as fed to composite targets.
    pub fn to_value(&self) -> Value {
        match self {
            Outcome::One(resource) => Value::Object(resource.attributes().clone()),
            Outcome::Many(resources) => Value::Array(
                resources
                    .iter()
                    .map(|resource| Value::Object(resource.attributes().clone()))
                    .collect(),
            ),
            Outcome::Response(response) => json!({
                "status": response.status,
                "headers": headers_to_value(&response.headers),
                "body": response.body,
            }),
            Outcome::Invalid(errors) => errors.to_value(),
            Outcome::Named(members) => Value::Object(
                members
                    .iter()
                    .map(|(name, outcome)| (name.clone(), outcome.to_value()))
                    .collect::<Map<String, Value>>(),
            ),
            Outcome::Value(value) => value.clone(),
        }
    }

    /// Deserialize the structured form into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_value(self.to_value()).map_err(|err| Error::Construct {
            target: std::any::type_name::<T>().to_string(),
            message: err.to_string(),
        })
    }
}

impl From<Resource> for Outcome {
    fn from(resource: Resource) -> Self {
        Outcome::One(resource)
    }
}
