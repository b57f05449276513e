//! Turns a decoded response body into target objects.

use serde_json::{Map, Value};

use crate::error::Error;
use crate::key_replacer::{self, Replacements};
use crate::model::{
    construction_errors, headers_to_value, FieldErrors, Resource, Target, RESPONSE_HEADERS, RESPONSE_STATUS,
};
use crate::outcome::Outcome;

/// Everything a builder needs for one build.
pub struct BuildInput<'a> {
    /// Body as returned by the parser.
    pub body: Value,
    pub headers: &'a [(String, String)],
    /// `None` when building from a per-call body before sending.
    pub status: Option<u16>,
    pub replacements: &'a Replacements,
    pub target: Option<&'a dyn Target>,
}

/// Build capability of a blueprint.
///
/// Implement this to take over object construction entirely; most callers
/// want the default `ModelBuilder`. Whatever the builder returns, the
/// blueprint afterwards copies a body `errors` mapping onto a single built
/// resource, so implementations need not handle it.
pub trait Builder: Send + Sync {
    fn build(&self, input: BuildInput<'_>) -> Result<Outcome, Error>;
}

/// Builds one resource per mapping, or one per element of an array body.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelBuilder;

impl Builder for ModelBuilder {
    fn build(&self, input: BuildInput<'_>) -> Result<Outcome, Error> {
        let target = input
            .target
            .ok_or_else(|| Error::Builder("no target type declared".to_string()))?;

        match &input.body {
            Value::Array(items) => items
                .iter()
                .map(|item| build_item(target, item, &input))
                .collect::<Result<Vec<_>, _>>()
                .map(Outcome::Many),
            body => build_item(target, body, &input).map(Outcome::One),
        }
    }
}

fn build_item(target: &dyn Target, item: &Value, input: &BuildInput<'_>) -> Result<Resource, Error> {
    let attributes = item_attributes(item, input).ok_or_else(|| Error::Construct {
        target: target.name().to_string(),
        message: format!("expected a mapping, got `{item}`"),
    })?;
    target.construct(attributes)
}

/// Renamed attributes of `item` plus the synthetic response fields.
fn item_attributes(item: &Value, input: &BuildInput<'_>) -> Option<Map<String, Value>> {
    let Value::Object(mut attributes) = key_replacer::replace(item, input.replacements) else {
        return None;
    };
    attributes.insert(RESPONSE_HEADERS.to_string(), headers_to_value(input.headers));
    if let Some(status) = input.status {
        attributes.insert(RESPONSE_STATUS.to_string(), Value::from(status));
    }
    Some(attributes)
}

/// Apply the `errors` mapping of `input.body`, if any, to a build result.
///
/// A single built resource gets the reported messages added to its field
/// errors. When the body could not be constructed into the target at all,
/// the reported errors still reach the caller: the result is a resource
/// holding the raw attributes, the construction problem and the reported
/// messages.
pub(crate) fn with_reported_errors(built: Result<Outcome, Error>, input: &BuildInput<'_>) -> Result<Outcome, Error> {
    let Some(Value::Object(reported)) = input.body.get("errors") else {
        return built;
    };
    match built {
        Ok(Outcome::One(mut resource)) => {
            collect_errors(resource.errors_mut(), reported);
            Ok(Outcome::One(resource))
        }
        Err(Error::Construct { target, message }) => {
            let (Some(target_type), Some(attributes)) = (input.target, item_attributes(&input.body, input)) else {
                return Err(Error::Construct { target, message });
            };
            tracing::debug!(target_type = target_type.name(), %message, "keeping unconstructed body for its reported errors");
            let mut resource = Resource::unconstructed(target_type.name(), attributes);
            resource.errors_mut().extend(construction_errors(&message));
            collect_errors(resource.errors_mut(), reported);
            Ok(Outcome::One(resource))
        }
        other => other,
    }
}

/// Copy a reported `errors` mapping into `errors`.
///
/// Each field may carry one message or an array of them.
fn collect_errors(errors: &mut FieldErrors, reported: &Map<String, Value>) {
    for (field, messages) in reported {
        match messages {
            Value::Array(messages) => {
                for message in messages {
                    errors.add(field.clone(), message_text(message));
                }
            }
            message => errors.add(field.clone(), message_text(message)),
        }
    }
}

fn message_text(message: &Value) -> String {
    match message {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
