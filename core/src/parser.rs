//! Decodes response bodies into structured values.

use serde_json::{Map, Value};

/// A body on its way into the builder.
///
/// Response bodies arrive as text; the validate-before-send path feeds the
/// per-call body in as an already structured value.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Structured(Value),
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Structured(value)
    }
}

/// Turns a payload into a structured value.
///
/// Implement this to plug in a custom body format. Parsers must not fail:
/// an undecodable body becomes some neutral value instead.
pub trait Parser: Send + Sync {
    fn parse(&self, payload: Payload) -> Value;
}

/// The default parser: JSON text in, `serde_json::Value` out.
///
/// Malformed text decodes to an empty object. Structured payloads pass
/// through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonParser;

impl Parser for JsonParser {
    fn parse(&self, payload: Payload) -> Value {
        match payload {
            Payload::Structured(value) => value,
            Payload::Text(text) => match serde_json::from_str(&text) {
                Ok(value) => value,
                Err(err) => {
                    if !text.trim().is_empty() {
                        tracing::warn!(error = %err, "response body is not valid JSON, using an empty object");
                    }
                    Value::Object(Map::new())
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_json_text() {
        let value = JsonParser.parse(r#"{ "foo": "bar" }"#.into());
        assert_eq!(value, json!({ "foo": "bar" }));
    }

    #[test]
    fn malformed_json_becomes_empty_object() {
        assert_eq!(JsonParser.parse(r#"{ "foo" }"#.into()), json!({}));
    }

    #[test]
    fn empty_body_becomes_empty_object() {
        assert_eq!(JsonParser.parse("".into()), json!({}));
    }

    #[test]
    fn structured_payload_passes_through() {
        assert_eq!(JsonParser.parse(json!(1).into()), json!(1));
        assert_eq!(JsonParser.parse(json!({ "a": [1] }).into()), json!({ "a": [1] }));
    }

    #[test]
    fn arrays_are_preserved() {
        let value = JsonParser.parse(r#"[{"name":"Ford"},{"name":"Tesla"}]"#.into());
        assert_eq!(value.as_array().map(Vec::len), Some(2));
    }
}
