//! Renames response fields before a target type sees them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ordered `bad key → good key` renames.
///
/// Renames apply in declaration order, so `a → b` followed by `b → c` moves
/// a value from `a` all the way to `c`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacements(Vec<(String, String)>);

impl Replacements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rename from `bad` to `good`.
    pub fn rename(mut self, bad: impl Into<String>, good: impl Into<String>) -> Self {
        self.0.push((bad.into(), good.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(bad, good)| (bad.as_str(), good.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Replacements {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(bad, good)| (bad.into(), good.into())).collect())
    }
}

/// Apply `replacements` to a structured value.
///
/// Anything other than a JSON object is returned unchanged. The input is
/// never modified.
pub fn replace(attributes: &Value, replacements: &Replacements) -> Value {
    match attributes {
        Value::Object(map) => Value::Object(replace_map(map, replacements)),
        other => other.clone(),
    }
}

/// Apply `replacements` to a mapping, returning a renamed copy.
///
/// A value moved onto a key that already exists overwrites it.
pub fn replace_map(map: &Map<String, Value>, replacements: &Replacements) -> Map<String, Value> {
    let mut item = map.clone();
    for (bad, good) in replacements.iter() {
        if bad == good {
            continue;
        }
        if let Some(value) = item.remove(bad) {
            item.insert(good.to_string(), value);
        }
    }
    item
}
