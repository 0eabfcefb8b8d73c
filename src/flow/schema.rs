// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::Value;

/// Type of a property as declared in a schema or inferred from a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    String,
    Int,
    Float,
    Bool,
    Message,
    Array,
    Any,
}

impl PropertyType {
    /// The type of a concrete value. `null` is `Any`.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::String(_) => PropertyType::String,
            Value::Number(n) if n.is_i64() || n.is_u64() => PropertyType::Int,
            Value::Number(_) => PropertyType::Float,
            Value::Bool(_) => PropertyType::Bool,
            Value::Object(_) => PropertyType::Message,
            Value::Array(_) => PropertyType::Array,
            Value::Null => PropertyType::Any,
        }
    }

    /// Whether a value of type `found` can be supplied where `self` is expected.
    /// Integers widen to floats.
    pub fn accepts(self, found: PropertyType) -> bool {
        self == found
            || self == PropertyType::Any
            || found == PropertyType::Any
            || (self == PropertyType::Float && found == PropertyType::Int)
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyType::String => "string",
            PropertyType::Int => "int",
            PropertyType::Float => "float",
            PropertyType::Bool => "bool",
            PropertyType::Message => "message",
            PropertyType::Array => "array",
            PropertyType::Any => "any",
        };
        f.write_str(name)
    }
}

/// Flat schema mapping absolute dotted property paths to their types.
///
/// Intermediate messages do not need their own entry: a schema holding
/// `address.city` implies that `address` is a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema(pub BTreeMap<String, PropertyType>);

impl Schema {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, path: impl Into<String>, kind: PropertyType) -> Self {
        self.0.insert(path.into(), kind);
        self
    }

    /// Type of the property at `path`, or `None` when the schema does not
    /// declare it. The root path `.` is always a message.
    pub fn lookup(&self, path: &str) -> Option<PropertyType> {
        if path.is_empty() || path == "." {
            return Some(PropertyType::Message);
        }

        if let Some(kind) = self.0.get(path) {
            return Some(*kind);
        }

        let prefix = format!("{}.", path);
        self.0
            .keys()
            .any(|key| key.starts_with(&prefix))
            .then_some(PropertyType::Message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn infers_types_from_values() {
        assert_eq!(PropertyType::of(&json!("x")), PropertyType::String);
        assert_eq!(PropertyType::of(&json!(3)), PropertyType::Int);
        assert_eq!(PropertyType::of(&json!(3.5)), PropertyType::Float);
        assert_eq!(PropertyType::of(&json!({"a": 1})), PropertyType::Message);
        assert_eq!(PropertyType::of(&json!(null)), PropertyType::Any);
    }

    #[test]
    fn int_widens_to_float_but_not_back() {
        assert!(PropertyType::Float.accepts(PropertyType::Int));
        assert!(!PropertyType::Int.accepts(PropertyType::Float));
        assert!(PropertyType::String.accepts(PropertyType::Any));
    }

    #[test]
    fn lookup_resolves_nested_messages() {
        let schema = Schema::new()
            .with("name", PropertyType::String)
            .with("address.city", PropertyType::String);

        assert_eq!(schema.lookup("name"), Some(PropertyType::String));
        assert_eq!(schema.lookup("address"), Some(PropertyType::Message));
        assert_eq!(schema.lookup("address.city"), Some(PropertyType::String));
        assert_eq!(schema.lookup("."), Some(PropertyType::Message));
        assert_eq!(schema.lookup("age"), None);
        assert_eq!(schema.lookup("addr"), None);
    }
}
