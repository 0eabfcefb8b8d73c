// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{PropertyType, Schema, Value};

/// A declared flow: named graph of nodes from input to output.
///
/// # Example
/// ```yaml
/// name: checkout
/// input:
///   id: string
/// nodes:
///   - name: user
///     resource: users.get
///     request:
///       body:
///         id: "{{ input:id }}"
///     response:
///       name: string
/// output:
///   body:
///     name: "{{ user:name }}"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowDefinition {
    pub name: String,
    #[serde(default)]
    pub input: Option<Schema>,
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub output: Option<ParameterMap>,
}

impl FlowDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn input(mut self, schema: Schema) -> Self {
        self.input = Some(schema);
        self
    }

    pub fn node(mut self, node: NodeDefinition) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn output(mut self, key: impl Into<String>, property: impl Into<PropertyDefinition>) -> Self {
        self.output
            .get_or_insert_with(ParameterMap::default)
            .body
            .insert(key.into(), property.into());
        self
    }

    pub fn output_header(mut self, key: impl Into<String>, template: impl Into<String>) -> Self {
        self.output
            .get_or_insert_with(ParameterMap::default)
            .header
            .insert(key.into(), template.into());
        self
    }
}

/// One unit of work: a call to a registered resource.
///
/// Function calls never appear here; they are discovered inside templates and
/// turned into their own graph nodes during compilation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub name: String,
    pub resource: String,
    #[serde(default)]
    pub request: ParameterMap,
    /// Declared response schema. Takes precedence over the resource's own.
    #[serde(default)]
    pub response: Option<Schema>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub rollback: Option<RollbackDefinition>,
    /// Ordering dependencies without a data reference.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Stream the inbound body straight through to the resource.
    #[serde(default)]
    pub proxy: bool,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

impl NodeDefinition {
    pub fn new(name: impl Into<String>, resource: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource: resource.into(),
            ..Default::default()
        }
    }

    pub fn request(mut self, key: impl Into<String>, property: impl Into<PropertyDefinition>) -> Self {
        self.request.body.insert(key.into(), property.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, template: impl Into<String>) -> Self {
        self.request.header.insert(key.into(), template.into());
        self
    }

    pub fn response(mut self, schema: Schema) -> Self {
        self.response = Some(schema);
        self
    }

    pub fn condition(mut self, expression: impl Into<String>) -> Self {
        self.condition = Some(expression.into());
        self
    }

    pub fn rollback(mut self, rollback: RollbackDefinition) -> Self {
        self.rollback = Some(rollback);
        self
    }

    pub fn depends_on(mut self, node: impl Into<String>) -> Self {
        self.depends_on.push(node.into());
        self
    }

    pub fn proxy(mut self) -> Self {
        self.proxy = true;
        self
    }

    pub fn timeout_ms(mut self, millis: u64) -> Self {
        self.timeout_ms = Some(millis);
        self
    }
}

/// Compensating call executed when the flow fails after this node completed.
/// Without a request template the node's original request body is replayed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RollbackDefinition {
    pub resource: String,
    #[serde(default)]
    pub request: Option<ParameterMap>,
}

impl RollbackDefinition {
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            request: None,
        }
    }

    pub fn request(mut self, key: impl Into<String>, property: impl Into<PropertyDefinition>) -> Self {
        self.request
            .get_or_insert_with(ParameterMap::default)
            .body
            .insert(key.into(), property.into());
        self
    }
}

/// Header and body templates of a request or of the flow output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterMap {
    #[serde(default)]
    pub header: BTreeMap<String, String>,
    #[serde(default)]
    pub body: BTreeMap<String, PropertyDefinition>,
}

/// A property in a request or output body.
///
/// Plain scalars are literals unless they are `{{ ... }}` templates, maps
/// are nested messages, and the detailed form attaches a type or marks the
/// property optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyDefinition {
    Typed(TypedProperty),
    Message(BTreeMap<String, PropertyDefinition>),
    Value(Value),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypedProperty {
    pub value: Value,
    #[serde(rename = "type", default)]
    pub kind: Option<PropertyType>,
    #[serde(default)]
    pub optional: bool,
}

impl PropertyDefinition {
    /// A property that is omitted instead of failing the node when its
    /// reference has no value.
    pub fn optional(template: impl Into<String>) -> Self {
        PropertyDefinition::Typed(TypedProperty {
            value: Value::String(template.into()),
            kind: None,
            optional: true,
        })
    }

    /// A property whose referenced value must have the given type.
    pub fn typed(template: impl Into<String>, kind: PropertyType) -> Self {
        PropertyDefinition::Typed(TypedProperty {
            value: Value::String(template.into()),
            kind: Some(kind),
            optional: false,
        })
    }

    pub fn message<K: Into<String>, P: Into<PropertyDefinition>>(
        properties: impl IntoIterator<Item = (K, P)>,
    ) -> Self {
        PropertyDefinition::Message(
            properties
                .into_iter()
                .map(|(key, property)| (key.into(), property.into()))
                .collect(),
        )
    }
}

impl From<&str> for PropertyDefinition {
    fn from(value: &str) -> Self {
        PropertyDefinition::Value(Value::String(value.to_string()))
    }
}

impl From<String> for PropertyDefinition {
    fn from(value: String) -> Self {
        PropertyDefinition::Value(Value::String(value))
    }
}

impl From<Value> for PropertyDefinition {
    fn from(value: Value) -> Self {
        PropertyDefinition::Value(value)
    }
}
