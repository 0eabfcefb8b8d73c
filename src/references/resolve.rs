// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;

use thiserror::Error;

use super::{Lookup, Reference, ReferenceStore, Template, TemplateError, ROOT_PATH, STACK_RESOURCE};
use crate::flow::{Metadata, PropertyDefinition, PropertyType, Value};

/// How absent values are treated while resolving a property tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    /// Absent non-optional values fail resolution.
    Strict,
    /// Absent values are omitted from the result.
    Lenient,
}

/// A referenced value that was absent at resolution time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("reference '{reference}' has no value")]
pub struct MissingValue {
    pub reference: Reference,
}

/// A property whose template could not be parsed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("property '{property}': {source}")]
pub struct PropertyError {
    pub property: String,
    pub template: String,
    #[source]
    pub source: TemplateError,
}

/// Parsed request or output body: nested messages with templates at the leaves.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyTree {
    Message(BTreeMap<String, PropertyTree>),
    Value {
        template: Template,
        kind: Option<PropertyType>,
        optional: bool,
    },
}

impl Default for PropertyTree {
    fn default() -> Self {
        PropertyTree::Message(BTreeMap::new())
    }
}

impl PropertyTree {
    pub fn parse(body: &BTreeMap<String, PropertyDefinition>) -> Result<Self, PropertyError> {
        Self::parse_message("", body)
    }

    fn parse_message(
        prefix: &str,
        body: &BTreeMap<String, PropertyDefinition>,
    ) -> Result<Self, PropertyError> {
        let mut message = BTreeMap::new();
        for (key, property) in body {
            let path = join(prefix, key);
            let tree = match property {
                PropertyDefinition::Message(nested) => Self::parse_message(&path, nested)?,
                PropertyDefinition::Value(value) => Self::leaf(&path, value, None, false)?,
                PropertyDefinition::Typed(typed) => {
                    Self::leaf(&path, &typed.value, typed.kind, typed.optional)?
                }
            };
            message.insert(key.clone(), tree);
        }
        Ok(PropertyTree::Message(message))
    }

    fn leaf(
        path: &str,
        value: &Value,
        kind: Option<PropertyType>,
        optional: bool,
    ) -> Result<Self, PropertyError> {
        let template = Template::from_value(value).map_err(|source| PropertyError {
            property: path.to_string(),
            template: value.to_string(),
            source,
        })?;
        Ok(PropertyTree::Value {
            template,
            kind,
            optional,
        })
    }

    /// Visits every leaf with its dotted property path.
    pub fn visit(&self, visitor: &mut impl FnMut(&str, &Template, Option<PropertyType>, bool)) {
        self.visit_at("", visitor);
    }

    fn visit_at(
        &self,
        path: &str,
        visitor: &mut impl FnMut(&str, &Template, Option<PropertyType>, bool),
    ) {
        match self {
            PropertyTree::Message(message) => {
                for (key, tree) in message {
                    tree.visit_at(&join(path, key), visitor);
                }
            }
            PropertyTree::Value {
                template,
                kind,
                optional,
            } => visitor(path, template, *kind, *optional),
        }
    }

    /// Visits every leaf template mutably with its dotted property path.
    pub fn visit_mut(&mut self, visitor: &mut impl FnMut(&str, &mut Template)) {
        self.visit_mut_at("", visitor);
    }

    fn visit_mut_at(&mut self, path: &str, visitor: &mut impl FnMut(&str, &mut Template)) {
        match self {
            PropertyTree::Message(message) => {
                for (key, tree) in message.iter_mut() {
                    tree.visit_mut_at(&join(path, key), visitor);
                }
            }
            PropertyTree::Value { template, .. } => visitor(path, template),
        }
    }

    pub fn references(&self) -> Vec<Reference> {
        let mut references = Vec::new();
        self.visit(&mut |_, template, _, _| template.collect_references(&mut references));
        references
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

/// Resolves a single template against the store.
///
/// Function calls are compiled into their own nodes before execution, so a
/// call still present here has no value.
pub fn resolve_template(template: &Template, store: &ReferenceStore) -> Result<Value, MissingValue> {
    match template {
        Template::Literal(value) => Ok(value.clone()),
        Template::Reference(reference) => match store.load(reference) {
            Lookup::Value(value) => Ok(value.clone()),
            Lookup::Skipped | Lookup::Missing => Err(MissingValue {
                reference: reference.clone(),
            }),
        },
        Template::Call { function, .. } => Err(MissingValue {
            reference: Reference::new(format!("{}.{}", STACK_RESOURCE, function), ROOT_PATH),
        }),
    }
}

/// Resolves a property tree into a JSON value.
pub fn resolve_tree(
    tree: &PropertyTree,
    store: &ReferenceStore,
    strictness: Strictness,
) -> Result<Value, MissingValue> {
    Ok(resolve_node(tree, store, strictness)?.unwrap_or(Value::Null))
}

fn resolve_node(
    tree: &PropertyTree,
    store: &ReferenceStore,
    strictness: Strictness,
) -> Result<Option<Value>, MissingValue> {
    match tree {
        PropertyTree::Message(message) => {
            let mut object = serde_json::Map::with_capacity(message.len());
            for (key, child) in message {
                if let Some(value) = resolve_node(child, store, strictness)? {
                    object.insert(key.clone(), value);
                }
            }
            Ok(Some(Value::Object(object)))
        }
        PropertyTree::Value {
            template, optional, ..
        } => match resolve_template(template, store) {
            Ok(value) => Ok(Some(value)),
            Err(_) if *optional || strictness == Strictness::Lenient => Ok(None),
            Err(missing) => Err(missing),
        },
    }
}

/// Resolves header templates. Absent header values are left out.
pub fn resolve_header(header: &BTreeMap<String, Template>, store: &ReferenceStore) -> Metadata {
    header
        .iter()
        .filter_map(|(key, template)| {
            let value = resolve_template(template, store).ok()?;
            let rendered = match value {
                Value::String(raw) => raw,
                Value::Null => return None,
                other => other.to_string(),
            };
            Some((key.clone(), rendered))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> ReferenceStore {
        let store = ReferenceStore::with_resources(["input", "input.header", "user", "skipped"]);
        store.store("input", json!({ "id": 7 })).unwrap();
        store.store("input.header", json!({ "Authorization": "Bearer x" })).unwrap();
        store.store("user", json!({ "name": "ada" })).unwrap();
        store.skip("skipped").unwrap();
        store
    }

    fn tree(body: serde_json::Value) -> PropertyTree {
        let body: BTreeMap<String, PropertyDefinition> = serde_json::from_value(body).unwrap();
        PropertyTree::parse(&body).unwrap()
    }

    #[test]
    fn resolves_nested_messages() {
        let tree = tree(json!({
            "id": "{{ input:id }}",
            "greeting": "hello",
            "profile": { "name": "{{ user:name }}" }
        }));

        let value = resolve_tree(&tree, &store(), Strictness::Strict).unwrap();
        assert_eq!(value, json!({ "id": 7, "greeting": "hello", "profile": { "name": "ada" } }));
    }

    #[test]
    fn strict_resolution_fails_on_absent_values() {
        let tree = tree(json!({ "x": "{{ skipped:x }}" }));
        let err = resolve_tree(&tree, &store(), Strictness::Strict).unwrap_err();
        assert_eq!(err.reference, Reference::new("skipped", "x"));
    }

    #[test]
    fn optional_and_lenient_values_are_omitted() {
        let optional = tree(json!({
            "name": "{{ user:name }}",
            "email": { "value": "{{ user:email }}", "optional": true }
        }));
        assert_eq!(
            resolve_tree(&optional, &store(), Strictness::Strict).unwrap(),
            json!({ "name": "ada" })
        );

        let lenient = tree(json!({ "x": "{{ skipped:x }}", "id": "{{ input:id }}" }));
        assert_eq!(
            resolve_tree(&lenient, &store(), Strictness::Lenient).unwrap(),
            json!({ "id": 7 })
        );
    }

    #[test]
    fn headers_render_as_strings() {
        let header = BTreeMap::from([
            ("Authorization".to_string(), Template::parse("{{ input.header:Authorization }}").unwrap()),
            ("X-Id".to_string(), Template::parse("{{ input:id }}").unwrap()),
            ("X-Missing".to_string(), Template::parse("{{ user:missing }}").unwrap()),
        ]);

        let resolved = resolve_header(&header, &store());
        assert_eq!(resolved["Authorization"], "Bearer x");
        assert_eq!(resolved["X-Id"], "7");
        assert!(!resolved.contains_key("X-Missing"));
    }

    #[test]
    fn reports_the_failing_property_path() {
        let body: BTreeMap<String, PropertyDefinition> =
            serde_json::from_value(json!({ "outer": { "inner": "{{ upper( }}" } })).unwrap();
        let err = PropertyTree::parse(&body).unwrap_err();
        assert_eq!(err.property, "outer.inner");
    }
}
