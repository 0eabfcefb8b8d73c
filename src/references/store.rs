// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use thiserror::Error;

use super::Reference;
use crate::flow::Value;

/// Result of reading a reference from the store.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    Value(&'a Value),
    /// The owning node was skipped; nothing will ever be written.
    Skipped,
    /// Not written yet, or the path does not exist in the written value.
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("resource '{resource}' was already written")]
    DuplicateWrite { resource: String },

    #[error("resource '{resource}' is not known to this flow")]
    UnknownResource { resource: String },
}

#[derive(Debug)]
enum Slot {
    Value(Value),
    Skipped,
}

/// Per-execution store of resource values.
///
/// Slots are fixed at construction from the compiled flow's resource index,
/// one per resource. Each slot is set at most once, so readers never lock and
/// never observe a partially written value.
#[derive(Debug)]
pub struct ReferenceStore {
    index: Arc<HashMap<String, usize>>,
    slots: Vec<OnceLock<Slot>>,
}

impl ReferenceStore {
    pub fn new(index: Arc<HashMap<String, usize>>) -> Self {
        let slots = (0..index.len()).map(|_| OnceLock::new()).collect();
        Self { index, slots }
    }

    pub fn with_resources<S: Into<String>>(resources: impl IntoIterator<Item = S>) -> Self {
        let index = resources
            .into_iter()
            .enumerate()
            .map(|(slot, resource)| (resource.into(), slot))
            .collect::<HashMap<_, _>>();
        Self::new(Arc::new(index))
    }

    fn slot(&self, resource: &str) -> Result<&OnceLock<Slot>, StoreError> {
        self.index
            .get(resource)
            .and_then(|&slot| self.slots.get(slot))
            .ok_or_else(|| StoreError::UnknownResource {
                resource: resource.to_string(),
            })
    }

    fn set(&self, resource: &str, slot: Slot) -> Result<(), StoreError> {
        self.slot(resource)?
            .set(slot)
            .map_err(|_| StoreError::DuplicateWrite {
                resource: resource.to_string(),
            })
    }

    /// Writes the whole value of a resource.
    pub fn store(&self, resource: &str, value: Value) -> Result<(), StoreError> {
        self.set(resource, Slot::Value(value))
    }

    /// Marks a resource as permanently absent.
    pub fn skip(&self, resource: &str) -> Result<(), StoreError> {
        self.set(resource, Slot::Skipped)
    }

    pub fn load(&self, reference: &Reference) -> Lookup<'_> {
        let Ok(slot) = self.slot(&reference.resource) else {
            return Lookup::Missing;
        };

        match slot.get() {
            None => Lookup::Missing,
            Some(Slot::Skipped) => Lookup::Skipped,
            Some(Slot::Value(root)) => reference
                .segments()
                .try_fold(root, |value, segment| match value {
                    Value::Object(map) => map.get(segment),
                    Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                    _ => None,
                })
                .map_or(Lookup::Missing, Lookup::Value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn loads_nested_paths() {
        let store = ReferenceStore::with_resources(["user"]);
        store
            .store("user", json!({ "name": "ada", "tags": ["a", "b"], "address": { "city": "London" } }))
            .unwrap();

        assert_eq!(store.load(&Reference::new("user", "name")), Lookup::Value(&json!("ada")));
        assert_eq!(store.load(&Reference::new("user", "address.city")), Lookup::Value(&json!("London")));
        assert_eq!(store.load(&Reference::new("user", "tags.1")), Lookup::Value(&json!("b")));
        assert_eq!(store.load(&Reference::new("user", "missing")), Lookup::Missing);
        assert!(matches!(store.load(&Reference::new("user", ".")), Lookup::Value(Value::Object(_))));
    }

    #[test]
    fn slots_are_write_once() {
        let store = ReferenceStore::with_resources(["a"]);
        store.store("a", json!(1)).unwrap();

        assert_eq!(
            store.store("a", json!(2)),
            Err(StoreError::DuplicateWrite { resource: "a".into() })
        );
        assert_eq!(store.skip("a"), Err(StoreError::DuplicateWrite { resource: "a".into() }));
        assert_eq!(store.load(&Reference::new("a", ".")), Lookup::Value(&json!(1)));
    }

    #[test]
    fn skipped_and_unknown_resources() {
        let store = ReferenceStore::with_resources(["a"]);
        assert_eq!(store.load(&Reference::new("a", "x")), Lookup::Missing);

        store.skip("a").unwrap();
        assert_eq!(store.load(&Reference::new("a", "x")), Lookup::Skipped);
        assert_eq!(store.load(&Reference::new("a", ".")), Lookup::Skipped);

        assert_eq!(
            store.store("nope", json!(1)),
            Err(StoreError::UnknownResource { resource: "nope".into() })
        );
    }
}
