// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::errors::CallError;
use crate::flow::Value;
use crate::functions::builtin;
use crate::traits::{Function, Request, Resource, Response};

/// Something a compiled node can invoke.
#[derive(Clone)]
pub enum Capability {
    Resource(Arc<dyn Resource>),
    Function(Arc<dyn Function>),
}

impl Capability {
    pub fn name(&self) -> &str {
        match self {
            Capability::Resource(resource) => resource.name(),
            Capability::Function(function) => function.name(),
        }
    }

    /// Invokes the capability. Functions take their positional arguments
    /// from an array body and answer with an empty header.
    pub async fn call(&self, request: Request) -> Result<Response, CallError> {
        match self {
            Capability::Resource(resource) => resource.call(request).await,
            Capability::Function(function) => {
                let arguments = match request.body {
                    Value::Array(arguments) => arguments,
                    Value::Null => Vec::new(),
                    other => vec![other],
                };
                Ok(Response::new(function.call(arguments).await?))
            }
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Resource(resource) => write!(f, "Resource({})", resource.name()),
            Capability::Function(function) => write!(f, "Function({})", function.name()),
        }
    }
}

/// Named resources and functions available to flows.
#[derive(Clone, Default)]
pub struct Registry {
    resources: HashMap<String, Arc<dyn Resource>>,
    functions: HashMap<String, Arc<dyn Function>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the built-in template functions.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for function in builtin::all() {
            registry.register_function(function);
        }
        registry
    }

    /// Registers a resource under its own name, replacing any previous one.
    pub fn register_resource(&mut self, resource: Arc<dyn Resource>) -> &mut Self {
        self.resources.insert(resource.name().to_string(), resource);
        self
    }

    pub fn register_function(&mut self, function: Arc<dyn Function>) -> &mut Self {
        self.functions.insert(function.name().to_string(), function);
        self
    }

    pub fn resource(&self, name: &str) -> Option<&Arc<dyn Resource>> {
        self.resources.get(name)
    }

    pub fn function(&self, name: &str) -> Option<&Arc<dyn Function>> {
        self.functions.get(name)
    }

    /// Looks a name up, resources first.
    pub fn capability(&self, name: &str) -> Option<Capability> {
        self.resource(name)
            .cloned()
            .map(Capability::Resource)
            .or_else(|| self.function(name).cloned().map(Capability::Function))
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut resources = self.resources.keys().collect::<Vec<_>>();
        let mut functions = self.functions.keys().collect::<Vec<_>>();
        resources.sort();
        functions.sort();
        f.debug_struct("Registry")
            .field("resources", &resources)
            .field("functions", &functions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::stub::RecordingResource;
    use serde_json::json;

    #[test]
    fn resources_take_precedence_over_functions() {
        let mut registry = Registry::with_builtins();
        assert!(matches!(registry.capability("upper"), Some(Capability::Function(_))));

        registry.register_resource(Arc::new(RecordingResource::new("upper")));
        assert!(matches!(registry.capability("upper"), Some(Capability::Resource(_))));
        assert!(registry.capability("nope").is_none());
    }

    #[tokio::test]
    async fn functions_take_arguments_from_an_array_body() {
        let registry = Registry::with_builtins();
        let upper = registry.capability("upper").unwrap();

        let response = upper.call(Request::new(json!(["ada"]))).await.unwrap();
        assert_eq!(response.body, json!("ADA"));
    }
}
