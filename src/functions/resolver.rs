// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use crate::config::Registry;
use crate::errors::CompileError;
use crate::flow::Value;
use crate::references::{Reference, Template, ROOT_PATH, STACK_RESOURCE};
use crate::traits::{Function, Signature};

/// One function call site, allocated its own `stack` resource.
#[derive(Clone)]
pub struct FunctionCall {
    /// Resource the result is written to, `stack.<function>.<n>`.
    pub resource: String,
    pub function: Arc<dyn Function>,
    pub signature: Signature,
    /// Arguments with nested calls already replaced by references.
    pub arguments: Vec<Template>,
    /// Where the call appeared, used in diagnostics.
    pub location: String,
}

impl std::fmt::Debug for FunctionCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionCall")
            .field("resource", &self.resource)
            .field("function", &self.function.name())
            .field("arguments", &self.arguments)
            .field("location", &self.location)
            .finish()
    }
}

/// Rewrites function calls inside templates into references to per-call-site
/// resources. Argument types are checked later, together with every other
/// reference, once all owners are known.
///
/// Call sites are never shared: two textually identical calls become two
/// resources. Nested calls are allocated innermost first, so an argument that
/// is itself a call becomes a reference to the inner call's resource.
pub struct FunctionResolver<'a> {
    registry: &'a Registry,
    calls: Vec<FunctionCall>,
    errors: Vec<CompileError>,
}

impl<'a> FunctionResolver<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            calls: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Resolves every call in `template`, rewriting it in place.
    ///
    /// Calls that fail to resolve are replaced by a `null` literal and the
    /// error is recorded, so one pass reports every bad call site.
    pub fn resolve(&mut self, location: &str, template: &mut Template) {
        let Template::Call { function, arguments } = template else {
            return;
        };

        for (position, argument) in arguments.iter_mut().enumerate() {
            self.resolve(&format!("{} argument {} of '{}'", location, position, function), argument);
        }

        *template = match self.allocate(location, function, std::mem::take(arguments)) {
            Ok(resource) => Template::Reference(Reference::new(resource, ROOT_PATH)),
            Err(error) => {
                self.errors.push(error);
                Template::Literal(Value::Null)
            }
        };
    }

    fn allocate(
        &mut self,
        location: &str,
        name: &str,
        arguments: Vec<Template>,
    ) -> Result<String, CompileError> {
        let function = self
            .registry
            .function(name)
            .cloned()
            .ok_or_else(|| CompileError::UnknownFunction {
                location: location.to_string(),
                function: name.to_string(),
            })?;

        let signature = function.signature();
        if !signature.accepts_count(arguments.len()) {
            return Err(CompileError::InvalidFunctionCall {
                location: location.to_string(),
                function: name.to_string(),
                found: arguments.len(),
                message: match signature.variadic {
                    Some(_) => format!("expected at least {}", signature.arguments.len()),
                    None => format!("expected {}", signature.arguments.len()),
                },
            });
        }

        let resource = format!("{}.{}.{}", STACK_RESOURCE, name, self.calls.len());
        self.calls.push(FunctionCall {
            resource: resource.clone(),
            function,
            signature,
            arguments,
            location: location.to_string(),
        });
        Ok(resource)
    }

    /// The allocated calls, in allocation order, and every error encountered.
    pub fn finish(self) -> (Vec<FunctionCall>, Vec<CompileError>) {
        (self.calls, self.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rewrites_nested_calls_innermost_first() {
        let registry = Registry::with_builtins();
        let mut resolver = FunctionResolver::new(&registry);
        let mut template = Template::parse("{{ strconcat('id-', upper(input:id)) }}").unwrap();

        resolver.resolve("node 'a' property 'id'", &mut template);
        let (calls, errors) = resolver.finish();

        assert!(errors.is_empty());
        assert_eq!(template, Template::Reference(Reference::new("stack.strconcat.1", ".")));
        assert_eq!(calls[0].resource, "stack.upper.0");
        assert_eq!(calls[0].arguments, vec![Template::Reference(Reference::new("input", "id"))]);
        assert_eq!(
            calls[1].arguments,
            vec![
                Template::Literal(json!("id-")),
                Template::Reference(Reference::new("stack.upper.0", "."))
            ]
        );
    }

    #[test]
    fn identical_call_sites_are_not_shared() {
        let registry = Registry::with_builtins();
        let mut resolver = FunctionResolver::new(&registry);
        let mut first = Template::parse("{{ upper(input:id) }}").unwrap();
        let mut second = first.clone();

        resolver.resolve("first", &mut first);
        resolver.resolve("second", &mut second);

        assert_ne!(first, second);
        assert_eq!(resolver.finish().0.len(), 2);
    }

    #[test]
    fn reports_every_bad_call_site() {
        let registry = Registry::with_builtins();
        let mut resolver = FunctionResolver::new(&registry);
        let mut unknown = Template::parse("{{ shout(input:id) }}").unwrap();
        let mut arity = Template::parse("{{ upper('a', 'b') }}").unwrap();

        resolver.resolve("a", &mut unknown);
        resolver.resolve("b", &mut arity);
        let (calls, errors) = resolver.finish();

        assert!(calls.is_empty());
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], CompileError::UnknownFunction { .. }));
        assert!(matches!(errors[1], CompileError::InvalidFunctionCall { found: 2, .. }));
        assert_eq!(unknown, Template::Literal(Value::Null));
    }
}
