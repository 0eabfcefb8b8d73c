// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

use crate::flow::PropertyType;

/// A malformed condition expression. Always fatal at compile time.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid condition '{expression}' at offset {position}: {message}")]
pub struct ConditionError {
    pub expression: String,
    pub position: usize,
    pub message: String,
}

/// Errors that reject a flow definition before any execution.
///
/// `compile` accumulates as many of these as it can find so a flow author sees
/// every problem at once. Cycle detection only runs once every reference
/// resolved, since it needs a structurally valid graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// The data dependencies between nodes form a cycle. `cycle` starts and ends
    /// with the same node.
    #[error("cyclic dependency detected: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// A reference points at a resource or property that does not exist.
    #[error("node '{node}' references '{reference}' which cannot be resolved")]
    UnresolvedReference { node: String, reference: String },

    /// A node calls a resource that is not registered.
    #[error("node '{node}' calls unknown resource '{resource}'")]
    UnknownResource { node: String, resource: String },

    /// A template calls a function that is not registered.
    #[error("{location} calls unknown function '{function}'")]
    UnknownFunction { location: String, function: String },

    /// A function was called with the wrong number of arguments.
    #[error("{location} calls '{function}' with {found} arguments: {message}")]
    InvalidFunctionCall {
        location: String,
        function: String,
        found: usize,
        message: String,
    },

    /// The declared type of a consumer disagrees with the type of the value it references.
    #[error("{location} expects {expected} but '{reference}' is {found}")]
    TypeMismatch {
        location: String,
        reference: String,
        expected: PropertyType,
        found: PropertyType,
    },

    /// Two nodes share a name.
    #[error("duplicate node name '{node}'")]
    DuplicateNode { node: String },

    /// A node name collides with a reserved resource or contains a separator.
    #[error("node name '{node}' is reserved or contains '.' or ':'")]
    ReservedName { node: String },

    /// A `depends_on` entry names a node that does not exist.
    #[error("node '{node}' depends on unknown node '{dependency}'")]
    UnknownDependency { node: String, dependency: String },

    /// A template value could not be parsed.
    #[error("{location} has an invalid template '{template}': {message}")]
    InvalidTemplate {
        location: String,
        template: String,
        message: String,
    },

    /// More than one node in a flow is flagged as a pass-through proxy.
    #[error("flow declares more than one proxy node: {}", nodes.join(", "))]
    MultipleProxies { nodes: Vec<String> },

    /// A proxy node calls a resource that cannot forward byte streams.
    #[error("node '{node}' is a proxy but resource '{resource}' does not support forwarding")]
    ProxyNotSupported { node: String, resource: String },

    /// A node condition failed to parse.
    #[error("node '{node}': {source}")]
    Condition {
        node: String,
        #[source]
        source: ConditionError,
    },
}

impl CompileError {
    /// Names of the nodes this diagnostic is about.
    pub fn nodes(&self) -> Vec<&str> {
        match self {
            CompileError::CyclicDependency { cycle } => cycle.iter().map(String::as_str).collect(),
            CompileError::UnresolvedReference { node, .. }
            | CompileError::UnknownResource { node, .. }
            | CompileError::DuplicateNode { node }
            | CompileError::ReservedName { node }
            | CompileError::UnknownDependency { node, .. }
            | CompileError::ProxyNotSupported { node, .. }
            | CompileError::Condition { node, .. } => vec![node.as_str()],
            CompileError::MultipleProxies { nodes } => nodes.iter().map(String::as_str).collect(),
            CompileError::UnknownFunction { .. }
            | CompileError::InvalidFunctionCall { .. }
            | CompileError::TypeMismatch { .. }
            | CompileError::InvalidTemplate { .. } => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_display_joins_path() {
        let err = CompileError::CyclicDependency {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "cyclic dependency detected: a -> b -> a");
        assert_eq!(err.nodes(), vec!["a", "b", "a"]);
    }

    #[test]
    fn condition_error_keeps_node() {
        let err = CompileError::Condition {
            node: "gate".into(),
            source: ConditionError {
                expression: "( {{ input:id }}".into(),
                position: 16,
                message: "expected ')'".into(),
            },
        };
        assert!(err.to_string().starts_with("node 'gate': invalid condition"));
        assert_eq!(err.nodes(), vec!["gate"]);
    }
}
