// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;

use crate::errors::CallError;
use crate::flow::{PropertyType, Value};

/// Argument and return types of a function.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    pub arguments: Vec<PropertyType>,
    /// Type of any trailing arguments beyond `arguments`.
    pub variadic: Option<PropertyType>,
    pub returns: PropertyType,
}

impl Signature {
    pub fn new(arguments: impl Into<Vec<PropertyType>>, returns: PropertyType) -> Self {
        Self {
            arguments: arguments.into(),
            variadic: None,
            returns,
        }
    }

    pub fn variadic(mut self, kind: PropertyType) -> Self {
        self.variadic = Some(kind);
        self
    }

    /// Expected type of the argument at `position`, `None` when out of range.
    pub fn argument(&self, position: usize) -> Option<PropertyType> {
        self.arguments.get(position).copied().or(self.variadic)
    }

    pub fn accepts_count(&self, count: usize) -> bool {
        if self.variadic.is_some() {
            count >= self.arguments.len()
        } else {
            count == self.arguments.len()
        }
    }
}

/// A computed value usable inside templates as `name(arg, ...)`.
///
/// Every call site compiles into its own node that writes the result under
/// a `stack` resource.
#[async_trait]
pub trait Function: Send + Sync {
    fn name(&self) -> &str;

    fn signature(&self) -> Signature;

    async fn call(&self, arguments: Vec<Value>) -> Result<Value, CallError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_signatures_require_exact_counts() {
        let signature = Signature::new([PropertyType::String], PropertyType::String);
        assert!(signature.accepts_count(1));
        assert!(!signature.accepts_count(2));
        assert_eq!(signature.argument(1), None);
    }

    #[test]
    fn variadic_signatures_accept_trailing_arguments() {
        let signature = Signature::new([PropertyType::String], PropertyType::String)
            .variadic(PropertyType::Any);
        assert!(!signature.accepts_count(0));
        assert!(signature.accepts_count(4));
        assert_eq!(signature.argument(3), Some(PropertyType::Any));
    }
}
