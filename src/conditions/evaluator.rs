// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::cmp::Ordering;

use thiserror::Error;

use super::Expression;
use crate::flow::Value;
use crate::references::{Lookup, ReferenceStore, Template};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EvaluationError {
    pub message: String,
}

/// Evaluates a condition against the store.
///
/// A condition that reads from a skipped resource is false. Paths that were
/// never written read as `null`.
pub fn evaluate(expression: &Expression, store: &ReferenceStore) -> Result<bool, EvaluationError> {
    let reads_skipped = expression
        .references()
        .iter()
        .any(|reference| store.load(reference) == Lookup::Skipped);
    if reads_skipped {
        return Ok(false);
    }

    Ok(truthy(&value(expression, store)?))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn value(expression: &Expression, store: &ReferenceStore) -> Result<Value, EvaluationError> {
    let compare = |l: &Expression, r: &Expression, accept: fn(Ordering) -> bool| {
        let ordering = order(&value(l, store)?, &value(r, store)?)?;
        Ok::<_, EvaluationError>(Value::Bool(accept(ordering)))
    };

    Ok(match expression {
        Expression::Operand(template) => operand(template, store)?,
        Expression::Not(inner) => Value::Bool(!truthy(&value(inner, store)?)),
        Expression::And(l, r) => Value::Bool(truthy(&value(l, store)?) && truthy(&value(r, store)?)),
        Expression::Or(l, r) => Value::Bool(truthy(&value(l, store)?) || truthy(&value(r, store)?)),
        Expression::Equal(l, r) => Value::Bool(equal(&value(l, store)?, &value(r, store)?)),
        Expression::NotEqual(l, r) => Value::Bool(!equal(&value(l, store)?, &value(r, store)?)),
        Expression::GreaterThan(l, r) => compare(l, r, Ordering::is_gt)?,
        Expression::GreaterThanOrEqual(l, r) => compare(l, r, Ordering::is_ge)?,
        Expression::SmallerThan(l, r) => compare(l, r, Ordering::is_lt)?,
        Expression::SmallerThanOrEqual(l, r) => compare(l, r, Ordering::is_le)?,
    })
}

fn operand(template: &Template, store: &ReferenceStore) -> Result<Value, EvaluationError> {
    match template {
        Template::Literal(value) => Ok(value.clone()),
        Template::Reference(reference) => Ok(match store.load(reference) {
            Lookup::Value(value) => value.clone(),
            Lookup::Skipped | Lookup::Missing => Value::Null,
        }),
        Template::Call { function, .. } => Err(EvaluationError {
            message: format!("function '{}' was not compiled into a node", function),
        }),
    }
}

fn equal(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) if left.is_number() && right.is_number() => l == r,
        _ => left == right,
    }
}

fn order(left: &Value, right: &Value) -> Result<Ordering, EvaluationError> {
    let ordering = match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.as_f64().zip(r.as_f64()).and_then(|(l, r)| l.partial_cmp(&r)),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ => None,
    };

    ordering.ok_or_else(|| EvaluationError {
        message: format!("cannot order {} against {}", left, right),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::parse_condition;
    use serde_json::json;

    fn store() -> ReferenceStore {
        let store = ReferenceStore::with_resources(["input", "user", "skipped"]);
        store
            .store("input", json!({ "id": "42", "amount": 150, "guest": false, "ratio": 0.5 }))
            .unwrap();
        store.store("user", json!({ "vip": true, "tags": [] })).unwrap();
        store.skip("skipped").unwrap();
        store
    }

    fn eval(condition: &str) -> Result<bool, EvaluationError> {
        evaluate(&parse_condition(condition).unwrap(), &store())
    }

    #[test]
    fn compares_values() {
        assert!(eval("{{ input:id }} == '42'").unwrap());
        assert!(eval("{{ input:id }} == {{ input:id }}").unwrap());
        assert!(eval("{{ input:amount }} > 100").unwrap());
        assert!(eval("{{ input:amount }} == 150.0").unwrap());
        assert!(!eval("{{ input:ratio }} >= 1").unwrap());
        assert!(eval("'abc' < 'abd'").unwrap());
    }

    #[test]
    fn combines_with_logic() {
        assert!(eval("{{ user:vip }} && !{{ input:guest }}").unwrap());
        assert!(eval("{{ input:guest }} || {{ input:amount }} > 100").unwrap());
        assert!(!eval("({{ input:guest }} || false) && true").unwrap());
    }

    #[test]
    fn bare_operands_use_truthiness() {
        assert!(eval("{{ user:tags }}").unwrap());
        assert!(!eval("{{ user:missing }}").unwrap());
        assert!(eval("{{ user:missing }} == null").unwrap());
    }

    #[test]
    fn reading_a_skipped_resource_is_false() {
        assert!(!eval("{{ skipped:x }} == null").unwrap());
        assert!(!eval("!{{ skipped:x }}").unwrap());
    }

    #[test]
    fn ordering_mismatched_types_is_an_error() {
        let err = eval("{{ input:id }} > 10").unwrap_err();
        assert!(err.message.contains("cannot order"));
    }
}
