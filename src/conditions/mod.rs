// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Boolean node conditions.
//!
//! ```text
//! {{ input:amount }} > 100 && ({{ user:vip }} || !{{ input:guest }})
//! ```
//!
//! Operands are templates or bare literals. Conditions are parsed at compile
//! time and evaluated when a node becomes structurally ready.

mod evaluator;
mod parser;

pub use evaluator::{evaluate, EvaluationError};
pub use parser::parse_condition;

use crate::references::{Reference, Template};

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    // Logical
    Not(Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),

    // Comparison
    Equal(Box<Expression>, Box<Expression>),
    NotEqual(Box<Expression>, Box<Expression>),
    GreaterThan(Box<Expression>, Box<Expression>),
    GreaterThanOrEqual(Box<Expression>, Box<Expression>),
    SmallerThan(Box<Expression>, Box<Expression>),
    SmallerThanOrEqual(Box<Expression>, Box<Expression>),

    Operand(Template),
}

impl Expression {
    pub fn references(&self) -> Vec<Reference> {
        let mut references = Vec::new();
        self.visit(&mut |template| template.collect_references(&mut references));
        references
    }

    pub fn visit(&self, visitor: &mut impl FnMut(&Template)) {
        match self {
            Expression::Operand(template) => visitor(template),
            Expression::Not(inner) => inner.visit(visitor),
            Expression::And(l, r)
            | Expression::Or(l, r)
            | Expression::Equal(l, r)
            | Expression::NotEqual(l, r)
            | Expression::GreaterThan(l, r)
            | Expression::GreaterThanOrEqual(l, r)
            | Expression::SmallerThan(l, r)
            | Expression::SmallerThanOrEqual(l, r) => {
                l.visit(visitor);
                r.visit(visitor);
            }
        }
    }

    pub fn visit_mut(&mut self, visitor: &mut impl FnMut(&mut Template)) {
        match self {
            Expression::Operand(template) => visitor(template),
            Expression::Not(inner) => inner.visit_mut(visitor),
            Expression::And(l, r)
            | Expression::Or(l, r)
            | Expression::Equal(l, r)
            | Expression::NotEqual(l, r)
            | Expression::GreaterThan(l, r)
            | Expression::GreaterThanOrEqual(l, r)
            | Expression::SmallerThan(l, r)
            | Expression::SmallerThanOrEqual(l, r) => {
                l.visit_mut(visitor);
                r.visit_mut(visitor);
            }
        }
    }
}
