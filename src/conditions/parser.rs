// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use super::Expression;
use crate::errors::ConditionError;
use crate::flow::Value;
use crate::references::{Template, TemplateError};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Operand(Template),
    Not,
    And,
    Or,
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Smaller,
    SmallerOrEqual,
    Open,
    Close,
}

/// Parses a condition such as `{{ input:id }} == 'x' || !{{ user:active }}`.
///
/// Precedence from loosest to tightest: `||`, `&&`, `!`, comparisons.
pub fn parse_condition(expression: &str) -> Result<Expression, ConditionError> {
    let tokens = tokenize(expression)?;
    let mut parser = Parser {
        expression,
        tokens,
        position: 0,
    };

    let parsed = parser.or()?;
    if let Some((offset, token)) = parser.tokens.get(parser.position) {
        return Err(parser.error_at(*offset, format!("unexpected {:?}", token)));
    }
    Ok(parsed)
}

fn tokenize(expression: &str) -> Result<Vec<(usize, Token)>, ConditionError> {
    let error = |position: usize, message: String| ConditionError {
        expression: expression.to_string(),
        position,
        message,
    };

    let bytes = expression.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let rest = &expression[i..];
        let c = bytes[i];

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let (token, width) = if rest.starts_with("{{") {
            let end = rest
                .find("}}")
                .ok_or_else(|| error(i, "unterminated '{{'".to_string()))?;
            let template = Template::parse_expression(&rest[2..end]).map_err(
                |TemplateError { position, message }| error(i + 2 + position, message),
            )?;
            (Token::Operand(template), end + 2)
        } else if rest.starts_with("&&") {
            (Token::And, 2)
        } else if rest.starts_with("||") {
            (Token::Or, 2)
        } else if rest.starts_with("==") {
            (Token::Equal, 2)
        } else if rest.starts_with("!=") {
            (Token::NotEqual, 2)
        } else if rest.starts_with(">=") {
            (Token::GreaterOrEqual, 2)
        } else if rest.starts_with("<=") {
            (Token::SmallerOrEqual, 2)
        } else {
            match c {
                b'!' => (Token::Not, 1),
                b'>' => (Token::Greater, 1),
                b'<' => (Token::Smaller, 1),
                b'(' => (Token::Open, 1),
                b')' => (Token::Close, 1),
                b'\'' => {
                    let end = rest[1..]
                        .find('\'')
                        .ok_or_else(|| error(i, "unterminated string literal".to_string()))?;
                    let literal = Value::String(rest[1..end + 1].to_string());
                    (Token::Operand(Template::Literal(literal)), end + 2)
                }
                _ => {
                    let width = rest
                        .find(|ch: char| {
                            ch.is_whitespace() || matches!(ch, '(' | ')' | '!' | '=' | '<' | '>' | '&' | '|')
                        })
                        .unwrap_or(rest.len());
                    if width == 0 {
                        return Err(error(i, format!("unexpected character '{}'", c as char)));
                    }
                    (Token::Operand(bare_literal(&rest[..width]).ok_or_else(|| {
                        error(i, format!("unknown operand '{}'", &rest[..width]))
                    })?), width)
                }
            }
        };

        tokens.push((i, token));
        i += width;
    }

    Ok(tokens)
}

fn bare_literal(word: &str) -> Option<Template> {
    let value = match word {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => match word.parse::<i64>() {
            Ok(int) => Value::from(int),
            Err(_) => Value::Number(serde_json::Number::from_f64(word.parse::<f64>().ok()?)?),
        },
    };
    Some(Template::Literal(value))
}

struct Parser<'a> {
    expression: &'a str,
    tokens: Vec<(usize, Token)>,
    position: usize,
}

impl Parser<'_> {
    fn error_at(&self, position: usize, message: impl Into<String>) -> ConditionError {
        ConditionError {
            expression: self.expression.to_string(),
            position,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|(_, token)| token)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    fn or(&mut self) -> Result<Expression, ConditionError> {
        let mut left = self.and()?;
        while self.eat(&Token::Or) {
            left = Expression::Or(Box::new(left), Box::new(self.and()?));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expression, ConditionError> {
        let mut left = self.unary()?;
        while self.eat(&Token::And) {
            left = Expression::And(Box::new(left), Box::new(self.unary()?));
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expression, ConditionError> {
        if self.eat(&Token::Not) {
            return Ok(Expression::Not(Box::new(self.unary()?)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expression, ConditionError> {
        let left = self.primary()?;
        let build: fn(Box<Expression>, Box<Expression>) -> Expression = match self.peek() {
            Some(Token::Equal) => Expression::Equal,
            Some(Token::NotEqual) => Expression::NotEqual,
            Some(Token::Greater) => Expression::GreaterThan,
            Some(Token::GreaterOrEqual) => Expression::GreaterThanOrEqual,
            Some(Token::Smaller) => Expression::SmallerThan,
            Some(Token::SmallerOrEqual) => Expression::SmallerThanOrEqual,
            _ => return Ok(left),
        };
        self.position += 1;
        let right = self.primary()?;
        Ok(build(Box::new(left), Box::new(right)))
    }

    fn primary(&mut self) -> Result<Expression, ConditionError> {
        let end = self.expression.len();
        let Some((offset, token)) = self.tokens.get(self.position).cloned() else {
            return Err(self.error_at(end, "unexpected end of condition"));
        };
        self.position += 1;

        match token {
            Token::Operand(template) => Ok(Expression::Operand(template)),
            Token::Open => {
                let inner = self.or()?;
                if !self.eat(&Token::Close) {
                    let at = self.tokens.get(self.position).map_or(end, |(o, _)| *o);
                    return Err(self.error_at(at, "expected ')'"));
                }
                Ok(inner)
            }
            other => Err(self.error_at(offset, format!("unexpected {:?}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::references::Reference;
    use serde_json::json;

    fn operand(resource: &str, path: &str) -> Box<Expression> {
        Box::new(Expression::Operand(Template::Reference(Reference::new(resource, path))))
    }

    fn literal(value: Value) -> Box<Expression> {
        Box::new(Expression::Operand(Template::Literal(value)))
    }

    #[test]
    fn parses_comparisons() {
        assert_eq!(
            parse_condition("{{ input:id }} == 'x'").unwrap(),
            Expression::Equal(operand("input", "id"), literal(json!("x")))
        );
        assert_eq!(
            parse_condition("{{ input:n }} >= 10").unwrap(),
            Expression::GreaterThanOrEqual(operand("input", "n"), literal(json!(10)))
        );
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let parsed = parse_condition("{{ a:x }} || {{ b:x }} && !{{ c:x }}").unwrap();
        assert_eq!(
            parsed,
            Expression::Or(
                operand("a", "x"),
                Box::new(Expression::And(
                    operand("b", "x"),
                    Box::new(Expression::Not(operand("c", "x")))
                ))
            )
        );
    }

    #[test]
    fn parentheses_group() {
        let parsed = parse_condition("({{ a:x }} || {{ b:x }}) && true").unwrap();
        assert!(matches!(parsed, Expression::And(_, _)));
        assert_eq!(parsed.references().len(), 2);
    }

    #[test]
    fn reports_error_positions() {
        let err = parse_condition("{{ a:x }} == ").unwrap_err();
        assert_eq!(err.position, 13);

        let err = parse_condition("({{ a:x }}").unwrap_err();
        assert_eq!(err.message, "expected ')'");

        let err = parse_condition("{{ a:x }} == banana").unwrap_err();
        assert_eq!(err.position, 13);

        assert!(parse_condition("{{ a:x ").is_err());
        assert!(parse_condition("'open").is_err());
        assert!(parse_condition("").is_err());
    }
}
