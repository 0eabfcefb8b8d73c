// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

use super::reference::{is_path_char, is_resource_char};
use super::Reference;
use crate::flow::Value;

pub(crate) const TEMPLATE_OPEN: &str = "{{";
pub(crate) const TEMPLATE_CLOSE: &str = "}}";

/// A parsed property template.
///
/// ```text
/// {{ user:name }}                      -> Reference
/// {{ 'hello' }}                        -> Literal
/// {{ strconcat('id-', input:id) }}     -> Call
/// plain text                           -> Literal
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Template {
    Literal(Value),
    Reference(Reference),
    Call {
        function: String,
        arguments: Vec<Template>,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} at offset {position}")]
pub struct TemplateError {
    pub position: usize,
    pub message: String,
}

impl Template {
    pub fn is_template(raw: &str) -> bool {
        let trimmed = raw.trim();
        trimmed.starts_with(TEMPLATE_OPEN) && trimmed.ends_with(TEMPLATE_CLOSE)
    }

    /// Parses a raw property value. Strings without template braces are literals.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        if !Self::is_template(raw) {
            return Ok(Template::Literal(Value::String(raw.to_string())));
        }

        let trimmed = raw.trim();
        let content = &trimmed[TEMPLATE_OPEN.len()..trimmed.len() - TEMPLATE_CLOSE.len()];
        Self::parse_expression(content)
    }

    /// Parses a declared property value: strings may be templates, every other
    /// value is taken literally.
    pub fn from_value(value: &Value) -> Result<Self, TemplateError> {
        match value {
            Value::String(raw) => Self::parse(raw),
            other => Ok(Template::Literal(other.clone())),
        }
    }

    /// Parses the content between template braces.
    pub fn parse_expression(content: &str) -> Result<Self, TemplateError> {
        let mut parser = ExpressionParser::new(content);
        let template = parser.expression()?;
        parser.skip_whitespace();
        if parser.peek().is_some() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(template)
    }

    /// Appends every reference used by this template, including inside call arguments.
    pub fn collect_references(&self, into: &mut Vec<Reference>) {
        match self {
            Template::Literal(_) => {}
            Template::Reference(reference) => into.push(reference.clone()),
            Template::Call { arguments, .. } => {
                for argument in arguments {
                    argument.collect_references(into);
                }
            }
        }
    }

    pub fn references(&self) -> Vec<Reference> {
        let mut references = Vec::new();
        self.collect_references(&mut references);
        references
    }
}

struct ExpressionParser {
    chars: Vec<char>,
    position: usize,
}

impl ExpressionParser {
    fn new(content: &str) -> Self {
        Self {
            chars: content.chars().collect(),
            position: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.position).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.position + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.position += 1;
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.position += 1;
        }
    }

    fn take_while(&mut self, predicate: impl Fn(char) -> bool) -> String {
        let start = self.position;
        while self.peek().is_some_and(&predicate) {
            self.position += 1;
        }
        self.chars[start..self.position].iter().collect()
    }

    fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError {
            position: self.position,
            message: message.into(),
        }
    }

    fn expression(&mut self) -> Result<Template, TemplateError> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(self.error("expected expression")),
            Some('\'') => self.string(),
            Some(c) if c.is_ascii_digit() => self.number(),
            Some('-') if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => self.number(),
            Some(_) => self.word(),
        }
    }

    fn string(&mut self) -> Result<Template, TemplateError> {
        self.bump();
        let content = self.take_while(|c| c != '\'');
        if self.bump() != Some('\'') {
            return Err(self.error("unterminated string literal"));
        }
        Ok(Template::Literal(Value::String(content)))
    }

    fn number(&mut self) -> Result<Template, TemplateError> {
        let start = self.position;
        let raw = self.take_while(|c| c.is_ascii_digit() || matches!(c, '-' | '.' | 'e' | 'E' | '+'));
        if let Ok(int) = raw.parse::<i64>() {
            return Ok(Template::Literal(Value::from(int)));
        }
        raw.parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(|n| Template::Literal(Value::Number(n)))
            .ok_or(TemplateError {
                position: start,
                message: format!("invalid number '{}'", raw),
            })
    }

    fn word(&mut self) -> Result<Template, TemplateError> {
        let word = self.take_while(is_resource_char);
        if word.is_empty() {
            return Err(self.error(format!(
                "unexpected character '{}'",
                self.peek().unwrap_or_default()
            )));
        }

        self.skip_whitespace();
        match self.peek() {
            Some('(') => self.call(word),
            Some(':') => {
                self.bump();
                let path = self.take_while(is_path_char);
                if path.contains("..") {
                    return Err(self.error(format!("invalid path '{}'", path)));
                }
                Ok(Template::Reference(Reference::new(word, path)))
            }
            _ => match word.as_str() {
                "true" => Ok(Template::Literal(Value::Bool(true))),
                "false" => Ok(Template::Literal(Value::Bool(false))),
                "null" => Ok(Template::Literal(Value::Null)),
                _ => Err(self.error(format!("expected ':' or '(' after '{}'", word))),
            },
        }
    }

    fn call(&mut self, function: String) -> Result<Template, TemplateError> {
        if !function.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(self.error(format!("invalid function name '{}'", function)));
        }

        self.bump();
        let mut arguments = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(')') {
            self.bump();
            return Ok(Template::Call { function, arguments });
        }

        loop {
            arguments.push(self.expression()?);
            self.skip_whitespace();
            match self.bump() {
                Some(',') => continue,
                Some(')') => break,
                _ => return Err(self.error("expected ',' or ')' in argument list")),
            }
        }

        Ok(Template::Call { function, arguments })
    }
}
