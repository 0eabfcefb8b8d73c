// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Functions every registry created with `Registry::with_builtins` provides.

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::CallError;
use crate::flow::{PropertyType, Value};
use crate::traits::{Function, Signature};

pub fn all() -> Vec<Arc<dyn Function>> {
    vec![
        Arc::new(StrConcat),
        Arc::new(Upper),
        Arc::new(Lower),
        Arc::new(Sprintf),
        Arc::new(Len),
    ]
}

/// Renders a value the way it appears inside a concatenated string.
fn render(value: &Value) -> String {
    match value {
        Value::String(raw) => raw.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn string_argument<'a>(function: &str, arguments: &'a [Value], position: usize) -> Result<&'a str, CallError> {
    arguments
        .get(position)
        .and_then(Value::as_str)
        .ok_or_else(|| CallError::failed(format!("{}: argument {} must be a string", function, position)))
}

/// `strconcat(a, b, ...)` joins the rendered arguments.
pub struct StrConcat;

#[async_trait]
impl Function for StrConcat {
    fn name(&self) -> &str {
        "strconcat"
    }

    fn signature(&self) -> Signature {
        Signature::new(Vec::new(), PropertyType::String).variadic(PropertyType::Any)
    }

    async fn call(&self, arguments: Vec<Value>) -> Result<Value, CallError> {
        Ok(Value::String(arguments.iter().map(render).collect()))
    }
}

pub struct Upper;

#[async_trait]
impl Function for Upper {
    fn name(&self) -> &str {
        "upper"
    }

    fn signature(&self) -> Signature {
        Signature::new([PropertyType::String], PropertyType::String)
    }

    async fn call(&self, arguments: Vec<Value>) -> Result<Value, CallError> {
        Ok(Value::String(string_argument(self.name(), &arguments, 0)?.to_uppercase()))
    }
}

pub struct Lower;

#[async_trait]
impl Function for Lower {
    fn name(&self) -> &str {
        "lower"
    }

    fn signature(&self) -> Signature {
        Signature::new([PropertyType::String], PropertyType::String)
    }

    async fn call(&self, arguments: Vec<Value>) -> Result<Value, CallError> {
        Ok(Value::String(string_argument(self.name(), &arguments, 0)?.to_lowercase()))
    }
}

/// `sprintf(format, ...)` with `%s`, `%d`, `%v` and `%%`. Surplus arguments are ignored.
pub struct Sprintf;

#[async_trait]
impl Function for Sprintf {
    fn name(&self) -> &str {
        "sprintf"
    }

    fn signature(&self) -> Signature {
        Signature::new([PropertyType::String], PropertyType::String).variadic(PropertyType::Any)
    }

    async fn call(&self, arguments: Vec<Value>) -> Result<Value, CallError> {
        let format = string_argument(self.name(), &arguments, 0)?;
        let mut values = arguments.iter().skip(1);
        let mut output = String::with_capacity(format.len());
        let mut chars = format.chars();

        while let Some(c) = chars.next() {
            if c != '%' {
                output.push(c);
                continue;
            }

            let verb = chars
                .next()
                .ok_or_else(|| CallError::failed("sprintf: dangling '%' at end of format"))?;
            if verb == '%' {
                output.push('%');
                continue;
            }

            let value = values
                .next()
                .ok_or_else(|| CallError::failed(format!("sprintf: missing argument for %{}", verb)))?;
            match verb {
                's' | 'v' => output.push_str(&render(value)),
                'd' => {
                    let number = value
                        .as_i64()
                        .or_else(|| value.as_f64().map(|f| f.trunc() as i64))
                        .ok_or_else(|| CallError::failed(format!("sprintf: %d expects a number, got {}", value)))?;
                    output.push_str(&number.to_string());
                }
                other => return Err(CallError::failed(format!("sprintf: unsupported verb %{}", other))),
            }
        }

        Ok(Value::String(output))
    }
}

/// `len(v)`: characters of a string, items of an array or keys of a message.
pub struct Len;

#[async_trait]
impl Function for Len {
    fn name(&self) -> &str {
        "len"
    }

    fn signature(&self) -> Signature {
        Signature::new([PropertyType::Any], PropertyType::Int)
    }

    async fn call(&self, arguments: Vec<Value>) -> Result<Value, CallError> {
        let length = match arguments.first() {
            Some(Value::String(raw)) => raw.chars().count(),
            Some(Value::Array(items)) => items.len(),
            Some(Value::Object(map)) => map.len(),
            Some(Value::Null) | None => 0,
            Some(other) => return Err(CallError::failed(format!("len: cannot measure {}", other))),
        };
        Ok(Value::from(length as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn strconcat_renders_every_argument() {
        let value = StrConcat.call(vec![json!("id-"), json!(7), json!(null), json!(true)]).await.unwrap();
        assert_eq!(value, json!("id-7true"));
    }

    #[tokio::test]
    async fn case_functions() {
        assert_eq!(Upper.call(vec![json!("ada")]).await.unwrap(), json!("ADA"));
        assert_eq!(Lower.call(vec![json!("ADA")]).await.unwrap(), json!("ada"));
        assert!(Upper.call(vec![json!(1)]).await.is_err());
    }

    #[tokio::test]
    async fn sprintf_formats_verbs() {
        let value = Sprintf
            .call(vec![json!("%s is %d (%v) 100%%"), json!("ada"), json!(36.6), json!([1])])
            .await
            .unwrap();
        assert_eq!(value, json!("ada is 36 ([1]) 100%"));
    }

    #[tokio::test]
    async fn sprintf_rejects_missing_arguments() {
        let err = Sprintf.call(vec![json!("%s and %s"), json!("one")]).await.unwrap_err();
        assert!(err.to_string().contains("missing argument"));
    }

    #[tokio::test]
    async fn len_measures_collections() {
        assert_eq!(Len.call(vec![json!("héllo")]).await.unwrap(), json!(5));
        assert_eq!(Len.call(vec![json!([1, 2])]).await.unwrap(), json!(2));
        assert_eq!(Len.call(vec![json!({ "a": 1 })]).await.unwrap(), json!(1));
        assert!(Len.call(vec![json!(3)]).await.is_err());
    }
}
