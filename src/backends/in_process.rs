// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::CallError;
use crate::flow::{Schema, Value};
use crate::traits::{Request, Resource, Response};

type Handler =
    dyn Fn(Request) -> Pin<Box<dyn Future<Output = Result<Response, CallError>> + Send>> + Send + Sync;

/// A resource implemented by an async closure running in this process.
///
/// ```rust
/// use the_switchyard::backends::FnResource;
/// use the_switchyard::traits::Response;
///
/// let greeter = FnResource::new("greeter", |request| async move {
///     Ok(Response::new(request.body))
/// });
/// # let _ = greeter;
/// ```
pub struct FnResource {
    name: String,
    schema: Option<Schema>,
    handler: Arc<Handler>,
}

impl FnResource {
    pub fn new<F, Fut>(name: &str, handler: F) -> Self
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response, CallError>> + Send + 'static,
    {
        Self {
            name: name.to_string(),
            schema: None,
            handler: Arc::new(move |request| Box::pin(handler(request))),
        }
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }
}

impl fmt::Debug for FnResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnResource")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Resource for FnResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn response_schema(&self) -> Option<Schema> {
        self.schema.clone()
    }

    async fn call(&self, request: Request) -> Result<Response, CallError> {
        (self.handler)(request).await
    }
}

/// A resource that always answers with the same response.
#[derive(Debug, Clone)]
pub struct StaticResource {
    name: String,
    response: Response,
}

impl StaticResource {
    pub fn new(name: &str, body: Value) -> Self {
        Self {
            name: name.to_string(),
            response: Response::new(body),
        }
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.response = self.response.with_header(key, value);
        self
    }
}

#[async_trait]
impl Resource for StaticResource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, _request: Request) -> Result<Response, CallError> {
        Ok(self.response.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn closure_sees_the_request() {
        let resource = FnResource::new("double", |request: Request| async move {
            let n = request.body["n"].as_i64().ok_or_else(|| CallError::failed("n must be a number"))?;
            Ok(Response::new(json!({ "n": n * 2 })))
        });

        let response = resource.call(Request::new(json!({ "n": 21 }))).await.unwrap();
        assert_eq!(response.body, json!({ "n": 42 }));

        let error = resource.call(Request::new(json!({}))).await.unwrap_err();
        assert_eq!(error, CallError::failed("n must be a number"));
    }

    #[tokio::test]
    async fn static_resource_ignores_the_request() {
        let resource = StaticResource::new("config", json!({ "region": "eu" })).with_header("etag", "7");
        let response = resource.call(Request::new(json!("anything"))).await.unwrap();

        assert_eq!(response.body, json!({ "region": "eu" }));
        assert_eq!(response.header.get("etag").map(String::as_str), Some("7"));
    }
}
