// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::errors::CallError;
use crate::flow::{Metadata, Schema, Value};

/// Streamed request or response body.
pub type Body = Pin<Box<dyn AsyncRead + Send>>;

/// A request handed to a resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    pub header: Metadata,
    pub body: Value,
    /// Set on rollback calls: the exchange of the node being compensated.
    pub origin: Option<Arc<Exchange>>,
}

impl Request {
    pub fn new(body: Value) -> Self {
        Self {
            body,
            ..Default::default()
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.header.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub header: Metadata,
    pub body: Value,
}

impl Response {
    pub fn new(body: Value) -> Self {
        Self {
            header: Metadata::new(),
            body,
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.header.insert(key.into(), value.into());
        self
    }
}

/// The request a node sent and the response it received.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub node: String,
    pub request: Request,
    pub response: Response,
}

pub struct ForwardRequest {
    pub header: Metadata,
    pub body: Body,
}

pub struct ForwardResponse {
    pub header: Metadata,
    pub body: Body,
}

impl fmt::Debug for ForwardRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForwardRequest")
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for ForwardResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForwardResponse")
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

/// A downstream service the engine calls on behalf of a node.
///
/// Implementations own their transport and codec. The engine hands over a
/// resolved request and stores the response body under the node's name.
#[async_trait]
pub trait Resource: Send + Sync {
    fn name(&self) -> &str;

    /// Response schema used to type-check references at compile time.
    /// `None` leaves references into this resource unchecked.
    fn response_schema(&self) -> Option<Schema> {
        None
    }

    /// Whether [`Resource::forward`] is implemented.
    fn supports_forwarding(&self) -> bool {
        false
    }

    async fn call(&self, request: Request) -> Result<Response, CallError>;

    /// Streams a body through without buffering it. Only invoked for proxy
    /// nodes, after `supports_forwarding` returned true at compile time.
    async fn forward(&self, _request: ForwardRequest) -> Result<ForwardResponse, CallError> {
        Err(CallError::Unsupported {
            resource: self.name().to_string(),
            capability: "forward".to_string(),
        })
    }
}
