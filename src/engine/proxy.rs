// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Streaming pass-through for proxy nodes.
//!
//! The inbound body is pumped into an in-memory pipe whose capacity is the
//! configured window. The resource reads the other end at its own pace, so
//! at most one window plus one copy buffer of inbound bytes is held in
//! memory regardless of body size.
//!
//! The proxy node completes when response headers arrive, so the response
//! body outlives the execution. `ProxyStream` keeps the execution's sealed
//! rollback log; if the body breaks, the node is reported failed with
//! `CallError::Stream` and every compensable node is rolled back.

use std::collections::BTreeMap;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use tokio::io::{AsyncRead, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::errors::{CallError, ExecutionError, FlowFailure};
use crate::flow::Metadata;
use crate::graph::CompiledFlow;
use crate::observability::messages::engine::ExecutionFailed;
use crate::observability::messages::node::ProxyStreamAborted;
use crate::observability::messages::StructuredLog;
use crate::references::ReferenceStore;
use crate::traits::{Body, ForwardRequest, ForwardResponse, Resource};

use super::context::NodeState;
use super::rollback::{RollbackCoordinator, RollbackEntry};

#[derive(Debug, Clone, Copy)]
pub struct ProxyForwarder {
    window: usize,
}

impl ProxyForwarder {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
        }
    }

    /// Forwards `inbound` through `resource` and returns its streamed response.
    ///
    /// Returns once the resource has produced response headers. A broken
    /// inbound stream surfaces as a read error on the resource's side; a
    /// failing resource stops the inbound pump.
    pub async fn forward(
        &self,
        resource: &Arc<dyn Resource>,
        header: Metadata,
        inbound: Body,
    ) -> Result<ForwardResponse, CallError> {
        let (writer, reader) = tokio::io::duplex(self.window);
        let pump = tokio::spawn(pump(inbound, writer));

        let request = ForwardRequest {
            header,
            body: Box::pin(PumpedReader {
                reader,
                pump,
                finished: false,
            }),
        };

        resource.forward(request).await
    }
}

async fn pump(mut inbound: Body, mut writer: DuplexStream) -> io::Result<u64> {
    let copied = tokio::io::copy(&mut inbound, &mut writer).await?;
    writer.shutdown().await?;
    Ok(copied)
}

/// Read side of the pipe. End of stream is only reported once the pump has
/// finished cleanly; a pump error is returned in its place.
struct PumpedReader {
    reader: DuplexStream,
    pump: JoinHandle<io::Result<u64>>,
    finished: bool,
}

impl AsyncRead for PumpedReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        ready!(Pin::new(&mut this.reader).poll_read(cx, buf))?;

        if buf.filled().len() > before || buf.remaining() == 0 || this.finished {
            return Poll::Ready(Ok(()));
        }

        let outcome = ready!(Pin::new(&mut this.pump).poll(cx));
        this.finished = true;
        Poll::Ready(match outcome {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(error)) => Err(error),
            Err(join) => Err(io::Error::new(io::ErrorKind::BrokenPipe, join.to_string())),
        })
    }
}

impl Drop for PumpedReader {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

/// What an execution still owes if its proxied response breaks after the
/// flow has completed: the failure to report and the rollback to run.
pub(crate) struct StreamCompensation {
    pub flow: Arc<CompiledFlow>,
    pub node: String,
    pub entries: Vec<RollbackEntry>,
    pub store: Arc<ReferenceStore>,
    pub coordinator: RollbackCoordinator,
    pub states: BTreeMap<String, NodeState>,
    pub started: Instant,
}

impl StreamCompensation {
    async fn run(mut self, error: io::Error) -> FlowFailure {
        let primary = ExecutionError::Call {
            node: self.node.clone(),
            source: CallError::Stream {
                message: error.to_string(),
            },
        };
        let rollback = self
            .coordinator
            .compensate(&self.flow, self.entries, &self.store)
            .await;

        ExecutionFailed {
            flow: self.flow.name(),
            error: &primary,
            rollback: &rollback,
            duration: self.started.elapsed(),
        }
        .log();

        self.states.insert(self.node, NodeState::Failed);
        FlowFailure {
            flow: self.flow.name().to_string(),
            primary,
            rollback,
            secondary: Vec::new(),
            states: self.states,
        }
    }
}

enum StreamState {
    Open(Option<StreamCompensation>),
    Compensating(io::ErrorKind, JoinHandle<FlowFailure>),
    Aborted(io::ErrorKind),
}

/// Response stream of a proxy node, handed to the caller as
/// `FlowOutput::stream`.
///
/// A read error fails the proxy node after the fact: the execution's rollback
/// runs on its own task and the read resolves, once it has finished, to an
/// error whose inner value is the [`FlowFailure`].
pub(crate) struct ProxyStream {
    inner: Body,
    node: String,
    state: StreamState,
}

impl ProxyStream {
    pub fn new(inner: Body, compensation: StreamCompensation) -> Self {
        Self {
            inner,
            node: compensation.node.clone(),
            state: StreamState::Open(Some(compensation)),
        }
    }
}

impl AsyncRead for ProxyStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        loop {
            match &mut this.state {
                StreamState::Open(compensation) => {
                    let error = match ready!(this.inner.as_mut().poll_read(cx, buf)) {
                        Ok(()) => return Poll::Ready(Ok(())),
                        Err(error) => error,
                    };
                    ProxyStreamAborted {
                        node: &this.node,
                        reason: &error.to_string(),
                    }
                    .log();

                    let kind = error.kind();
                    match compensation.take() {
                        Some(compensation) => {
                            let handle = tokio::spawn(compensation.run(error));
                            this.state = StreamState::Compensating(kind, handle);
                        }
                        None => {
                            this.state = StreamState::Aborted(kind);
                            return Poll::Ready(Err(error));
                        }
                    }
                }
                StreamState::Compensating(kind, handle) => {
                    let kind = *kind;
                    let outcome = ready!(Pin::new(handle).poll(cx));
                    this.state = StreamState::Aborted(kind);
                    return Poll::Ready(Err(match outcome {
                        Ok(failure) => io::Error::new(kind, failure),
                        Err(join) => io::Error::new(kind, join.to_string()),
                    }));
                }
                StreamState::Aborted(kind) => {
                    return Poll::Ready(Err(io::Error::new(
                        *kind,
                        format!("stream of node '{}' was aborted", this.node),
                    )));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::stub::ForwardingResource;
    use tokio::io::AsyncReadExt;

    struct BrokenReader {
        sent: bool,
    }

    impl AsyncRead for BrokenReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.sent {
                return Poll::Ready(Err(io::Error::new(io::ErrorKind::ConnectionReset, "client went away")));
            }
            self.sent = true;
            buf.put_slice(b"partial");
            Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn echoes_body_and_headers() {
        let resource: Arc<dyn Resource> = Arc::new(ForwardingResource::new("upload"));
        let forwarder = ProxyForwarder::new(16);
        let inbound: Body = Box::pin(io::Cursor::new(b"hello through a small window".to_vec()));
        let header = Metadata::from([("content-type".to_string(), "text/plain".to_string())]);

        let mut response = forwarder.forward(&resource, header, inbound).await.unwrap();
        let mut received = String::new();
        response.body.read_to_string(&mut received).await.unwrap();

        assert_eq!(received, "hello through a small window");
        assert_eq!(response.header.get("content-type").map(String::as_str), Some("text/plain"));
    }

    #[tokio::test]
    async fn inbound_failure_reaches_the_reader() {
        let resource: Arc<dyn Resource> = Arc::new(ForwardingResource::new("upload"));
        let forwarder = ProxyForwarder::new(1024);
        let inbound: Body = Box::pin(BrokenReader { sent: false });

        let mut response = forwarder
            .forward(&resource, Metadata::new(), inbound)
            .await
            .unwrap();
        let mut received = Vec::new();
        let error = response.body.read_to_end(&mut received).await.unwrap_err();

        assert_eq!(error.kind(), io::ErrorKind::ConnectionReset);
    }
}
