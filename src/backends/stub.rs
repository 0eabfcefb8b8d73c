// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{ready, Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, ReadBuf};

use crate::errors::CallError;
use crate::flow::{Schema, Value};
use crate::traits::{Body, ForwardRequest, ForwardResponse, Request, Resource, Response};

/// Names of the resources called, in call order, shared across resources.
pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Tracks how many calls are in flight and the highest count observed.
#[derive(Debug, Default)]
pub struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
enum Reply {
    Echo,
    Respond(Response),
    Fail(String),
}

/// Resource double that records every request it receives.
///
/// Echoes the request body unless told to respond with a fixed value or fail.
#[derive(Debug)]
pub struct RecordingResource {
    name: String,
    schema: Option<Schema>,
    reply: Reply,
    delay: Option<Duration>,
    log: Option<CallLog>,
    gauge: Option<Arc<Gauge>>,
    calls: Mutex<Vec<Request>>,
}

impl RecordingResource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            schema: None,
            reply: Reply::Echo,
            delay: None,
            log: None,
            gauge: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn responding(mut self, body: Value) -> Self {
        self.reply = Reply::Respond(Response::new(body));
        self
    }

    pub fn responding_with(mut self, response: Response) -> Self {
        self.reply = Reply::Respond(response);
        self
    }

    pub fn failing(mut self, message: &str) -> Self {
        self.reply = Reply::Fail(message.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn logging_to(mut self, log: &CallLog) -> Self {
        self.log = Some(log.clone());
        self
    }

    pub fn tracking(mut self, gauge: &Arc<Gauge>) -> Self {
        self.gauge = Some(gauge.clone());
        self
    }

    pub fn calls(&self) -> Vec<Request> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|calls| calls.len()).unwrap_or_default()
    }
}

#[async_trait]
impl Resource for RecordingResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn response_schema(&self) -> Option<Schema> {
        self.schema.clone()
    }

    async fn call(&self, request: Request) -> Result<Response, CallError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.clone());
        }
        if let Some(log) = &self.log {
            if let Ok(mut log) = log.lock() {
                log.push(self.name.clone());
            }
        }

        if let Some(gauge) = &self.gauge {
            gauge.enter();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(gauge) = &self.gauge {
            gauge.leave();
        }

        match &self.reply {
            Reply::Echo => Ok(Response::new(request.body)),
            Reply::Respond(response) => Ok(response.clone()),
            Reply::Fail(message) => Err(CallError::failed(message.clone())),
        }
    }
}

/// Streaming resource that echoes the forwarded body and header back.
#[derive(Debug)]
pub struct ForwardingResource {
    name: String,
    break_after: Option<usize>,
}

impl ForwardingResource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            break_after: None,
        }
    }

    /// The echoed response resets after `bytes` bytes.
    pub fn breaking_after(mut self, bytes: usize) -> Self {
        self.break_after = Some(bytes);
        self
    }
}

#[async_trait]
impl Resource for ForwardingResource {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_forwarding(&self) -> bool {
        true
    }

    async fn call(&self, request: Request) -> Result<Response, CallError> {
        Ok(Response::new(request.body))
    }

    async fn forward(&self, request: ForwardRequest) -> Result<ForwardResponse, CallError> {
        let body: Body = match self.break_after {
            Some(remaining) => Box::pin(BreakingReader {
                inner: request.body,
                remaining,
            }),
            None => request.body,
        };
        Ok(ForwardResponse {
            header: request.header,
            body,
        })
    }
}

/// Passes `remaining` bytes through, then fails with a connection reset.
struct BreakingReader {
    inner: Body,
    remaining: usize,
}

impl AsyncRead for BreakingReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let reset = || io::Error::new(io::ErrorKind::ConnectionReset, "upstream reset");
        if this.remaining == 0 || buf.remaining() == 0 {
            return Poll::Ready(Err(reset()));
        }

        let mut chunk = vec![0u8; this.remaining.min(buf.remaining())];
        let mut limited = ReadBuf::new(&mut chunk);
        ready!(this.inner.as_mut().poll_read(cx, &mut limited))?;
        let read = limited.filled().len();
        if read == 0 {
            return Poll::Ready(Err(reset()));
        }

        buf.put_slice(limited.filled());
        this.remaining -= read;
        Poll::Ready(Ok(()))
    }
}

/// Produces `total` bytes on demand and counts how many were handed out.
pub struct CountingReader {
    remaining: usize,
    produced: Arc<AtomicUsize>,
}

impl CountingReader {
    pub fn new(total: usize) -> (Self, Arc<AtomicUsize>) {
        let produced = Arc::new(AtomicUsize::new(0));
        (
            Self {
                remaining: total,
                produced: produced.clone(),
            },
            produced,
        )
    }
}

impl AsyncRead for CountingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let chunk = self.remaining.min(buf.remaining());
        if chunk > 0 {
            buf.put_slice(&vec![b'x'; chunk]);
            self.remaining -= chunk;
            self.produced.fetch_add(chunk, Ordering::SeqCst);
        }
        Poll::Ready(Ok(()))
    }
}
