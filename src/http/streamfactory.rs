//! Contract with the socket layer.
//!
//! A [`SocketTransport`] performs one request: it is handed a resolved
//! [`RequestSpec`], accepts body writes, and on end yields the status line,
//! raw header list and a stream of body events.

use crate::base::neterror::NetError;
use crate::http::responsebody::StreamEvent;
use crate::urlrequest::spec::RequestSpec;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;

/// Status line and raw headers of an inbound response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    pub status_text: String,
    /// Method of the exchange, echoed back onto the response.
    pub method: String,
    /// Flat `[k1, v1, k2, v2, ...]` header list in wire order.
    pub raw_headers: Vec<String>,
}

impl Default for ResponseHead {
    fn default() -> Self {
        Self {
            status: 200,
            status_text: "OK".to_string(),
            method: "GET".to_string(),
            raw_headers: Vec::new(),
        }
    }
}

impl ResponseHead {
    pub fn new(status: u16, status_text: impl Into<String>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            ..Default::default()
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.raw_headers.push(key.into());
        self.raw_headers.push(value.into());
        self
    }
}

/// Body events delivered after the response starts.
pub type EventStream = BoxStream<'static, StreamEvent>;

/// Response-start event: head plus the body stream that follows it.
pub struct ResponseStart {
    pub head: ResponseHead,
    pub events: EventStream,
}

impl std::fmt::Debug for ResponseStart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseStart")
            .field("head", &self.head)
            .finish_non_exhaustive()
    }
}

/// One outgoing request whose body is still being written.
pub trait OutgoingStream: Send {
    /// Queue a body chunk. Must be called before [`end`](Self::end).
    fn write(&mut self, chunk: Bytes) -> Result<(), NetError>;

    /// Signal end of request and wait for the response to start.
    fn end(self: Box<Self>) -> BoxFuture<'static, Result<ResponseStart, NetError>>;
}

/// The external socket layer.
pub trait SocketTransport: Send + Sync {
    fn open(&self, spec: &RequestSpec) -> Result<Box<dyn OutgoingStream>, NetError>;
}
