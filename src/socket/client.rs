use crate::base::neterror::NetError;
use crate::http::responsebody::StreamEvent;
use crate::http::streamfactory::{OutgoingStream, ResponseHead, ResponseStart, SocketTransport};
use crate::socket::connectjob::ConnectJob;
use crate::urlrequest::spec::RequestSpec;
use bytes::{Bytes, BytesMut};
use futures::future::BoxFuture;
use futures::StreamExt;
use http::header::HOST;
use http::{HeaderMap, HeaderValue, Request};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite};

/// hyper refuses read buffers smaller than this.
const MIN_BUF_SIZE: usize = 8192;

/// Represents a connected socket (TCP or SSL).
/// Mimics net::StreamSocket.
#[derive(Debug)]
pub enum SocketType {
    Tcp(tokio::net::TcpStream),
    Ssl(tokio_boring::SslStream<tokio::net::TcpStream>),
}

impl AsyncRead for SocketType {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            SocketType::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            SocketType::Ssl(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for SocketType {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            SocketType::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            SocketType::Ssl(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            SocketType::Tcp(s) => Pin::new(s).poll_flush(cx),
            SocketType::Ssl(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            SocketType::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            SocketType::Ssl(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// [`SocketTransport`] over a fresh HTTP/1.1 connection per request.
///
/// Pooling is left to the peer: every request opens, uses and drops its
/// own connection.
#[derive(Debug, Clone, Default)]
pub struct HyperTransport;

impl HyperTransport {
    pub fn new() -> Self {
        Self
    }
}

impl SocketTransport for HyperTransport {
    fn open(&self, spec: &RequestSpec) -> Result<Box<dyn OutgoingStream>, NetError> {
        Ok(Box::new(HyperStream {
            spec: spec.clone(),
            body: BytesMut::new(),
        }))
    }
}

struct HyperStream {
    spec: RequestSpec,
    body: BytesMut,
}

impl OutgoingStream for HyperStream {
    fn write(&mut self, chunk: Bytes) -> Result<(), NetError> {
        self.body.extend_from_slice(&chunk);
        Ok(())
    }

    fn end(self: Box<Self>) -> BoxFuture<'static, Result<ResponseStart, NetError>> {
        let HyperStream { spec, body } = *self;
        Box::pin(async move {
            let bounded = async {
                match spec.timeout() {
                    Some(limit) => tokio::time::timeout(limit, exchange(&spec, body.freeze()))
                        .await
                        .map_err(|_| NetError::ConnectionTimedOut)?,
                    None => exchange(&spec, body.freeze()).await,
                }
            };
            match spec.abort() {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(NetError::Aborted),
                    result = bounded => result,
                },
                None => bounded.await,
            }
        })
    }
}

fn flatten(headers: &HeaderMap) -> Vec<String> {
    let mut raw = Vec::with_capacity(headers.len() * 2);
    for (name, value) in headers {
        raw.push(name.as_str().to_string());
        raw.push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    raw
}

async fn exchange(spec: &RequestSpec, body: Bytes) -> Result<ResponseStart, NetError> {
    let socket = ConnectJob::connect(spec).await?;
    let io = TokioIo::new(socket);

    let mut builder = http1::Builder::new();
    if let Some(max) = spec.max_header_size() {
        builder.max_buf_size(max.max(MIN_BUF_SIZE));
    }
    let (mut sender, conn) = builder
        .handshake::<_, Full<Bytes>>(io)
        .await
        .map_err(|e| NetError::Transport(e.to_string()))?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!(error = %e, "connection driver ended");
        }
    });

    let mut headers = spec.headers().to_header_map()?;
    if spec.set_host() && !headers.contains_key(HOST) {
        let host = HeaderValue::from_str(&spec.host()).map_err(|_| NetError::InvalidHeader)?;
        headers.insert(HOST, host);
    }

    let mut req = Request::builder()
        .method(spec.method())
        .uri(spec.path())
        .body(Full::new(body))
        .map_err(|e| NetError::InvalidUrl(e.to_string()))?;
    *req.headers_mut() = headers;

    tracing::debug!(method = %spec.method(), url = %spec.url(), "sending request");

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| NetError::Transport(e.to_string()))?;

    let status = resp.status();
    let status_text = resp
        .extensions()
        .get::<hyper::ext::ReasonPhrase>()
        .map(|r| String::from_utf8_lossy(r.as_bytes()).into_owned())
        .or_else(|| status.canonical_reason().map(str::to_string))
        .unwrap_or_default();

    let head = ResponseHead {
        status: status.as_u16(),
        status_text,
        method: spec.method().to_string(),
        raw_headers: flatten(resp.headers()),
    };

    Ok(ResponseStart {
        head,
        events: body_events(resp.into_body()),
    })
}

/// Turn hyper body frames into [`StreamEvent`]s, ending after trailers,
/// an error or the last frame.
fn body_events(body: Incoming) -> crate::http::streamfactory::EventStream {
    futures::stream::unfold(Some(body), |state| async move {
        let mut body = state?;
        match body.frame().await {
            Some(Ok(frame)) => match frame.into_data() {
                Ok(data) => Some((StreamEvent::Data(data), Some(body))),
                Err(frame) => {
                    let raw_trailers = frame
                        .into_trailers()
                        .map(|t| flatten(&t))
                        .unwrap_or_default();
                    Some((StreamEvent::End { raw_trailers }, None))
                }
            },
            Some(Err(e)) => Some((StreamEvent::Error(Some(e.to_string())), None)),
            None => Some((
                StreamEvent::End {
                    raw_trailers: Vec::new(),
                },
                None,
            )),
        }
    })
    .boxed()
}
