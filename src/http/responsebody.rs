//! Response body buffering.
//! Mirrors Chromium's HttpStream::ReadResponseBody, but over pushed events.

use crate::base::neterror::NetError;
use crate::http::response::ResponseEnvelope;
use crate::http::streamfactory::{EventStream, ResponseHead};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use serde::Serialize;
use serde_json::Value;

/// Event pushed by an inbound response stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Data(Bytes),
    /// Stream finished; carries the flat raw trailer list.
    End { raw_trailers: Vec<String> },
    /// Stream failed, with or without a message.
    Error(Option<String>),
}

/// Materialized body: parsed JSON when well-formed, raw text otherwise.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(v) => ResponseBody::Json(v),
            Err(_) => ResponseBody::Text(String::from_utf8_lossy(bytes).into_owned()),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseBody::Json(v) => Some(v),
            ResponseBody::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseBody::Text(s) => Some(s),
            ResponseBody::Json(_) => None,
        }
    }
}

/// Concatenate chunks in arrival order.
pub fn concat(chunks: &[Bytes]) -> Bytes {
    match chunks {
        [] => Bytes::new(),
        [one] => one.clone(),
        many => {
            let mut buf = BytesMut::with_capacity(many.iter().map(Bytes::len).sum());
            for chunk in many {
                buf.extend_from_slice(chunk);
            }
            buf.freeze()
        }
    }
}

/// Collects one response's body chunks until the stream settles.
///
/// The first `End` or `Error` decides the outcome; anything pushed after
/// that is ignored.
#[derive(Debug)]
pub struct ResponseAssembler {
    head: ResponseHead,
    chunks: Vec<Bytes>,
    outcome: Option<Result<Vec<String>, NetError>>,
}

impl ResponseAssembler {
    pub fn new(head: ResponseHead) -> Self {
        Self {
            head,
            chunks: Vec::new(),
            outcome: None,
        }
    }

    /// Feed one event. Returns true once the response has settled.
    pub fn push(&mut self, event: StreamEvent) -> bool {
        if self.outcome.is_some() {
            return true;
        }
        match event {
            StreamEvent::Data(chunk) => {
                if !chunk.is_empty() {
                    self.chunks.push(chunk);
                }
            }
            StreamEvent::End { raw_trailers } => self.outcome = Some(Ok(raw_trailers)),
            StreamEvent::Error(message) => {
                self.outcome = Some(Err(NetError::response_stream(message)))
            }
        }
        self.outcome.is_some()
    }

    pub fn is_settled(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn buffered(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    /// Produce the terminal outcome. A stream that stopped without an
    /// explicit end is treated as ended with no trailers.
    pub fn finish(self) -> Result<ResponseEnvelope, NetError> {
        let raw_trailers = self.outcome.unwrap_or_else(|| Ok(Vec::new()))?;
        Ok(ResponseEnvelope::new(self.head, self.chunks, raw_trailers))
    }

    /// Drain `events` until the response settles.
    pub async fn assemble(mut self, mut events: EventStream) -> Result<ResponseEnvelope, NetError> {
        while let Some(event) = events.next().await {
            if self.push(event) {
                break;
            }
        }
        self.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::neterror::GENERIC_RESPONSE_ERROR;
    use serde_json::json;

    fn data(s: &str) -> StreamEvent {
        StreamEvent::Data(Bytes::from(s.to_owned()))
    }

    fn end() -> StreamEvent {
        StreamEvent::End {
            raw_trailers: Vec::new(),
        }
    }

    #[test]
    fn test_json_body_is_parsed() {
        let mut asm = ResponseAssembler::new(ResponseHead::default());
        asm.push(data("{\"a\":"));
        asm.push(data("1}"));
        assert!(asm.push(end()));
        let resp = asm.finish().unwrap();
        assert_eq!(resp.body(), &ResponseBody::Json(json!({"a": 1})));
    }

    #[test]
    fn test_malformed_json_degrades_to_text() {
        let mut asm = ResponseAssembler::new(ResponseHead::default());
        asm.push(data("{not json"));
        asm.push(end());
        let resp = asm.finish().unwrap();
        assert_eq!(resp.body().as_text(), Some("{not json"));
    }

    #[test]
    fn test_empty_body_is_empty_text() {
        let asm = ResponseAssembler::new(ResponseHead::default());
        let resp = asm.finish().unwrap();
        assert_eq!(resp.body(), &ResponseBody::Text(String::new()));
    }

    #[test]
    fn test_error_without_message_is_generic() {
        let mut asm = ResponseAssembler::new(ResponseHead::default());
        asm.push(data("partial"));
        assert!(asm.push(StreamEvent::Error(None)));
        assert_eq!(
            asm.finish().unwrap_err(),
            NetError::ResponseStream(GENERIC_RESPONSE_ERROR.to_string())
        );
    }

    #[test]
    fn test_events_after_settlement_are_ignored() {
        let mut asm = ResponseAssembler::new(ResponseHead::default());
        asm.push(data("ok"));
        asm.push(end());
        asm.push(data("late"));
        asm.push(StreamEvent::Error(Some("boom".into())));
        let resp = asm.finish().unwrap();
        assert_eq!(resp.text(), "ok");
    }

    #[test]
    fn test_concat_preserves_order() {
        let chunks = vec![Bytes::from("a"), Bytes::from("b"), Bytes::from("c")];
        assert_eq!(concat(&chunks), Bytes::from("abc"));
        assert_eq!(concat(&[]), Bytes::new());
    }

    #[tokio::test]
    async fn test_assemble_from_stream() {
        let events = futures::stream::iter(vec![
            data("hello "),
            data("world"),
            StreamEvent::End {
                raw_trailers: vec!["X-Checksum".into(), "abc".into()],
            },
        ])
        .boxed();
        let resp = ResponseAssembler::new(ResponseHead::default())
            .assemble(events)
            .await
            .unwrap();
        assert_eq!(resp.text(), "hello world");
        assert_eq!(resp.trailers().get("x-checksum"), Some("abc"));
        assert_eq!(resp.chunks().len(), 2);
    }

    #[tokio::test]
    async fn test_assemble_stream_error() {
        let events = futures::stream::iter(vec![
            data("x"),
            StreamEvent::Error(Some("socket hang up".into())),
        ])
        .boxed();
        let err = ResponseAssembler::new(ResponseHead::default())
            .assemble(events)
            .await
            .unwrap_err();
        assert_eq!(err, NetError::ResponseStream("socket hang up".into()));
    }
}
