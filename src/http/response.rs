//! Assembled HTTP response.

use crate::base::neterror::NetError;
use crate::http::caselessheaders::CaselessHeaderMap;
use crate::http::responsebody::{concat, ResponseBody};
use crate::http::streamfactory::ResponseHead;
use bytes::Bytes;
use once_cell::sync::OnceCell;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;

/// Fully buffered result of one exchange.
///
/// Header, trailer and body views are built on first access from the raw
/// data captured when the stream ended, and never change afterwards.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    status: u16,
    status_text: String,
    method: String,
    raw_headers: Vec<String>,
    raw_trailers: Vec<String>,
    chunks: Vec<Bytes>,
    headers: OnceCell<CaselessHeaderMap>,
    trailers: OnceCell<CaselessHeaderMap>,
    body: OnceCell<ResponseBody>,
}

impl ResponseEnvelope {
    pub fn new(head: ResponseHead, chunks: Vec<Bytes>, raw_trailers: Vec<String>) -> Self {
        Self {
            status: head.status,
            status_text: head.status_text,
            method: head.method,
            raw_headers: head.raw_headers,
            raw_trailers,
            chunks,
            headers: OnceCell::new(),
            trailers: OnceCell::new(),
            body: OnceCell::new(),
        }
    }

    /// Get the status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn headers(&self) -> &CaselessHeaderMap {
        self.headers
            .get_or_init(|| CaselessHeaderMap::from_flat(&self.raw_headers))
    }

    pub fn trailers(&self) -> &CaselessHeaderMap {
        self.trailers
            .get_or_init(|| CaselessHeaderMap::from_flat(&self.raw_trailers))
    }

    /// Received body chunks in arrival order.
    pub fn chunks(&self) -> &[Bytes] {
        &self.chunks
    }

    pub fn body(&self) -> &ResponseBody {
        self.body
            .get_or_init(|| ResponseBody::from_bytes(&concat(&self.chunks)))
    }

    pub fn bytes(&self) -> Bytes {
        concat(&self.chunks)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes()).into_owned()
    }

    /// Deserialize the body as JSON into `T`.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, NetError> {
        serde_json::from_slice(&self.bytes()).map_err(|_| NetError::InvalidResponse)
    }

    pub fn is_redirect(&self) -> bool {
        (300..=399).contains(&self.status)
    }

    pub fn location(&self) -> Option<&str> {
        self.headers().get("location")
    }
}

impl Serialize for ResponseEnvelope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ResponseEnvelope", 6)?;
        s.serialize_field("body", self.body())?;
        s.serialize_field("headers", self.headers())?;
        s.serialize_field("method", &self.method)?;
        s.serialize_field("statusCode", &self.status)?;
        s.serialize_field("statusMessage", &self.status_text)?;
        s.serialize_field("trailers", self.trailers())?;
        s.end()
    }
}

impl fmt::Display for ResponseEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = serde_json::to_string_pretty(self).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope(status: u16, headers: &[(&str, &str)], body: &str) -> ResponseEnvelope {
        let mut head = ResponseHead::new(status, "Status").with_method("POST");
        for (k, v) in headers {
            head = head.with_header(*k, *v);
        }
        ResponseEnvelope::new(head, vec![Bytes::from(body.to_owned())], Vec::new())
    }

    #[test]
    fn test_headers_are_caseless() {
        let resp = envelope(301, &[("Location", "/next"), ("X-Id", "7")], "");
        assert_eq!(resp.headers().get("location"), Some("/next"));
        assert_eq!(resp.location(), Some("/next"));
        assert!(resp.is_redirect());
        assert!(resp.trailers().is_empty());
    }

    #[test]
    fn test_status_range() {
        assert!(!envelope(200, &[], "").is_redirect());
        assert!(!envelope(400, &[], "").is_redirect());
        assert!(envelope(399, &[], "").is_redirect());
    }

    #[test]
    fn test_typed_json() {
        #[derive(serde::Deserialize)]
        struct Reply {
            ok: bool,
        }
        let resp = envelope(200, &[], r#"{"ok":true}"#);
        assert!(resp.json::<Reply>().unwrap().ok);
        assert_eq!(
            envelope(200, &[], "nope").json::<Reply>().err(),
            Some(NetError::InvalidResponse)
        );
    }

    #[test]
    fn test_serialized_shape() {
        let resp = envelope(201, &[("Content-Type", "application/json")], r#"[1,2]"#);
        let value = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            value,
            json!({
                "body": [1, 2],
                "headers": {"Content-Type": "application/json"},
                "method": "POST",
                "statusCode": 201,
                "statusMessage": "Status",
                "trailers": {}
            })
        );
    }

    #[test]
    fn test_display_is_pretty_json() {
        let rendered = envelope(200, &[], "plain").to_string();
        assert!(rendered.contains("\"body\": \"plain\""));
        assert!(rendered.contains('\n'));
    }
}
