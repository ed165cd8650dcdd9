//! Request body for POST/PUT operations.

use bytes::Bytes;
use serde::{Serialize, Serializer};

/// Encoded request payload, ready to be written before the request ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestBody {
    /// No body; the request is ended immediately.
    #[default]
    Empty,
    /// Body with raw bytes.
    Bytes(Bytes),
}

impl From<String> for RequestBody {
    fn from(s: String) -> Self {
        RequestBody::from(Bytes::from(s))
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(v: Vec<u8>) -> Self {
        RequestBody::from(Bytes::from(v))
    }
}

impl From<&str> for RequestBody {
    fn from(s: &str) -> Self {
        RequestBody::from(Bytes::from(s.to_owned()))
    }
}

impl From<Bytes> for RequestBody {
    fn from(b: Bytes) -> Self {
        if b.is_empty() {
            RequestBody::Empty
        } else {
            RequestBody::Bytes(b)
        }
    }
}

impl RequestBody {
    /// Check if the body is empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, RequestBody::Empty)
    }

    /// Get the length of the body in bytes.
    pub fn len(&self) -> usize {
        match self {
            RequestBody::Empty => 0,
            RequestBody::Bytes(b) => b.len(),
        }
    }

    /// Bytes to write, if any.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            RequestBody::Empty => None,
            RequestBody::Bytes(b) => Some(b),
        }
    }
}

impl Serialize for RequestBody {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RequestBody::Empty => serializer.serialize_none(),
            RequestBody::Bytes(b) => serializer.serialize_str(&String::from_utf8_lossy(b)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body() {
        let body = RequestBody::Empty;
        assert!(body.is_empty());
        assert_eq!(body.len(), 0);
        assert!(body.as_bytes().is_none());
    }

    #[test]
    fn test_from_empty_string_is_empty() {
        let body: RequestBody = String::new().into();
        assert!(body.is_empty());
    }

    #[test]
    fn test_from_str() {
        let body: RequestBody = "test".into();
        assert_eq!(body.len(), 4);
    }

    #[test]
    fn test_from_vec() {
        let body: RequestBody = vec![1u8, 2, 3, 4].into();
        assert_eq!(body.len(), 4);
    }

    #[test]
    fn test_serializes_as_text() {
        let body: RequestBody = "{\"a\":1}".into();
        assert_eq!(serde_json::to_string(&body).unwrap(), r#""{\"a\":1}""#);
        assert_eq!(serde_json::to_string(&RequestBody::Empty).unwrap(), "null");
    }
}
