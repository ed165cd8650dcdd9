use thiserror::Error;

/// Message used when a transport or response stream fails without
/// supplying an error value of its own.
pub const GENERIC_RESPONSE_ERROR: &str = "An error occurred while handling the HTTP Response";

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum NetError {
    // Connection Errors
    #[error("Connection closed (TCP FIN)")]
    ConnectionClosed,
    #[error("Connection reset (TCP RST)")]
    ConnectionReset,
    #[error("Connection refused")]
    ConnectionRefused,
    #[error("Connection failed")]
    ConnectionFailed,
    #[error("Connection to {host}:{port} failed: {reason}")]
    ConnectionFailedTo {
        host: String,
        port: u16,
        reason: String,
    },
    #[error("Name not resolved")]
    NameNotResolved,
    #[error("Could not resolve {domain}: {reason}")]
    NameNotResolvedFor { domain: String, reason: String },
    #[error("Connection timed out")]
    ConnectionTimedOut,
    #[error("Request aborted")]
    Aborted,
    #[error("SSL protocol error")]
    SslProtocolError,
    #[error("Bad SSL client auth cert")]
    BadSslClientAuthCert,
    #[error("{0}")]
    Transport(String),

    // HTTP Errors
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid header")]
    InvalidHeader,
    #[error("Invalid method: {0}")]
    InvalidMethod(String),
    #[error("Invalid response")]
    InvalidResponse,
    #[error("{0}")]
    ResponseStream(String),
    #[error("Payload encoding failed: {0}")]
    PayloadEncoding(String),
}

impl NetError {
    /// Transport failure without an attached error value.
    pub fn generic_transport() -> Self {
        NetError::Transport(GENERIC_RESPONSE_ERROR.to_string())
    }

    /// Response stream failure, synthesizing the generic message when the
    /// stream reported none.
    pub fn response_stream(message: Option<String>) -> Self {
        match message {
            Some(m) if !m.is_empty() => NetError::ResponseStream(m),
            _ => NetError::ResponseStream(GENERIC_RESPONSE_ERROR.to_string()),
        }
    }

    /// True for failures raised by the socket/TLS layer.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            NetError::ConnectionClosed
                | NetError::ConnectionReset
                | NetError::ConnectionRefused
                | NetError::ConnectionFailed
                | NetError::ConnectionFailedTo { .. }
                | NetError::NameNotResolved
                | NetError::NameNotResolvedFor { .. }
                | NetError::ConnectionTimedOut
                | NetError::Aborted
                | NetError::SslProtocolError
                | NetError::BadSslClientAuthCert
                | NetError::Transport(_)
        )
    }

    pub fn as_i32(&self) -> i32 {
        match self {
            NetError::ConnectionClosed => -100,
            NetError::ConnectionReset => -101,
            NetError::ConnectionRefused => -102,
            NetError::Aborted => -103,
            NetError::ConnectionFailed => -104,
            NetError::ConnectionFailedTo { .. } => -104,
            NetError::NameNotResolved => -105,
            NetError::NameNotResolvedFor { .. } => -105,
            NetError::SslProtocolError => -107,
            NetError::BadSslClientAuthCert => -117,
            NetError::ConnectionTimedOut => -118,
            NetError::Transport(_) => -199,

            NetError::InvalidUrl(_) => -300,
            NetError::InvalidResponse => -320,
            NetError::InvalidHeader => -321,
            NetError::InvalidMethod(_) => -322,
            NetError::ResponseStream(_) => -355,
            NetError::PayloadEncoding(_) => -356,
        }
    }
}

impl From<std::io::Error> for NetError {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match e.kind() {
            ErrorKind::ConnectionRefused => NetError::ConnectionRefused,
            ErrorKind::ConnectionReset => NetError::ConnectionReset,
            ErrorKind::ConnectionAborted => NetError::Aborted,
            ErrorKind::TimedOut => NetError::ConnectionTimedOut,
            ErrorKind::UnexpectedEof | ErrorKind::BrokenPipe => NetError::ConnectionClosed,
            _ => NetError::Transport(e.to_string()),
        }
    }
}

impl From<url::ParseError> for NetError {
    fn from(e: url::ParseError) -> Self {
        NetError::InvalidUrl(e.to_string())
    }
}
