//! HTTP Client with builder pattern.
//!
//! # Example
//!
//! ```rust,ignore
//! use netrequest::{Client, RequestOptions};
//!
//! let client = Client::builder().build();
//! let resp = client
//!     .request(&RequestOptions::get("https://example.com").with_method("HEAD"))
//!     .await?;
//! println!("{}", resp.status());
//! ```

use crate::base::neterror::NetError;
use crate::http::response::ResponseEnvelope;
use crate::http::streamfactory::SocketTransport;
use crate::socket::client::HyperTransport;
use crate::tls::credentials::CredentialFiles;
use crate::urlrequest::job::Transport;
use crate::urlrequest::options::{RequestOptions, UrlArg};
use std::sync::Arc;

/// HTTP Client for making requests.
///
/// Use [`Client::builder()`] to configure and create a client.
#[derive(Clone)]
pub struct Client {
    socket: Arc<dyn SocketTransport>,
    credentials: CredentialFiles,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a new client with default settings.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Prepare a request chain without running it.
    pub fn transport(&self, opts: &RequestOptions) -> Result<Transport, NetError> {
        Transport::with_credentials(opts, &self.credentials, self.socket.clone())
    }

    /// Normalize, send and follow redirects; returns the settled response.
    pub async fn request(&self, opts: &RequestOptions) -> Result<ResponseEnvelope, NetError> {
        self.transport(opts)?.send().await
    }

    /// Send a GET request.
    pub async fn get(&self, url: impl Into<UrlArg>) -> Result<ResponseEnvelope, NetError> {
        self.request(&RequestOptions::get(url)).await
    }
}

/// Builder for creating a [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    socket: Option<Arc<dyn SocketTransport>>,
    credentials: Option<CredentialFiles>,
}

impl ClientBuilder {
    /// Use a custom socket layer instead of [`HyperTransport`].
    pub fn socket_transport(mut self, socket: Arc<dyn SocketTransport>) -> Self {
        self.socket = Some(socket);
        self
    }

    /// Where to look for TLS credential files.
    pub fn credentials(mut self, credentials: CredentialFiles) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Build the client.
    pub fn build(self) -> Client {
        Client {
            socket: self.socket.unwrap_or_else(|| Arc::new(HyperTransport::new())),
            credentials: self.credentials.unwrap_or_default(),
        }
    }
}

/// One-shot request with a default [`Client`].
pub async fn request(opts: &RequestOptions) -> Result<ResponseEnvelope, NetError> {
    Client::new().request(opts).await
}
