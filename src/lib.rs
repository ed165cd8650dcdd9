//! # netrequest
//!
//! An outbound HTTP(S) client built around a declarative request description.
//!
//! A [`RequestOptions`] value is normalized into a [`RequestSpec`], sent over a
//! [`SocketTransport`](crate::http::SocketTransport) (hyper over tokio and BoringSSL by
//! default), redirects are followed with a per-chain loop guard, and the
//! streamed response is buffered into a [`ResponseEnvelope`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use netrequest::{request, RequestOptions};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), netrequest::NetError> {
//!     let opts = RequestOptions::get("https://api.example.com/items")
//!         .with_method("POST")
//!         .with_body(json!({"name": "widget"}));
//!     let response = request(&opts).await?;
//!     println!("{} {}", response.status(), response.body().as_json().is_some());
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error taxonomy and load states
//! - [`http`] - Header map, bodies, response assembly and the transport contract
//! - [`socket`] - DNS/TCP/TLS connect and the hyper transport
//! - [`tls`] - Credential file discovery and client TLS agents
//! - [`urlrequest`] - Options, normalization and redirect following

pub mod base;
pub mod client;
pub mod http;
pub mod socket;
pub mod tls;
pub mod urlrequest;

pub use base::neterror::NetError;
pub use client::{request, Client, ClientBuilder};
pub use crate::http::{CaselessHeaderMap, ResponseEnvelope};
pub use urlrequest::{Auth, RequestOptions, RequestSpec, Transport};
