//! Raw request options.
//!
//! Loosely typed on purpose: this is what a caller (or a JSON/TOML document)
//! hands over before normalization. [`RequestSpec`](super::spec::RequestSpec)
//! turns it into something a transport can execute.

use crate::base::neterror::NetError;
use crate::http::caselessheaders::CaselessHeaderMap;
use crate::http::querystring::QueryStringOptions;
use crate::tls::agent::{deserialize_secret, Agent, AgentOptions, TlsTuning};
use crate::urlrequest::auth::Auth;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;
use zeroize::Zeroizing;

/// A `uri`/`url` option: either an already parsed URL or raw text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlArg {
    Url(Url),
    Raw(String),
}

impl From<Url> for UrlArg {
    fn from(u: Url) -> Self {
        UrlArg::Url(u)
    }
}

impl From<&str> for UrlArg {
    fn from(s: &str) -> Self {
        UrlArg::Raw(s.to_string())
    }
}

impl From<String> for UrlArg {
    fn from(s: String) -> Self {
        UrlArg::Raw(s)
    }
}

impl<'de> Deserialize<'de> for UrlArg {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        String::deserialize(d).map(UrlArg::Raw)
    }
}

/// Single-sign-on tokens turned into a `Cookie` header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SingleSignOn {
    pub sso_token: Option<String>,
    pub xsrf_token: Option<String>,
}

/// Accept `"8080"` as well as `8080`.
fn deserialize_port<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Accept milliseconds.
fn deserialize_millis<'de, D>(d: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
}

/// Everything a caller may say about one request.
#[derive(Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RequestOptions {
    pub method: Option<String>,
    pub uri: Option<UrlArg>,
    pub url: Option<UrlArg>,
    pub host: Option<String>,
    pub hostname: Option<String>,
    pub path: Option<String>,
    #[serde(deserialize_with = "deserialize_port")]
    pub port: Option<String>,
    pub protocol: Option<String>,

    pub headers: CaselessHeaderMap,
    /// Text is sent as-is, anything else is JSON or form encoded.
    pub body: Option<Value>,
    pub auth: Option<Auth>,
    pub sso: Option<SingleSignOn>,

    pub qs: Option<Map<String, Value>>,
    pub qs_parse_options: QueryStringOptions,
    pub qs_stringify_options: QueryStringOptions,
    pub use_querystring: Option<bool>,

    pub ca: Option<String>,
    pub cert: Option<String>,
    pub key: Option<String>,
    #[serde(deserialize_with = "deserialize_secret")]
    pub passphrase: Option<Zeroizing<String>>,
    pub pfx: Option<Vec<u8>>,
    pub agent_options: Option<AgentOptions>,
    #[serde(skip)]
    pub agent: Option<Agent>,
    pub client_auth: Option<bool>,

    pub reject_unauthorized: Option<bool>,
    pub resolve_with_full_response: Option<bool>,
    pub simple: Option<bool>,
    #[serde(rename = "strictSSL")]
    pub strict_ssl: Option<bool>,

    #[serde(deserialize_with = "deserialize_millis")]
    pub timeout: Option<Duration>,
    #[serde(skip)]
    pub abort: Option<CancellationToken>,

    #[serde(flatten)]
    pub tls: TlsTuning,

    pub use_ntlm: Option<bool>,
    pub ntlm_domain: Option<String>,
    pub workstation: Option<String>,
    pub json: Option<bool>,

    pub family: Option<u8>,
    pub local_address: Option<String>,
    pub max_header_size: Option<usize>,
    pub set_host: Option<bool>,
    pub socket_path: Option<String>,
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("url", &self.url)
            .field("host", &self.host)
            .field("path", &self.path)
            .field("headers", &self.headers.len())
            .field("body", &self.body.is_some())
            .field("use_querystring", &self.use_querystring)
            .field("client_auth", &self.client_auth)
            .finish_non_exhaustive()
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for a plain request to `url`.
    pub fn get(url: impl Into<UrlArg>) -> Self {
        Self::default().with_url(url)
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    pub fn with_uri(mut self, uri: impl Into<UrlArg>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<UrlArg>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Address by parts, composed as `protocol://host{path}`.
    pub fn with_host_parts(
        mut self,
        protocol: &str,
        host: &str,
        hostname: &str,
        port: &str,
        path: &str,
    ) -> Self {
        self.protocol = Some(protocol.to_string());
        self.host = Some(host.to_string());
        self.hostname = Some(hostname.to_string());
        self.port = Some(port.to_string());
        self.path = Some(path.to_string());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.set(key, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Value>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Body from any serializable value.
    pub fn with_json<T: Serialize>(mut self, body: &T) -> Result<Self, NetError> {
        let value =
            serde_json::to_value(body).map_err(|e| NetError::PayloadEncoding(e.to_string()))?;
        self.body = Some(value);
        Ok(self)
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_sso(mut self, sso_token: Option<&str>, xsrf_token: Option<&str>) -> Self {
        self.sso = Some(SingleSignOn {
            sso_token: sso_token.map(str::to_string),
            xsrf_token: xsrf_token.map(str::to_string),
        });
        self
    }

    /// Merge `qs` into the path. See [`RequestSpec::path`](super::spec::RequestSpec::path).
    pub fn with_query(mut self, qs: Map<String, Value>) -> Self {
        self.qs = Some(qs);
        self.use_querystring = Some(true);
        self
    }

    pub fn with_qs_stringify_options(mut self, options: QueryStringOptions) -> Self {
        self.qs_stringify_options = options;
        self
    }

    pub fn with_agent(mut self, agent: Agent) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn with_agent_options(mut self, options: AgentOptions) -> Self {
        self.agent_options = Some(options);
        self
    }

    pub fn with_client_auth(mut self, enabled: bool) -> Self {
        self.client_auth = Some(enabled);
        self
    }

    pub fn with_ca(mut self, pem: impl Into<String>) -> Self {
        self.ca = Some(pem.into());
        self
    }

    pub fn with_cert(mut self, pem: impl Into<String>) -> Self {
        self.cert = Some(pem.into());
        self
    }

    pub fn with_key(mut self, pem: impl Into<String>) -> Self {
        self.key = Some(pem.into());
        self
    }

    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(Zeroizing::new(passphrase.into()));
        self
    }

    pub fn with_pfx(mut self, der: impl Into<Vec<u8>>) -> Self {
        self.pfx = Some(der.into());
        self
    }

    pub fn with_reject_unauthorized(mut self, reject: bool) -> Self {
        self.reject_unauthorized = Some(reject);
        self
    }

    pub fn with_resolve_with_full_response(mut self, full: bool) -> Self {
        self.resolve_with_full_response = Some(full);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_abort(mut self, token: CancellationToken) -> Self {
        self.abort = Some(token);
        self
    }

    pub fn with_tls(mut self, tls: TlsTuning) -> Self {
        self.tls = tls;
        self
    }

    pub fn with_max_header_size(mut self, size: usize) -> Self {
        self.max_header_size = Some(size);
        self
    }

    pub fn with_set_host(mut self, set_host: bool) -> Self {
        self.set_host = Some(set_host);
        self
    }
}
