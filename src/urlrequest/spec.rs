//! Request normalization.
//!
//! [`RequestSpec`] is built from [`RequestOptions`] by a fixed sequence of
//! steps, each consuming and returning a draft: URL, handling flags, query
//! string, agent, headers, auth, single sign-on, payload, NTLM, then the
//! remaining passthrough fields. The URL is validated once, when the draft
//! is finalized.

use crate::base::neterror::NetError;
use crate::http::caselessheaders::CaselessHeaderMap;
use crate::http::querystring::query_value;
use crate::http::requestbody::RequestBody;
use crate::tls::agent::{Agent, SecureAgent, TlsMaterial, TlsTuning};
use crate::tls::credentials::CredentialFiles;
use crate::urlrequest::options::{RequestOptions, UrlArg};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

const SECURE_PROTOCOLS: [&str; 3] = ["https:", "sftp:", "ssh:"];
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// NTLM fields, carried only when `useNtlm` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NtlmOptions {
    pub json: bool,
    pub ntlm_domain: Option<String>,
    pub workstation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Handling {
    resolve_with_full_response: bool,
    simple: bool,
    strict_ssl: bool,
    use_querystring: bool,
    reject_unauthorized: bool,
}

impl Default for Handling {
    fn default() -> Self {
        Self {
            resolve_with_full_response: true,
            simple: false,
            strict_ssl: false,
            use_querystring: false,
            reject_unauthorized: false,
        }
    }
}

/// A fully resolved, transport-ready request.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    method: String,
    url: Url,
    hostname: String,
    port: u16,
    protocol: String,
    path: String,
    headers: CaselessHeaderMap,
    body: RequestBody,
    agent: Option<Agent>,
    material: TlsMaterial,
    tls: TlsTuning,
    handling: Handling,
    timeout: Option<Duration>,
    abort: Option<CancellationToken>,
    ntlm: Option<NtlmOptions>,
    family: Option<u8>,
    local_address: Option<String>,
    max_header_size: Option<usize>,
    set_host: bool,
    socket_path: Option<String>,
}

fn parse_url(raw: &str) -> Result<Url, NetError> {
    Url::parse(raw).map_err(|e| NetError::InvalidUrl(format!("{} ({})", raw, e)))
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|v| !v.is_empty())
}

fn resolve_url(opts: &RequestOptions) -> Result<Url, NetError> {
    match (&opts.uri, &opts.url) {
        (Some(UrlArg::Url(u)), _) => return Ok(u.clone()),
        (_, Some(UrlArg::Url(u))) => return Ok(u.clone()),
        (Some(UrlArg::Raw(s)), _) => return parse_url(s),
        (_, Some(UrlArg::Raw(s))) => return parse_url(s),
        (None, None) => {}
    }

    let host = non_empty(&opts.host);
    let hostname = non_empty(&opts.hostname);
    let path = opts.path.as_deref().unwrap_or("/");
    let port = opts.port.as_deref().unwrap_or("80");
    let protocol = opts.protocol.as_deref().unwrap_or("https:");

    match (host, hostname) {
        (Some(host), Some(_)) if !path.is_empty() && !port.is_empty() && !protocol.is_empty() => {
            parse_url(&format!(
                "{}://{}{}",
                protocol.trim_end_matches(':'),
                host,
                path
            ))
        }
        _ => Err(NetError::InvalidUrl("Invalid URL".to_string())),
    }
}

/// Falsy payloads are not sent.
fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

fn default_path(url: &Url) -> String {
    match url.query() {
        Some(q) => format!("{}?{}", url.path(), q),
        None => url.path().to_string(),
    }
}

struct Endpoint {
    hostname: String,
    port: u16,
    protocol: String,
}

fn endpoint(url: &Url) -> Result<Endpoint, NetError> {
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| NetError::InvalidUrl(format!("{} has no host", url)))?;
    let protocol = format!("{}:", url.scheme());
    let secure = SECURE_PROTOCOLS.contains(&protocol.as_str());
    Ok(Endpoint {
        hostname: host.trim_start_matches('[').trim_end_matches(']').to_string(),
        port: url
            .port_or_known_default()
            .unwrap_or(if secure { 443 } else { 80 }),
        protocol,
    })
}

fn normalize_method(method: Option<&str>) -> Result<String, NetError> {
    let method = match method.map(str::trim).filter(|m| !m.is_empty()) {
        Some(m) => m.to_ascii_uppercase(),
        None => return Ok("GET".to_string()),
    };
    http::Method::from_bytes(method.as_bytes())
        .map(|m| m.as_str().to_string())
        .map_err(|_| NetError::InvalidMethod(method))
}

/// Append `qs` to the search parameters, then render them after the
/// pathname as an extra path segment.
fn merge_query(url: &mut Url, opts: &RequestOptions) -> String {
    if let Some(qs) = opts.qs.as_ref().filter(|qs| !qs.is_empty()) {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in qs {
            pairs.append_pair(key, &query_value(value));
        }
    }

    // Later duplicates replace earlier values in place.
    let mut merged: Vec<(String, String)> = Vec::new();
    for (key, value) in url.query_pairs() {
        match merged.iter_mut().find(|(k, _)| k.as_str() == key.as_ref()) {
            Some(slot) => slot.1 = value.into_owned(),
            None => merged.push((key.into_owned(), value.into_owned())),
        }
    }

    let rendered = opts
        .qs_stringify_options
        .stringify_pairs(merged.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    format!("{}/{}", url.path(), rendered)
}

/// Intermediate state threaded through the normalization steps.
struct Draft<'a> {
    opts: &'a RequestOptions,
    credentials: &'a CredentialFiles,
    url: Result<Url, NetError>,
    path: Option<String>,
    handling: Handling,
    agent: Option<Agent>,
    material: TlsMaterial,
    headers: CaselessHeaderMap,
    body: RequestBody,
    ntlm: Option<NtlmOptions>,
}

impl<'a> Draft<'a> {
    fn new(opts: &'a RequestOptions, credentials: &'a CredentialFiles) -> Self {
        Self {
            opts,
            credentials,
            url: Err(NetError::InvalidUrl("Invalid URL".to_string())),
            path: None,
            handling: Handling::default(),
            agent: None,
            material: TlsMaterial::default(),
            headers: CaselessHeaderMap::new(),
            body: RequestBody::Empty,
            ntlm: None,
        }
    }

    fn url(self) -> Self {
        Self {
            url: resolve_url(self.opts),
            ..self
        }
    }

    fn handling(self) -> Self {
        let opts = self.opts;
        let resolve_with_full_response = opts.resolve_with_full_response.unwrap_or(true);
        let handling = Handling {
            resolve_with_full_response,
            simple: opts.simple.unwrap_or(false),
            strict_ssl: opts.strict_ssl.unwrap_or(false),
            use_querystring: opts.use_querystring.unwrap_or(false),
            reject_unauthorized: opts
                .reject_unauthorized
                .unwrap_or(!resolve_with_full_response),
        };
        Self { handling, ..self }
    }

    /// Merge `qs` into the search parameters, then place the rendered query
    /// after the pathname as an extra path segment.
    fn querystring(mut self) -> Self {
        let opts = self.opts;
        if !self.handling.use_querystring {
            return self;
        }
        if let Ok(url) = self.url.as_mut() {
            self.path = Some(merge_query(url, opts));
        }
        self
    }

    /// Top-level options win over `agentOptions`, which win over
    /// discovered files. Files are only read when both are absent.
    fn assemble_material(&self) -> TlsMaterial {
        let opts = self.opts;
        let nested = opts.agent_options.as_ref();
        let files = self.credentials;
        TlsMaterial {
            ca: opts
                .ca
                .clone()
                .or_else(|| nested.and_then(|a| a.ca.clone()))
                .or_else(|| files.ca()),
            cert: opts
                .cert
                .clone()
                .or_else(|| nested.and_then(|a| a.cert.clone()))
                .or_else(|| files.cert()),
            key: opts
                .key
                .clone()
                .or_else(|| nested.and_then(|a| a.key.clone()))
                .or_else(|| files.key()),
            passphrase: opts
                .passphrase
                .clone()
                .or_else(|| nested.and_then(|a| a.passphrase.clone()))
                .or_else(|| files.passphrase()),
            pfx: opts
                .pfx
                .clone()
                .or_else(|| nested.and_then(|a| a.pfx.clone()))
                .or_else(|| files.pfx()),
        }
    }

    fn agent(mut self) -> Self {
        self.agent = self.opts.agent.clone();
        if self.opts.client_auth == Some(false) {
            return self;
        }

        let material = self.assemble_material();
        let plain = matches!(self.opts.agent, Some(Agent::Plain(_)));
        if !plain && material.is_sufficient() {
            tracing::debug!(
                pfx = material.has_pfx(),
                "building secure agent from client TLS material"
            );
            self.agent = Some(Agent::Secure(SecureAgent::new(material.clone())));
        }
        self.material = material.into_effective();
        self
    }

    fn headers(mut self) -> Self {
        self.headers = self.opts.headers.clone();
        self.headers.set_if_absent("Connection", "close");
        self
    }

    fn auth(mut self) -> Self {
        if let Some(header) = self.opts.auth.as_ref().and_then(|a| a.header()) {
            if header.overwrite {
                self.headers.set("Authorization", header.value);
            } else {
                self.headers.set_if_absent("Authorization", header.value);
            }
        }
        self
    }

    fn single_sign_on(mut self) -> Self {
        let opts = self.opts;
        let Some(sso) = &opts.sso else {
            return self;
        };
        let sso_token = non_empty(&sso.sso_token);
        let xsrf_token = non_empty(&sso.xsrf_token);
        if sso_token.is_none() && xsrf_token.is_none() {
            return self;
        }

        let existing = self.headers.get("Cookie").map(str::to_string);
        let cookie = [
            sso_token.map(|t| format!("iPlanetDirectoryPro={}", t)),
            xsrf_token.map(|t| format!("XSRF-TOKEN={}", t)),
            existing,
        ]
        .into_iter()
        .flatten()
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("; ");

        self.headers.set("Cookie", cookie);
        self
    }

    fn payload(mut self) -> Self {
        let opts = self.opts;
        let Some(raw) = opts.body.as_ref().filter(|b| !is_empty_payload(b)) else {
            return self;
        };

        let encoded = match raw {
            Value::String(text) => {
                self.headers.set_if_absent("Content-Type", "text/plain");
                text.clone()
            }
            Value::Object(object) if self.is_form() => {
                opts.qs_stringify_options.stringify_object(object)
            }
            other => {
                self.headers.set_if_absent("Content-Type", "application/json");
                other.to_string()
            }
        };

        self.headers.set("Content-Length", encoded.len().to_string());
        self.body = RequestBody::from(encoded);
        self
    }

    fn is_form(&self) -> bool {
        self.headers
            .get("Content-Type")
            .and_then(|ct| ct.split(';').next())
            .is_some_and(|media| media.trim().eq_ignore_ascii_case(FORM_URLENCODED))
    }

    fn ntlm(mut self) -> Self {
        if self.opts.use_ntlm == Some(true) {
            self.ntlm = Some(NtlmOptions {
                json: self.opts.json.unwrap_or(false),
                ntlm_domain: self.opts.ntlm_domain.clone(),
                workstation: self.opts.workstation.clone(),
            });
        }
        self
    }

    fn build(self) -> Result<RequestSpec, NetError> {
        let url = self.url?;
        let opts = self.opts;
        let method = normalize_method(opts.method.as_deref())?;
        let Endpoint {
            hostname,
            port,
            protocol,
        } = endpoint(&url)?;
        let path = self.path.unwrap_or_else(|| default_path(&url));

        Ok(RequestSpec {
            method,
            url,
            hostname,
            port,
            protocol,
            path,
            headers: self.headers,
            body: self.body,
            agent: self.agent,
            material: self.material,
            tls: opts.tls.clone(),
            handling: self.handling,
            timeout: opts.timeout,
            abort: opts.abort.clone(),
            ntlm: self.ntlm,
            family: opts.family,
            local_address: opts.local_address.clone(),
            max_header_size: opts.max_header_size,
            set_host: opts.set_host.unwrap_or(true),
            socket_path: opts.socket_path.clone(),
        })
    }
}

impl RequestSpec {
    /// Normalize `opts`, discovering TLS files from the process environment.
    pub fn new(opts: &RequestOptions) -> Result<Self, NetError> {
        Self::with_credentials(opts, &CredentialFiles::from_env())
    }

    pub fn with_credentials(
        opts: &RequestOptions,
        credentials: &CredentialFiles,
    ) -> Result<Self, NetError> {
        Draft::new(opts, credentials)
            .url()
            .handling()
            .querystring()
            .agent()
            .headers()
            .auth()
            .single_sign_on()
            .payload()
            .ntlm()
            .build()
    }

    /// Same request aimed at `url`. Headers, body and TLS material carry
    /// over; the query-string merge is not applied again.
    pub fn redirect_to(&self, url: Url) -> Result<Self, NetError> {
        let Endpoint {
            hostname,
            port,
            protocol,
        } = endpoint(&url)?;
        Ok(Self {
            path: default_path(&url),
            hostname,
            port,
            protocol,
            url,
            ..self.clone()
        })
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Host as sent in the `Host` header: bracketed IPv6, explicit port kept.
    pub fn host(&self) -> String {
        let host = self.url.host_str().unwrap_or(&self.hostname);
        match self.url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Scheme with its trailing colon, e.g. `https:`.
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Request target. Normally pathname plus search; with the query-string
    /// merge enabled it is `{pathname}/{rendered query}`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &CaselessHeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    pub fn has_payload(&self) -> bool {
        !self.body.is_empty()
    }

    pub fn agent(&self) -> Option<&Agent> {
        self.agent.as_ref()
    }

    /// TLS material resolved for this request, whether or not an agent was built from it.
    pub fn material(&self) -> &TlsMaterial {
        &self.material
    }

    pub fn tls(&self) -> &TlsTuning {
        &self.tls
    }

    pub fn is_secure(&self) -> bool {
        SECURE_PROTOCOLS.contains(&self.protocol.as_str())
    }

    pub fn reject_unauthorized(&self) -> bool {
        self.handling.reject_unauthorized
    }

    pub fn resolve_with_full_response(&self) -> bool {
        self.handling.resolve_with_full_response
    }

    pub fn simple(&self) -> bool {
        self.handling.simple
    }

    pub fn strict_ssl(&self) -> bool {
        self.handling.strict_ssl
    }

    pub fn use_querystring(&self) -> bool {
        self.handling.use_querystring
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn abort(&self) -> Option<&CancellationToken> {
        self.abort.as_ref()
    }

    pub fn ntlm(&self) -> Option<&NtlmOptions> {
        self.ntlm.as_ref()
    }

    pub fn family(&self) -> Option<u8> {
        self.family
    }

    pub fn local_address(&self) -> Option<&str> {
        self.local_address.as_deref()
    }

    pub fn max_header_size(&self) -> Option<usize> {
        self.max_header_size
    }

    pub fn set_host(&self) -> bool {
        self.set_host
    }

    pub fn socket_path(&self) -> Option<&str> {
        self.socket_path.as_deref()
    }
}

impl Serialize for RequestSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let m = &self.material;
        let mut s = serializer.serialize_struct("RequestSpec", 18)?;
        s.serialize_field("method", &self.method)?;
        s.serialize_field("url", self.url.as_str())?;
        s.serialize_field("path", &self.path)?;
        s.serialize_field("headers", &self.headers)?;
        s.serialize_field("body", &self.body)?;
        s.serialize_field("ca", &m.has_ca())?;
        s.serialize_field("cert", &m.has_cert())?;
        s.serialize_field("key", &m.has_key())?;
        s.serialize_field("passphrase", &m.has_passphrase())?;
        s.serialize_field("pfx", &m.has_pfx())?;
        s.serialize_field("rejectUnauthorized", &self.handling.reject_unauthorized)?;
        s.serialize_field(
            "resolveWithFullResponse",
            &self.handling.resolve_with_full_response,
        )?;
        s.serialize_field("simple", &self.handling.simple)?;
        s.serialize_field("strictSSL", &self.handling.strict_ssl)?;
        s.serialize_field("useQuerystring", &self.handling.use_querystring)?;
        s.serialize_field("useNtlm", &self.ntlm.is_some())?;
        s.serialize_field("timeout", &self.timeout.map(|t| t.as_millis() as u64))?;
        s.end()
    }
}

impl fmt::Display for RequestSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = serde_json::to_string_pretty(self).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::agent::{connection_material, AgentOptions, PlainAgent};
    use crate::urlrequest::auth::Auth;
    use serde_json::json;

    fn spec(opts: &RequestOptions) -> RequestSpec {
        RequestSpec::with_credentials(opts, &CredentialFiles::none()).unwrap()
    }

    fn material_opts() -> RequestOptions {
        RequestOptions::get("https://secure.test/")
            .with_ca("CA")
            .with_cert("CERT")
            .with_key("KEY")
            .with_passphrase("pw")
    }

    #[test]
    fn test_url_precedence() {
        let parsed = Url::parse("https://typed-uri.test/").unwrap();
        let opts = RequestOptions::new()
            .with_url("https://raw-url.test/")
            .with_uri(UrlArg::Url(parsed));
        assert_eq!(spec(&opts).hostname(), "typed-uri.test");

        let opts = RequestOptions::new()
            .with_uri("https://raw-uri.test/")
            .with_url(Url::parse("https://typed-url.test/").unwrap());
        assert_eq!(spec(&opts).hostname(), "typed-url.test");

        let opts = RequestOptions::new()
            .with_uri("https://raw-uri.test/")
            .with_url("https://raw-url.test/");
        assert_eq!(spec(&opts).hostname(), "raw-uri.test");
    }

    #[test]
    fn test_url_from_parts() {
        let opts = RequestOptions::new().with_host_parts(
            "http:",
            "parts.test:8080",
            "parts.test",
            "8080",
            "/a?b=1",
        );
        let s = spec(&opts);
        assert_eq!(s.url().as_str(), "http://parts.test:8080/a?b=1");
        assert_eq!(s.port(), 8080);
        assert_eq!(s.protocol(), "http:");
        assert_eq!(s.path(), "/a?b=1");
        assert_eq!(s.host(), "parts.test:8080");
    }

    #[test]
    fn test_parts_default_to_https() {
        let mut opts = RequestOptions::new();
        opts.host = Some("h.test".into());
        opts.hostname = Some("h.test".into());
        let s = spec(&opts);
        assert_eq!(s.url().as_str(), "https://h.test/");
        assert!(s.is_secure());
        assert_eq!(s.port(), 443);
    }

    #[test]
    fn test_no_url_is_invalid() {
        let err = RequestSpec::with_credentials(&RequestOptions::new(), &CredentialFiles::none())
            .unwrap_err();
        assert!(matches!(err, NetError::InvalidUrl(_)));

        let mut opts = RequestOptions::new();
        opts.host = Some("only-host.test".into());
        assert!(matches!(
            RequestSpec::with_credentials(&opts, &CredentialFiles::none()),
            Err(NetError::InvalidUrl(_))
        ));

        let opts = RequestOptions::get("not a url");
        assert!(matches!(
            RequestSpec::with_credentials(&opts, &CredentialFiles::none()),
            Err(NetError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_handling_defaults() {
        let s = spec(&RequestOptions::get("http://a.test/"));
        assert!(s.resolve_with_full_response());
        assert!(!s.simple());
        assert!(!s.strict_ssl());
        assert!(!s.use_querystring());
        assert!(!s.reject_unauthorized());

        let s = spec(&RequestOptions::get("http://a.test/").with_resolve_with_full_response(false));
        assert!(s.reject_unauthorized());

        let s = spec(
            &RequestOptions::get("http://a.test/")
                .with_resolve_with_full_response(false)
                .with_reject_unauthorized(false),
        );
        assert!(!s.reject_unauthorized());
    }

    #[test]
    fn test_method_normalized() {
        assert_eq!(spec(&RequestOptions::get("http://a.test/")).method(), "GET");
        let s = spec(&RequestOptions::get("http://a.test/").with_method("patch"));
        assert_eq!(s.method(), "PATCH");
        let err = RequestSpec::with_credentials(
            &RequestOptions::get("http://a.test/").with_method("BAD METHOD"),
            &CredentialFiles::none(),
        )
        .unwrap_err();
        assert!(matches!(err, NetError::InvalidMethod(_)));
    }

    #[test]
    fn test_connection_close_default() {
        let s = spec(&RequestOptions::get("http://a.test/"));
        assert_eq!(s.headers().get("connection"), Some("close"));

        let s = spec(&RequestOptions::get("http://a.test/").with_header("CONNECTION", "keep-alive"));
        assert_eq!(s.headers().get("Connection"), Some("keep-alive"));
        assert_eq!(s.headers().len(), 1);
    }

    #[test]
    fn test_string_auth_overwrites() {
        let s = spec(
            &RequestOptions::get("http://a.test/")
                .with_header("authorization", "Basic old")
                .with_auth(Auth::Raw("u:p".into())),
        );
        assert_eq!(s.headers().get("Authorization"), Some("Basic dTpw"));
    }

    #[test]
    fn test_object_auth_keeps_existing() {
        let s = spec(
            &RequestOptions::get("http://a.test/")
                .with_header("Authorization", "Custom 1")
                .with_auth(Auth::bearer("T")),
        );
        assert_eq!(s.headers().get("authorization"), Some("Custom 1"));
    }

    #[test]
    fn test_sso_cookie_order() {
        let s = spec(
            &RequestOptions::get("http://a.test/")
                .with_header("cookie", "a=b")
                .with_sso(Some("S"), Some("X")),
        );
        assert_eq!(
            s.headers().get("Cookie"),
            Some("iPlanetDirectoryPro=S; XSRF-TOKEN=X; a=b")
        );

        let s = spec(&RequestOptions::get("http://a.test/").with_sso(None, Some("X")));
        assert_eq!(s.headers().get("Cookie"), Some("XSRF-TOKEN=X"));

        let s = spec(&RequestOptions::get("http://a.test/").with_sso(Some(""), None));
        assert!(!s.headers().has("Cookie"));
    }

    #[test]
    fn test_string_payload() {
        let s = spec(&RequestOptions::get("http://a.test/").with_body("héllo"));
        assert_eq!(s.headers().get("content-type"), Some("text/plain"));
        assert_eq!(s.headers().get("content-length"), Some("6"));
        assert_eq!(s.body().len(), 6);
    }

    #[test]
    fn test_json_payload() {
        let s = spec(&RequestOptions::get("http://a.test/").with_body(json!({"a": 1})));
        assert_eq!(s.headers().get("Content-Type"), Some("application/json"));
        assert_eq!(s.headers().get("Content-Length"), Some("7"));
        assert_eq!(s.body().as_bytes().unwrap().as_ref(), b"{\"a\":1}");
    }

    #[test]
    fn test_content_length_always_recomputed() {
        let s = spec(
            &RequestOptions::get("http://a.test/")
                .with_header("Content-Length", "999")
                .with_header("Content-Type", "application/vnd.api+json")
                .with_body(json!([1, 2])),
        );
        assert_eq!(s.headers().get("content-length"), Some("5"));
        assert_eq!(s.headers().get("content-type"), Some("application/vnd.api+json"));
    }

    #[test]
    fn test_form_payload() {
        let s = spec(
            &RequestOptions::get("http://a.test/")
                .with_header("Content-Type", "application/x-www-form-urlencoded")
                .with_body(json!({"a": "x y", "b": [1, 2]})),
        );
        assert_eq!(s.body().as_bytes().unwrap().as_ref(), b"a=x%20y&b=1&b=2");
        assert_eq!(s.headers().get("content-length"), Some("15"));
    }

    #[test]
    fn test_form_payload_keeps_content_type_parameters() {
        let s = spec(
            &RequestOptions::get("http://a.test/")
                .with_header("content-type", "application/x-www-form-urlencoded; charset=utf-8")
                .with_body(json!({"n": "v"})),
        );
        assert_eq!(s.body().as_bytes().unwrap().as_ref(), b"n=v");
        assert_eq!(
            s.headers().get("Content-Type"),
            Some("application/x-www-form-urlencoded; charset=utf-8")
        );
    }

    #[test]
    fn test_empty_payloads_are_dropped() {
        for body in [json!(""), json!({}), json!([]), json!(null), json!(false), json!(0)] {
            let s = spec(&RequestOptions::get("http://a.test/").with_body(body));
            assert!(!s.has_payload());
            assert!(!s.headers().has("content-type"));
            assert!(!s.headers().has("content-length"));
        }
    }

    #[test]
    fn test_querystring_path_placement() {
        let mut qs = serde_json::Map::new();
        qs.insert("page".into(), json!(2));
        qs.insert("filter".into(), json!({"k": "v"}));
        let s = spec(&RequestOptions::get("https://a.test/api?x=1").with_query(qs));
        assert_eq!(s.path(), "/api/x=1&page=2&filter=%7B%22k%22%3A%22v%22%7D");
        assert!(s.url().query().unwrap_or("").contains("page=2"));
    }

    #[test]
    fn test_querystring_custom_separators() {
        let mut qs = serde_json::Map::new();
        qs.insert("a".into(), json!("1"));
        qs.insert("b".into(), json!(true));
        let opts = RequestOptions::get("https://a.test/p")
            .with_query(qs)
            .with_qs_stringify_options(crate::http::querystring::QueryStringOptions {
                sep: ";".into(),
                eq: ":".into(),
                ..Default::default()
            });
        assert_eq!(spec(&opts).path(), "/p/a:1;b:true");
    }

    #[test]
    fn test_querystring_ignored_when_disabled() {
        let mut opts = RequestOptions::get("https://a.test/p?z=9");
        let mut qs = serde_json::Map::new();
        qs.insert("a".into(), json!(1));
        opts.qs = Some(qs);
        assert_eq!(spec(&opts).path(), "/p?z=9");
    }

    #[test]
    fn test_ca_only_material_is_used_without_agent() {
        let s = spec(&RequestOptions::get("https://private.test/").with_ca("PRIVATE CA"));
        assert!(s.agent().is_none());

        let m = connection_material(s.agent(), s.material()).unwrap();
        assert_eq!(m.ca.as_deref(), Some("PRIVATE CA"));
        assert!(!m.has_cert());
    }

    #[test]
    fn test_secure_agent_from_material() {
        let s = spec(&material_opts());
        assert!(matches!(s.agent(), Some(Agent::Secure(_))));
        assert!(s.material().has_cert());
    }

    #[test]
    fn test_insufficient_material_builds_no_agent() {
        let s = spec(&RequestOptions::get("https://a.test/").with_ca("CA").with_passphrase("pw"));
        assert!(s.agent().is_none());
    }

    #[test]
    fn test_plain_agent_is_kept() {
        let s = spec(&material_opts().with_agent(Agent::Plain(PlainAgent { keep_alive: true })));
        assert!(matches!(s.agent(), Some(Agent::Plain(_))));
    }

    #[test]
    fn test_client_auth_false_skips_material() {
        let s = spec(&material_opts().with_client_auth(false));
        assert!(s.agent().is_none());
        assert!(!s.material().has_ca());
    }

    #[test]
    fn test_top_level_beats_agent_options() {
        let opts = material_opts().with_agent_options(AgentOptions {
            ca: Some("NESTED".into()),
            ..Default::default()
        });
        assert_eq!(spec(&opts).material().ca.as_deref(), Some("CA"));

        let mut opts = material_opts().with_agent_options(AgentOptions {
            ca: Some("NESTED".into()),
            ..Default::default()
        });
        opts.ca = None;
        assert_eq!(spec(&opts).material().ca.as_deref(), Some("NESTED"));
    }

    #[test]
    fn test_credential_files_fill_gaps() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("ssl")).unwrap();
        std::fs::write(dir.path().join("ssl/local.pwd"), "from-file\n").unwrap();
        let files = CredentialFiles::from_lookup(|_| None, dir.path());

        let mut opts = material_opts();
        opts.passphrase = None;
        let s = RequestSpec::with_credentials(&opts, &files).unwrap();
        assert!(matches!(s.agent(), Some(Agent::Secure(_))));
        assert_eq!(
            s.material().passphrase.as_deref().map(|p| p.as_str()),
            Some("from-file")
        );
    }

    #[test]
    fn test_ntlm_only_when_enabled() {
        let mut opts = RequestOptions::get("http://a.test/");
        opts.ntlm_domain = Some("CORP".into());
        assert!(spec(&opts).ntlm().is_none());
        opts.use_ntlm = Some(true);
        let s = spec(&opts);
        assert_eq!(s.ntlm().unwrap().ntlm_domain.as_deref(), Some("CORP"));
        assert!(!s.ntlm().unwrap().json);
    }

    #[test]
    fn test_redirect_keeps_headers_and_body() {
        let s = spec(&material_opts().with_body("x").with_header("X-Id", "7"));
        let next = s
            .redirect_to(Url::parse("http://other.test:81/n?q=1").unwrap())
            .unwrap();
        assert_eq!(next.hostname(), "other.test");
        assert_eq!(next.port(), 81);
        assert_eq!(next.path(), "/n?q=1");
        assert!(!next.is_secure());
        assert_eq!(next.headers(), s.headers());
        assert_eq!(next.body(), s.body());
        assert!(matches!(next.agent(), Some(Agent::Secure(_))));
    }

    #[test]
    fn test_serialization_redacts_material() {
        let s = spec(&material_opts());
        let value = serde_json::to_value(&s).unwrap();
        assert_eq!(value["passphrase"], json!(true));
        assert_eq!(value["pfx"], json!(false));
        assert_eq!(value["url"], json!("https://secure.test/"));
        assert!(!s.to_string().contains("\"pw\""));
    }

    #[test]
    fn test_normalization_is_repeatable() {
        let opts = material_opts()
            .with_header("Accept", "*/*")
            .with_body(json!({"a": 1}))
            .with_auth(Auth::basic("u", "p"));
        let first = spec(&opts);
        let second = spec(&opts);
        assert_eq!(first.headers().to_pairs(), second.headers().to_pairs());
    }
}
