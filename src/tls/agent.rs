//! Connection agents and TLS material.
//!
//! A request either carries an explicit [`Agent`] or has one built for it
//! from [`TlsMaterial`]. Building the BoringSSL connector happens here so
//! the socket layer only has to hand it a stream.

use crate::base::neterror::NetError;
use boring::pkcs12::Pkcs12;
use boring::pkey::PKey;
use boring::ssl::{SslConnector, SslConnectorBuilder, SslMethod, SslVerifyMode, SslVersion};
use boring::x509::X509;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use zeroize::Zeroizing;

/// CA bundle, client identity and passphrase for mutual TLS.
#[derive(Clone, Default)]
pub struct TlsMaterial {
    /// PEM CA bundle added to the verify store.
    pub ca: Option<String>,
    /// PEM client certificate.
    pub cert: Option<String>,
    /// PEM private key, possibly encrypted with `passphrase`.
    pub key: Option<String>,
    /// Passphrase for the key or the PKCS#12 bundle (zeroized on drop).
    pub passphrase: Option<Zeroizing<String>>,
    /// DER PKCS#12 bundle. Takes the place of `cert` + `key` when present.
    pub pfx: Option<Vec<u8>>,
}

fn present(s: &Option<String>) -> bool {
    s.as_deref().is_some_and(|v| !v.is_empty())
}

impl TlsMaterial {
    pub fn has_ca(&self) -> bool {
        present(&self.ca)
    }

    pub fn has_cert(&self) -> bool {
        present(&self.cert)
    }

    pub fn has_key(&self) -> bool {
        present(&self.key)
    }

    pub fn has_pfx(&self) -> bool {
        self.pfx.as_ref().is_some_and(|p| !p.is_empty())
    }

    pub fn has_passphrase(&self) -> bool {
        self.passphrase.as_ref().is_some_and(|p| !p.is_empty())
    }

    /// Enough to build a client-authenticating agent: an identity
    /// (PKCS#12, or certificate plus key) together with a CA and passphrase.
    pub fn is_sufficient(&self) -> bool {
        (self.has_pfx() || (self.has_cert() && self.has_key()))
            && self.has_ca()
            && self.has_passphrase()
    }

    /// Drop the PEM identity when a PKCS#12 bundle supersedes it.
    pub fn into_effective(self) -> Self {
        if self.has_pfx() {
            Self {
                cert: None,
                key: None,
                ..self
            }
        } else {
            Self { pfx: None, ..self }
        }
    }

    /// Load CA and client identity into a connector builder.
    pub fn apply_to_builder(&self, builder: &mut SslConnectorBuilder) -> Result<(), NetError> {
        if let Some(ca) = self.ca.as_deref().filter(|s| !s.is_empty()) {
            let certs =
                X509::stack_from_pem(ca.as_bytes()).map_err(|_| NetError::SslProtocolError)?;
            if certs.is_empty() {
                return Err(NetError::SslProtocolError);
            }
            for cert in certs {
                builder
                    .cert_store_mut()
                    .add_cert(cert)
                    .map_err(|_| NetError::SslProtocolError)?;
            }
        }

        let pass = self.passphrase.as_ref().map(|p| p.as_str()).unwrap_or("");

        if let Some(pfx) = self.pfx.as_deref().filter(|p| !p.is_empty()) {
            let parsed = Pkcs12::from_der(pfx)
                .and_then(|bundle| bundle.parse(pass))
                .map_err(|_| NetError::BadSslClientAuthCert)?;
            builder
                .set_certificate(&parsed.cert)
                .map_err(|_| NetError::BadSslClientAuthCert)?;
            builder
                .set_private_key(&parsed.pkey)
                .map_err(|_| NetError::BadSslClientAuthCert)?;
            if let Some(chain) = parsed.chain {
                for cert in chain {
                    builder
                        .add_extra_chain_cert(cert)
                        .map_err(|_| NetError::BadSslClientAuthCert)?;
                }
            }
        } else if let (Some(cert), Some(key)) = (&self.cert, &self.key) {
            let cert = X509::from_pem(cert.as_bytes()).map_err(|_| NetError::BadSslClientAuthCert)?;
            let key = if pass.is_empty() {
                PKey::private_key_from_pem(key.as_bytes())
            } else {
                PKey::private_key_from_pem_passphrase(key.as_bytes(), pass.as_bytes())
            }
            .map_err(|_| NetError::BadSslClientAuthCert)?;
            builder
                .set_certificate(&cert)
                .map_err(|_| NetError::BadSslClientAuthCert)?;
            builder
                .set_private_key(&key)
                .map_err(|_| NetError::BadSslClientAuthCert)?;
            builder
                .check_private_key()
                .map_err(|_| NetError::BadSslClientAuthCert)?;
        }

        Ok(())
    }
}

impl fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("ca", &self.has_ca())
            .field("cert", &self.has_cert())
            .field("key", &self.has_key())
            .field("passphrase", &self.has_passphrase())
            .field("pfx", &self.has_pfx())
            .finish()
    }
}

/// TLS material nested under `agentOptions`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentOptions {
    pub ca: Option<String>,
    pub cert: Option<String>,
    pub key: Option<String>,
    #[serde(deserialize_with = "deserialize_secret")]
    pub passphrase: Option<Zeroizing<String>>,
    pub pfx: Option<Vec<u8>>,
    pub keep_alive: Option<bool>,
}

pub(crate) fn deserialize_secret<'de, D>(d: D) -> Result<Option<Zeroizing<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(d)?.map(Zeroizing::new))
}

/// Plain (non-secure) connection agent. Used exactly as supplied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlainAgent {
    pub keep_alive: bool,
}

/// Keep-alive capable agent holding client TLS material.
#[derive(Debug, Clone)]
pub struct SecureAgent {
    material: TlsMaterial,
    keep_alive: bool,
}

impl SecureAgent {
    pub fn new(material: TlsMaterial) -> Self {
        Self {
            material: material.into_effective(),
            keep_alive: true,
        }
    }

    pub fn material(&self) -> &TlsMaterial {
        &self.material
    }

    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }
}

/// Connection agent attached to a request.
#[derive(Debug, Clone)]
pub enum Agent {
    Plain(PlainAgent),
    Secure(SecureAgent),
}

impl Agent {
    pub fn is_plain(&self) -> bool {
        matches!(self, Agent::Plain(_))
    }
}

/// TLS knobs forwarded verbatim to the secure socket layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TlsTuning {
    /// OpenSSL cipher list string.
    pub ciphers: Option<String>,
    /// Lowest protocol, e.g. `TLSv1.2`.
    pub min_version: Option<String>,
    /// Highest protocol, e.g. `TLSv1.3`.
    pub max_version: Option<String>,
    pub sigalgs: Option<String>,
    pub ecdh_curve: Option<String>,
    /// SNI override.
    pub servername: Option<String>,
    /// Server-side preference flag; carried, not applied by a client.
    pub honor_cipher_order: Option<bool>,
}

fn parse_version(v: &str) -> Result<SslVersion, NetError> {
    match v {
        "TLSv1" => Ok(SslVersion::TLS1),
        "TLSv1.1" => Ok(SslVersion::TLS1_1),
        "TLSv1.2" => Ok(SslVersion::TLS1_2),
        "TLSv1.3" => Ok(SslVersion::TLS1_3),
        _ => Err(NetError::SslProtocolError),
    }
}

impl TlsTuning {
    pub fn apply_to_builder(&self, builder: &mut SslConnectorBuilder) -> Result<(), NetError> {
        if let Some(min) = &self.min_version {
            builder
                .set_min_proto_version(Some(parse_version(min)?))
                .map_err(|_| NetError::SslProtocolError)?;
        }
        if let Some(max) = &self.max_version {
            builder
                .set_max_proto_version(Some(parse_version(max)?))
                .map_err(|_| NetError::SslProtocolError)?;
        }
        if let Some(ciphers) = &self.ciphers {
            builder
                .set_cipher_list(ciphers)
                .map_err(|_| NetError::SslProtocolError)?;
        }
        if let Some(sigalgs) = &self.sigalgs {
            builder
                .set_sigalgs_list(sigalgs)
                .map_err(|_| NetError::SslProtocolError)?;
        }
        if let Some(curves) = &self.ecdh_curve {
            builder
                .set_curves_list(curves)
                .map_err(|_| NetError::SslProtocolError)?;
        }
        Ok(())
    }
}

/// Material the connector loads for a request: the secure agent's own,
/// none for a plain agent, otherwise whatever was resolved from options
/// and credential files (a lone CA, or an identity with no passphrase).
pub fn connection_material<'a>(
    agent: Option<&'a Agent>,
    resolved: &'a TlsMaterial,
) -> Option<&'a TlsMaterial> {
    match agent {
        Some(Agent::Secure(secure)) => Some(secure.material()),
        Some(Agent::Plain(_)) => None,
        None => Some(resolved),
    }
}

/// Build the connector for one secure round trip.
pub fn build_connector(
    material: Option<&TlsMaterial>,
    tuning: &TlsTuning,
    reject_unauthorized: bool,
) -> Result<SslConnector, NetError> {
    let mut builder =
        SslConnector::builder(SslMethod::tls()).map_err(|_| NetError::SslProtocolError)?;
    builder
        .set_alpn_protos(b"\x08http/1.1")
        .map_err(|_| NetError::SslProtocolError)?;

    if let Some(material) = material {
        tracing::debug!(
            ca = material.has_ca(),
            cert = material.has_cert(),
            pfx = material.has_pfx(),
            "loading client TLS material"
        );
        material.apply_to_builder(&mut builder)?;
    }
    tuning.apply_to_builder(&mut builder)?;

    builder.set_verify(if reject_unauthorized {
        SslVerifyMode::PEER
    } else {
        SslVerifyMode::NONE
    });

    Ok(builder.build())
}
