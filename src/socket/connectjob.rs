use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use crate::socket::client::SocketType;
use crate::tls::agent::{build_connector, connection_material};
use crate::urlrequest::spec::RequestSpec;
use std::net::{IpAddr, SocketAddr};
use tokio::net::{TcpSocket, TcpStream};

/// Manages the connection process: DNS -> TCP -> SSL.
/// Roughly equivalent to net::ConnectJob.
pub struct ConnectJob;

impl ConnectJob {
    pub async fn connect(spec: &RequestSpec) -> Result<SocketType, NetError> {
        let host = spec.hostname();
        let port = spec.port();

        // 1. DNS Resolution
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
            .await
            .dns_context(host)?
            .filter(|addr| match spec.family() {
                Some(4) => addr.is_ipv4(),
                Some(6) => addr.is_ipv6(),
                _ => true,
            })
            .collect();

        if addrs.is_empty() {
            return Err(NetError::NameNotResolvedFor {
                domain: host.to_string(),
                reason: "no addresses for requested family".to_string(),
            });
        }

        let local = spec
            .local_address()
            .map(|a| {
                a.parse::<IpAddr>()
                    .map_err(|_| NetError::InvalidUrl(format!("bad local address {}", a)))
            })
            .transpose()?;

        // 2. TCP Connect, first address that answers
        let mut last_err = None;
        let mut stream = None;
        for addr in addrs {
            match Self::connect_tcp(addr, local).await.connection_context(host, port) {
                Ok(s) => {
                    stream = Some(s);
                    break;
                }
                Err(e) => {
                    tracing::debug!(%addr, error = %e, "tcp connect failed");
                    last_err = Some(e);
                }
            }
        }
        let stream = match stream {
            Some(s) => s,
            None => return Err(last_err.unwrap_or(NetError::ConnectionFailed)),
        };

        // 3. SSL Handshake for secure protocols
        if !spec.is_secure() {
            return Ok(SocketType::Tcp(stream));
        }

        let material = connection_material(spec.agent(), spec.material());
        let connector = build_connector(material, spec.tls(), spec.reject_unauthorized())?;
        let mut config = connector
            .configure()
            .map_err(|_| NetError::SslProtocolError)?;
        if !spec.reject_unauthorized() {
            config.set_verify_hostname(false);
        }

        let server_name = spec.tls().servername.as_deref().unwrap_or(host);
        let tls_stream = tokio_boring::connect(config, server_name, stream)
            .await
            .map_err(|e| {
                tracing::debug!(host = %server_name, error = ?e, "TLS handshake failed");
                NetError::SslProtocolError
            })?;

        Ok(SocketType::Ssl(tls_stream))
    }

    async fn connect_tcp(addr: SocketAddr, local: Option<IpAddr>) -> std::io::Result<TcpStream> {
        let Some(ip) = local else {
            return TcpStream::connect(addr).await;
        };
        let socket = if addr.is_ipv4() {
            TcpSocket::new_v4()?
        } else {
            TcpSocket::new_v6()?
        };
        socket.bind(SocketAddr::new(ip, 0))?;
        socket.connect(addr).await
    }
}
