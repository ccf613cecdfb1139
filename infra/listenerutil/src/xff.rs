use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use ipnet::IpNet;
use keel_configutil::Listener;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tracing::{debug, warn};

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// X-Forwarded-For trust settings of one listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XffConfig {
    pub authorized_addrs: Vec<IpNet>,
    pub hop_skips: usize,
    pub reject_not_present: bool,
    pub reject_not_authorized: bool,
}

impl XffConfig {
    /// Returns `None` when the listener trusts no proxies, in which case the header is
    /// ignored entirely.
    #[must_use]
    pub fn from_listener(listener: &Listener) -> Option<Self> {
        if listener.x_forwarded_for_authorized_addrs.is_empty() {
            return None;
        }
        Some(Self {
            authorized_addrs: listener.x_forwarded_for_authorized_addrs.clone(),
            hop_skips: listener.x_forwarded_for_hop_skips,
            reject_not_present: listener.x_forwarded_for_reject_not_present,
            reject_not_authorized: listener.x_forwarded_for_reject_not_authorized,
        })
    }

    fn is_authorized(&self, ip: IpAddr) -> bool {
        self.authorized_addrs.iter().any(|net| net.contains(&ip))
    }
}

/// Client address recovered from the forwarding chain.
///
/// The host is whatever the proxy wrote, usually an IP literal; the port is the one of
/// the connection that delivered the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddr {
    pub host: String,
    pub port: u16,
}

impl ClientAddr {
    /// The address as a socket address, when the host is an IP literal.
    #[must_use]
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        let host = self.host.trim_start_matches('[').trim_end_matches(']');
        host.parse::<IpAddr>().ok().map(|ip| SocketAddr::new(ip, self.port))
    }
}

impl fmt::Display for ClientAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') && !self.host.starts_with('[') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Why a request was refused by the forwarding checks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct XffRejection {
    pub status: StatusCode,
    pub message: String,
}

impl XffRejection {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }

    fn not_authorized() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            "client address not authorized for x-forwarded-for and configured to reject connection",
        )
    }
}

impl IntoResponse for XffRejection {
    fn into_response(self) -> Response {
        (self.status, self.message).into_response()
    }
}

/// Works out the client address a trusted proxy vouched for.
///
/// `Ok(None)` means the request passes through unchanged: either there is no header
/// or the peer is not a trusted proxy and rejection is not configured.
///
/// # Errors
/// `403` when a required header is missing or the peer is not authorized, `400` when
/// the chain is shorter than the configured hop skips.
pub fn trusted_client(
    config: &XffConfig,
    headers: &HeaderMap,
    remote: SocketAddr,
) -> Result<Option<ClientAddr>, XffRejection> {
    let values: Vec<&str> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();

    if values.is_empty() {
        if config.reject_not_present {
            return Err(XffRejection::new(
                StatusCode::FORBIDDEN,
                "missing x-forwarded-for header and configured to reject when not present",
            ));
        }
        return Ok(None);
    }

    if !config.is_authorized(remote.ip()) {
        if config.reject_not_authorized {
            return Err(XffRejection::not_authorized());
        }
        debug!(remote = %remote, "Ignoring x-forwarded-for from an untrusted peer");
        return Ok(None);
    }

    let chain: Vec<&str> = values
        .iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .collect();

    let Some(index) = chain.len().checked_sub(1 + config.hop_skips) else {
        return Err(XffRejection::new(
            StatusCode::BAD_REQUEST,
            format!(
                "malformed x-forwarded-for configuration or request, hops to skip ({}) would skip before earliest chain link (chain length {})",
                config.hop_skips,
                chain.len()
            ),
        ));
    };

    Ok(Some(ClientAddr { host: chain[index].to_owned(), port: remote.port() }))
}

/// Rewrites the peer address from `X-Forwarded-For` when the peer is a trusted proxy.
///
/// On success the request carries a [`ClientAddr`] extension and, when the chain entry
/// is an IP, a replaced [`ConnectInfo<SocketAddr>`]. Requires the router to be served
/// with `into_make_service_with_connect_info::<SocketAddr>()`.
pub async fn forwarded_for_middleware(
    State(config): State<Arc<XffConfig>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(remote) = request.extensions().get::<ConnectInfo<SocketAddr>>().map(|c| c.0) else {
        if config.reject_not_authorized {
            warn!("Rejecting request without a peer address");
            return XffRejection::not_authorized().into_response();
        }
        return next.run(request).await;
    };

    match trusted_client(&config, request.headers(), remote) {
        Ok(Some(client)) => {
            debug!(remote = %remote, client = %client, "Accepted forwarded client address");
            if let Some(addr) = client.socket_addr() {
                request.extensions_mut().insert(ConnectInfo(addr));
            }
            request.extensions_mut().insert(client);
            next.run(request).await
        },
        Ok(None) => next.run(request).await,
        Err(rejection) => {
            warn!(remote = %remote, status = %rejection.status, reason = %rejection.message, "Rejected forwarded request");
            rejection.into_response()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config(hop_skips: usize) -> XffConfig {
        XffConfig {
            authorized_addrs: vec!["127.0.0.1/32".parse().unwrap(), "10.0.0.0/8".parse().unwrap()],
            hop_skips,
            reject_not_present: true,
            reject_not_authorized: true,
        }
    }

    fn headers(values: &[&str]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for v in values {
            map.append(X_FORWARDED_FOR, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    fn remote(addr: &str) -> SocketAddr {
        addr.parse().unwrap()
    }

    #[test]
    fn test_last_link_without_skips() {
        let client = trusted_client(&config(0), &headers(&["1.2.3.4, 5.6.7.8"]), remote("127.0.0.1:4444"))
            .unwrap()
            .unwrap();
        assert_eq!(client, ClientAddr { host: "5.6.7.8".into(), port: 4444 });
        assert_eq!(client.socket_addr(), Some(remote("5.6.7.8:4444")));
    }

    #[test]
    fn test_hop_skips_across_multiple_headers() {
        let h = headers(&["1.2.3.4", "5.6.7.8, 9.9.9.9"]);
        let client = trusted_client(&config(2), &h, remote("10.1.1.1:80")).unwrap().unwrap();
        assert_eq!(client.host, "1.2.3.4");

        let err = trusted_client(&config(3), &h, remote("10.1.1.1:80")).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("hops to skip (3)"));
        assert!(err.message.contains("chain length 3"));
    }

    #[test]
    fn test_missing_header() {
        let err = trusted_client(&config(0), &HeaderMap::new(), remote("127.0.0.1:1")).unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);

        let lenient = XffConfig { reject_not_present: false, ..config(0) };
        assert_eq!(trusted_client(&lenient, &HeaderMap::new(), remote("127.0.0.1:1")).unwrap(), None);
    }

    #[test]
    fn test_unauthorized_peer() {
        let h = headers(&["1.2.3.4"]);
        let err = trusted_client(&config(0), &h, remote("192.168.0.1:1")).unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);

        let lenient = XffConfig { reject_not_authorized: false, ..config(0) };
        assert_eq!(trusted_client(&lenient, &h, remote("192.168.0.1:1")).unwrap(), None);
    }

    #[test]
    fn test_ipv6_display() {
        let client = ClientAddr { host: "::1".into(), port: 8200 };
        assert_eq!(client.to_string(), "[::1]:8200");
        assert_eq!(client.socket_addr(), Some(remote("[::1]:8200")));

        let named = ClientAddr { host: "proxy.local".into(), port: 1 };
        assert_eq!(named.socket_addr(), None);
    }
}
