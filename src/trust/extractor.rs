//! Client IP extraction.
//!
//! # Responsibilities
//! - Derive the client address from the peer address and proxy headers
//! - Install the derived address into request extensions
//! - Expose it to handlers through the [`ClientIp`] extractor
//!
//! # Design Decisions
//! - Extraction never fails: anything unparsable falls back to the peer
//! - `X-Forwarded-For` is walked right to left; the first untrusted hop wins

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{request::Parts, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::http::error::{AppError, HttpError};
use crate::trust::cidr::Cidr;
use crate::trust::options::TrustMode;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// Decides whether a hop may be believed.
#[derive(Debug, Clone)]
pub(crate) struct IpChecker {
    pub(crate) ranges: Vec<Cidr>,
    pub(crate) trust_loopback: bool,
    pub(crate) trust_link_local: bool,
    pub(crate) trust_private_net: bool,
}

impl IpChecker {
    fn trusts(&self, ip: IpAddr) -> bool {
        let ip = ip.to_canonical();
        if self.trust_loopback && ip.is_loopback() {
            return true;
        }
        if self.trust_link_local && is_link_local(ip) {
            return true;
        }
        if self.trust_private_net && is_private(ip) {
            return true;
        }
        self.ranges.iter().any(|range| range.contains(ip))
    }
}

fn is_link_local(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_link_local(),
        IpAddr::V6(v6) => v6.segments()[0] & 0xffc0 == 0xfe80,
    }
}

fn is_private(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private(),
        // fc00::/7 unique local
        IpAddr::V6(v6) => v6.segments()[0] & 0xfe00 == 0xfc00,
    }
}

/// Strips whitespace and the brackets some proxies put around IPv6 hops.
fn parse_hop(raw: &str) -> Option<IpAddr> {
    let raw = raw.trim();
    let raw = raw.strip_prefix('[').unwrap_or(raw);
    let raw = raw.strip_suffix(']').unwrap_or(raw);
    raw.parse().ok()
}

/// Frozen client IP strategy, shared read-only across requests.
#[derive(Debug, Clone)]
pub struct IpExtractor {
    mode: TrustMode,
    checker: IpChecker,
}

impl IpExtractor {
    pub(crate) fn new(mode: TrustMode, checker: IpChecker) -> Self {
        Self { mode, checker }
    }

    /// Extractor that always returns the socket peer address.
    pub fn direct() -> Self {
        crate::trust::TrustConfig::new().apply()
    }

    pub fn mode(&self) -> TrustMode {
        self.mode
    }

    /// Derive the client address for a request.
    pub fn extract(&self, headers: &HeaderMap, peer: IpAddr) -> IpAddr {
        match self.mode {
            TrustMode::None => peer,
            TrustMode::XForwardedFor => self.from_xff(headers, peer),
            TrustMode::RealIp => self.from_real_ip(headers, peer),
        }
    }

    fn from_real_ip(&self, headers: &HeaderMap, peer: IpAddr) -> IpAddr {
        let real_ip = match headers.get(X_REAL_IP).and_then(|v| v.to_str().ok()) {
            Some(v) if !v.is_empty() => v,
            _ => return peer,
        };

        if !self.checker.trusts(peer) {
            return peer;
        }
        parse_hop(real_ip).unwrap_or(peer)
    }

    fn from_xff(&self, headers: &HeaderMap, peer: IpAddr) -> IpAddr {
        let mut values = Vec::new();
        for value in headers.get_all(X_FORWARDED_FOR) {
            match value.to_str() {
                Ok(v) => values.push(v),
                Err(_) => return peer,
            }
        }
        if values.is_empty() {
            return peer;
        }

        // The peer itself is the right-most hop of the chain.
        if !self.checker.trusts(peer) {
            return peer;
        }

        let joined = values.join(",");
        let mut client = peer;
        for hop in joined.rsplit(',') {
            let Some(ip) = parse_hop(hop) else {
                return peer;
            };
            if !self.checker.trusts(ip) {
                return ip;
            }
            client = ip;
        }
        client
    }
}

/// The derived client address of the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub IpAddr);

/// Middleware inserting [`ClientIp`] into request extensions.
///
/// Requires the router to be served with `into_make_service_with_connect_info`.
pub async fn client_ip_middleware(
    State(extractor): State<Arc<IpExtractor>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    match peer {
        Some(peer) => {
            let ip = extractor.extract(req.headers(), peer);
            tracing::trace!(peer = %peer, client_ip = %ip, "Client IP resolved");
            req.extensions_mut().insert(ClientIp(ip));
        }
        None => {
            tracing::debug!("No connection info on request, client IP left unresolved");
        }
    }

    next.run(req).await
}

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<ClientIp>().copied().ok_or_else(|| {
            HttpError::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
                .with_internal("client IP not resolved: client_ip_middleware is not installed")
                .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trust::TrustConfig;
    use axum::http::HeaderValue;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    fn strict() -> TrustConfig {
        TrustConfig::new()
            .trust_loopback(false)
            .trust_link_local(false)
            .trust_private_net(false)
    }

    #[test]
    fn test_direct_ignores_headers() {
        let extractor = IpExtractor::direct();
        let h = headers(&[(X_FORWARDED_FOR, "1.2.3.4"), (X_REAL_IP, "5.6.7.8")]);
        assert_eq!(extractor.extract(&h, ip("10.0.0.1")), ip("10.0.0.1"));
    }

    #[test]
    fn test_xff_returns_first_untrusted_hop() {
        let extractor = strict().trust_xff("203.0.113.0/24").unwrap().apply();
        let h = headers(&[(X_FORWARDED_FOR, "198.51.100.7, 203.0.113.5")]);
        assert_eq!(extractor.extract(&h, ip("203.0.113.1")), ip("198.51.100.7"));
    }

    #[test]
    fn test_xff_untrusted_peer_is_client() {
        let extractor = strict().trust_xff("203.0.113.0/24").unwrap().apply();
        let h = headers(&[(X_FORWARDED_FOR, "198.51.100.7")]);
        assert_eq!(extractor.extract(&h, ip("192.0.2.9")), ip("192.0.2.9"));
    }

    #[test]
    fn test_xff_spoofed_left_entries_are_ignored() {
        let extractor = strict().trust_xff("203.0.113.0/24").unwrap().apply();
        let h = headers(&[(X_FORWARDED_FOR, "6.6.6.6, 198.51.100.7, 203.0.113.5")]);
        assert_eq!(extractor.extract(&h, ip("203.0.113.1")), ip("198.51.100.7"));
    }

    #[test]
    fn test_xff_all_trusted_returns_leftmost() {
        let extractor = strict().trust_xff("10.0.0.0/8").unwrap().apply();
        let h = headers(&[(X_FORWARDED_FOR, "10.0.0.3, 10.0.0.2")]);
        assert_eq!(extractor.extract(&h, ip("10.0.0.1")), ip("10.0.0.3"));
    }

    #[test]
    fn test_xff_multiple_header_lines_are_joined() {
        let extractor = strict().trust_xff("10.0.0.0/8").unwrap().apply();
        let h = headers(&[(X_FORWARDED_FOR, "198.51.100.7"), (X_FORWARDED_FOR, "10.0.0.2")]);
        assert_eq!(extractor.extract(&h, ip("10.0.0.1")), ip("198.51.100.7"));
    }

    #[test]
    fn test_xff_garbage_falls_back_to_peer() {
        let extractor = strict().trust_xff("10.0.0.0/8").unwrap().apply();
        let h = headers(&[(X_FORWARDED_FOR, "not-an-ip, 10.0.0.2")]);
        assert_eq!(extractor.extract(&h, ip("10.0.0.1")), ip("10.0.0.1"));
    }

    #[test]
    fn test_xff_bracketed_ipv6() {
        let extractor = strict().trust_xff("2001:db8::/32").unwrap().apply();
        let h = headers(&[(X_FORWARDED_FOR, "[2001:db9::1]")]);
        assert_eq!(extractor.extract(&h, ip("2001:db8::2")), ip("2001:db9::1"));
    }

    #[test]
    fn test_real_ip_only_from_trusted_peer() {
        let extractor = strict().trust_real_ip("203.0.113.0/24").unwrap().apply();
        let h = headers(&[(X_REAL_IP, "198.51.100.7")]);
        assert_eq!(extractor.extract(&h, ip("203.0.113.1")), ip("198.51.100.7"));
        assert_eq!(extractor.extract(&h, ip("192.0.2.1")), ip("192.0.2.1"));
    }

    #[test]
    fn test_real_ip_invalid_header_falls_back() {
        let extractor = strict().trust_real_ip("203.0.113.0/24").unwrap().apply();
        let h = headers(&[(X_REAL_IP, "garbage")]);
        assert_eq!(extractor.extract(&h, ip("203.0.113.1")), ip("203.0.113.1"));
        assert_eq!(extractor.extract(&HeaderMap::new(), ip("203.0.113.1")), ip("203.0.113.1"));
    }

    #[test]
    fn test_implicit_private_trust() {
        let extractor = TrustConfig::new().trust_real_ip("203.0.113.0/24").unwrap().apply();
        let h = headers(&[(X_REAL_IP, "198.51.100.7")]);
        assert_eq!(extractor.extract(&h, ip("127.0.0.1")), ip("198.51.100.7"));
        assert_eq!(extractor.extract(&h, ip("192.168.1.1")), ip("198.51.100.7"));
        assert_eq!(extractor.extract(&h, ip("169.254.0.1")), ip("198.51.100.7"));
        assert_eq!(extractor.extract(&h, ip("fd00::1")), ip("198.51.100.7"));
    }
}
