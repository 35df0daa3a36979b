//! Rate limiting with governor and `tower_governor`.
//!
//! - `auth_rate_limiter`: login, registration and `/set-claims` (~10/min)
//! - `api_rate_limiter`: everything else (~100/min)

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use governor::clock::QuantaInstant;
use governor::middleware::NoOpMiddleware;
use tower_governor::{GovernorError, GovernorLayer, governor::GovernorConfigBuilder};

/// Proxy headers carrying the client address, most trusted first.
const CLIENT_IP_HEADERS: [&str; 3] = ["cf-connecting-ip", "x-real-ip", "fly-client-ip"];

/// Client address as reported by a reverse proxy, if any.
#[must_use]
pub fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    if let Some(ip) = header(CLIENT_IP_HEADERS[0]).and_then(|s| s.trim().parse().ok()) {
        return Some(ip);
    }

    // First hop of X-Forwarded-For is the original client
    if let Some(ip) = header("x-forwarded-for")
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse().ok())
    {
        return Some(ip);
    }

    CLIENT_IP_HEADERS[1..]
        .iter()
        .find_map(|name| header(name).and_then(|s| s.trim().parse().ok()))
}

/// Keys requests by client IP: proxy headers first, then the socket peer.
#[derive(Clone, Copy)]
pub struct ClientIpKeyExtractor;

impl tower_governor::key_extractor::KeyExtractor for ClientIpKeyExtractor {
    type Key = IpAddr;

    fn extract<T>(&self, req: &Request<T>) -> Result<Self::Key, GovernorError> {
        forwarded_ip(req.headers())
            .or_else(|| {
                req.extensions()
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip())
            })
            .ok_or(GovernorError::UnableToExtractKey)
    }
}

pub type RateLimiterLayer =
    GovernorLayer<ClientIpKeyExtractor, NoOpMiddleware<QuantaInstant>, axum::body::Body>;

/// ~10 requests per minute per IP: one token every 6 seconds, burst of 5.
///
/// # Panics
///
/// Does not panic: `per_second(6)` and `burst_size(5)` are valid positive
/// values for `GovernorConfigBuilder`.
#[must_use]
pub fn auth_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(6)
        .burst_size(5)
        .finish()
        .expect("rate limiter config with per_second(6) and burst_size(5) is valid");
    GovernorLayer::new(Arc::new(config))
}

/// ~100 requests per minute per IP with a burst of 50.
///
/// # Panics
///
/// Does not panic: `per_second(1)` and `burst_size(50)` are valid positive
/// values for `GovernorConfigBuilder`.
#[must_use]
pub fn api_rate_limiter() -> RateLimiterLayer {
    let config = GovernorConfigBuilder::default()
        .key_extractor(ClientIpKeyExtractor)
        .per_second(1)
        .burst_size(50)
        .finish()
        .expect("rate limiter config with per_second(1) and burst_size(50) is valid");
    GovernorLayer::new(Arc::new(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use tower_governor::key_extractor::KeyExtractor;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_cloudflare_header_wins() {
        let map = headers(&[
            ("x-forwarded-for", "10.0.0.1, 10.0.0.2"),
            ("cf-connecting-ip", "203.0.113.7"),
        ]);
        assert_eq!(forwarded_ip(&map), "203.0.113.7".parse().ok());
    }

    #[test]
    fn test_first_forwarded_hop() {
        let map = headers(&[("x-forwarded-for", "198.51.100.4, 10.0.0.2")]);
        assert_eq!(forwarded_ip(&map), "198.51.100.4".parse().ok());
    }

    #[test]
    fn test_no_proxy_headers() {
        assert_eq!(forwarded_ip(&HeaderMap::new()), None);
        assert_eq!(forwarded_ip(&headers(&[("x-real-ip", "garbage")])), None);
    }

    #[test]
    fn test_extractor_falls_back_to_peer_address() {
        let addr: SocketAddr = "192.0.2.9:40000".parse().expect("socket addr");
        let mut request = Request::new(());
        request.extensions_mut().insert(ConnectInfo(addr));

        let key = ClientIpKeyExtractor.extract(&request).expect("key");
        assert_eq!(key, addr.ip());
    }

    #[test]
    fn test_extractor_without_any_address() {
        let request = Request::new(());
        assert!(ClientIpKeyExtractor.extract(&request).is_err());
    }
}
