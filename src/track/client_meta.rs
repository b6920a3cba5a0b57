//! Client metadata extraction for analytics events

use axum::http::{header, HeaderMap, HeaderName};
use std::net::SocketAddr;

use crate::analytics::ClientMeta;

/// Capture user agent, referrer and client IP from an incoming request.
pub fn client_meta(headers: &HeaderMap, addr: SocketAddr, trust_proxy_headers: bool) -> ClientMeta {
    ClientMeta {
        user_agent: header_str(headers, header::USER_AGENT),
        referrer: header_str(headers, header::REFERER),
        ip: Some(client_ip(headers, addr, trust_proxy_headers)),
    }
}

/// Resolve the client IP. Forwarding headers are spoofable, so they are only
/// consulted when the deployment explicitly trusts its proxy layer.
pub fn client_ip(headers: &HeaderMap, addr: SocketAddr, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        if let Some(forwarded) = header_str_by_name(headers, "x-forwarded-for") {
            if let Some(first) = forwarded.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return first.to_string();
                }
            }
        }
        if let Some(real_ip) = header_str_by_name(headers, "x-real-ip") {
            let real_ip = real_ip.trim();
            if !real_ip.is_empty() {
                return real_ip.to_string();
            }
        }
    }

    addr.ip().to_string()
}

fn header_str(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn header_str_by_name(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn socket() -> SocketAddr {
        SocketAddr::from(([203, 0, 113, 9], 44000))
    }

    #[test]
    fn socket_ip_when_proxies_untrusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1"));

        assert_eq!(client_ip(&headers, socket(), false), "203.0.113.9");
    }

    #[test]
    fn first_forwarded_entry_wins_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("198.51.100.4, 10.0.0.1"),
        );

        assert_eq!(client_ip(&headers, socket(), true), "198.51.100.4");
    }

    #[test]
    fn real_ip_fallback_when_trusted() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.7"));

        assert_eq!(client_ip(&headers, socket(), true), "198.51.100.7");
    }

    #[test]
    fn empty_forwarding_headers_fall_back_to_socket() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("  "));

        assert_eq!(client_ip(&headers, socket(), true), "203.0.113.9");
    }

    #[test]
    fn meta_captures_user_agent_and_referrer() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static("Outlook/16.0"),
        );
        headers.insert(
            header::REFERER,
            HeaderValue::from_static("https://mail.example.com/"),
        );

        let meta = client_meta(&headers, socket(), false);
        assert_eq!(meta.user_agent.as_deref(), Some("Outlook/16.0"));
        assert_eq!(meta.referrer.as_deref(), Some("https://mail.example.com/"));
        assert_eq!(meta.ip.as_deref(), Some("203.0.113.9"));
    }
}
