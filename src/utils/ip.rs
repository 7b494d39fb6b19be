// src/utils/ip.rs

use axum::http::HeaderMap;
use std::net::SocketAddr;

/// Resolves the client address for abuse forensics: proxy headers first
/// (x-forwarded-for may carry a chain, the first hop is the client), then
/// the peer address of the connection. Mirrors the key the rate limiter
/// throttles on.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip").and_then(|value| value.to_str().ok()) {
        let real_ip = real_ip.trim();
        if !real_ip.is_empty() {
            return Some(real_ip.to_string());
        }
    }

    peer.map(|addr| addr.ip().to_string())
}
