//! Bearer-token auth middleware: a shared token, checked against the
//! SHA-256 hex digest loaded at startup. The stored hash is a hex `String`
//! (`seed_domain::config::ServerConfig`) rather than raw bytes, so comparison
//! happens on hex digests instead of byte vectors, and the constant-time
//! compare is a manual XOR fold since this workspace carries no dedicated
//! constant-time-comparison crate.

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use sha2::{Digest, Sha256};

use crate::state::AppState;

fn unauthorized(message: impl Into<String>) -> Response {
    (StatusCode::UNAUTHORIZED, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// Compares two equal-length hex strings without short-circuiting on the
/// first mismatch. Not cryptographically load-bearing against a timing
/// attack on its own, but avoids the cheapest variant (`!=` on `&str`,
/// which LLVM is free to turn into `memcmp`'s early exit).
fn hashes_match(expected: &str, got: &str) -> bool {
    if expected.len() != got.len() {
        return false;
    }
    let mut diff = 0u8;
    for (a, b) in expected.bytes().zip(got.bytes()) {
        diff |= a ^ b;
    }
    diff == 0
}

fn is_loopback(addr: SocketAddr) -> bool {
    match addr.ip() {
        IpAddr::V4(ip) => ip.is_loopback(),
        IpAddr::V6(ip) => ip.is_loopback(),
    }
}

/// Pulls the token from `Authorization: Bearer <token>`, falling back to a
/// `?token=` query parameter (§6 "header or query parameter"). Tokens are
/// opaque bearer strings, never containing characters that need percent-
/// decoding, so a plain key/value scan is enough.
fn extract_token<B>(req: &Request<B>) -> Option<String> {
    if let Some(header) = req.headers().get(axum::http::header::AUTHORIZATION) {
        if let Ok(value) = header.to_str() {
            if let Some(token) = value.strip_prefix("Bearer ") {
                return Some(token.to_string());
            }
        }
    }
    let query = req.uri().query()?;
    query.split('&').find_map(|pair| pair.strip_prefix("token=")).map(str::to_string)
}

/// Rejects requests missing a valid bearer token, unless auth is disabled
/// (`bearer_token_hash` is `None`) or the peer is loopback (§6 "localhost
/// bypass permitted for local UI").
pub async fn require_bearer_token(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let Some(expected) = &state.bearer_token_hash else {
        return next.run(req).await;
    };
    if is_loopback(peer) {
        return next.run(req).await;
    }

    let Some(token) = extract_token(&req) else {
        return unauthorized("missing bearer token");
    };
    let got = hex::encode(Sha256::digest(token.as_bytes()));
    if !hashes_match(expected, &got) {
        return unauthorized("invalid bearer token");
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_hashes_match() {
        assert!(hashes_match("abcd", "abcd"));
    }

    #[test]
    fn different_hashes_do_not_match() {
        assert!(!hashes_match("abcd", "abce"));
    }

    #[test]
    fn different_lengths_do_not_match() {
        assert!(!hashes_match("abcd", "abcde"));
    }

    #[test]
    fn loopback_detection() {
        assert!(is_loopback("127.0.0.1:9000".parse().unwrap()));
        assert!(is_loopback("[::1]:9000".parse().unwrap()));
        assert!(!is_loopback("10.0.0.5:9000".parse().unwrap()));
    }
}
