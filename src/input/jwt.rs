//! JWT payload decoding.
//!
//! Only the payload segment is decoded. Signatures are never verified: the
//! claims are scanned as user input, not trusted.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::{Map, Value};

/// Decode the claims of a JWT-shaped string.
///
/// A string qualifies when it has exactly three `.`-separated parts, a
/// non-empty header and a payload that is base64url-encoded JSON object.
/// Padded payloads are accepted.
pub fn try_decode_jwt(candidate: &str) -> Option<Map<String, Value>> {
    if !candidate.contains('.') {
        return None;
    }

    let mut parts = candidate.split('.');
    let (header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || header.is_empty() || payload.is_empty() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;

    match serde_json::from_slice::<Value>(&bytes).ok()? {
        Value::Object(claims) => Some(claims),
        _ => None,
    }
}
