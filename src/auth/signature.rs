// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HMAC-SHA256 request signatures.
//!
//! Canonical signing string:
//!
//! ```text
//! token|timestamp|nonce|METHOD|path|body_hash
//! ```
//!
//! Fields are not escaped. Tokens and nonces are random URL-safe strings and
//! method/path come from the HTTP request line, so none of them contain `|`.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use super::GateError;

type HmacSha256 = Hmac<Sha256>;

/// The signed parts of one request.
#[derive(Debug, Clone, Copy)]
pub struct SigningInput<'a> {
    pub token: &'a str,
    pub timestamp: &'a str,
    pub nonce: &'a str,
    pub method: &'a str,
    pub path: &'a str,
    pub body_hash: &'a str,
}

impl SigningInput<'_> {
    pub fn canonical_string(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}",
            self.token, self.timestamp, self.nonce, self.method, self.path, self.body_hash
        )
    }
}

/// Hex SHA-256 of the raw body, or `""` for an empty body.
///
/// Must be computed over the exact received bytes, before any parsing.
pub fn hash_body(body: &[u8]) -> String {
    if body.is_empty() {
        return String::new();
    }
    hex::encode(Sha256::digest(body))
}

fn keyed_mac(secret: &str, input: &SigningInput<'_>) -> HmacSha256 {
    // HMAC accepts keys of any length; new_from_slice cannot fail here.
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
    mac.update(input.canonical_string().as_bytes());
    mac
}

/// Compute the hex signature a client must send for `input`.
pub fn sign(secret: &str, input: &SigningInput<'_>) -> String {
    hex::encode(keyed_mac(secret, input).finalize().into_bytes())
}

/// Length of a hex-encoded HMAC-SHA256 tag.
pub const SIGNATURE_HEX_LEN: usize = 64;

/// Verify a provided hex signature in constant time.
///
/// Only the exact form [`sign`] produces is accepted: 64 lowercase hex
/// characters, no surrounding whitespace.
pub fn verify_signature(
    secret: &str,
    input: &SigningInput<'_>,
    provided: &str,
) -> Result<(), GateError> {
    if !is_lower_hex_tag(provided) {
        return Err(GateError::SignatureMismatch);
    }
    let provided = hex::decode(provided).map_err(|_| GateError::SignatureMismatch)?;
    keyed_mac(secret, input)
        .verify_slice(&provided)
        .map_err(|_| GateError::SignatureMismatch)
}

fn is_lower_hex_tag(value: &str) -> bool {
    value.len() == SIGNATURE_HEX_LEN
        && value
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
