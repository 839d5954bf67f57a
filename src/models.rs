// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Data Models
//!
//! Records persisted in the durable store and the JSON bodies returned by
//! the HTTP API. Persisted records derive `Serialize`/`Deserialize` and are
//! stored as JSON bytes; response bodies additionally derive `ToSchema` for
//! the OpenAPI document.
//!
//! ## Model Categories
//!
//! - **Challenge tokens**: issued credentials (public token + shared secret)
//! - **Nonces**: consumed single-use request values
//! - **Responses**: issuance, health, signed echo and revocation payloads

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// =============================================================================
// Challenge Token
// =============================================================================

/// One issued credential.
///
/// The `secret` is kept in retrievable form: the server has to recompute the
/// exact HMAC the client produced, so it cannot be one-way hashed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChallengeToken {
    pub id: String,
    pub public_token: String,
    pub secret: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub revoked: bool,
    #[serde(default)]
    pub issuing_ip: Option<String>,
}

impl ChallengeToken {
    /// Build a fresh, unrevoked token expiring `ttl` after `created_at`.
    pub fn new(
        public_token: String,
        secret: String,
        created_at: DateTime<Utc>,
        ttl: Duration,
        issuing_ip: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            public_token,
            secret,
            created_at,
            expires_at: created_at
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            revoked: false,
            issuing_ip,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// A token is usable iff it is not revoked and `now <= expires_at`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && !self.is_expired_at(now)
    }

    /// First characters of the public token, safe for logs.
    pub fn short(&self) -> &str {
        log_prefix(&self.public_token)
    }
}

// =============================================================================
// Nonce
// =============================================================================

/// A consumed single-use request nonce.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NonceRecord {
    pub value: String,
    /// Public token the nonce was presented under (audit link only).
    pub token_ref: String,
    pub used_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl NonceRecord {
    pub fn new(value: String, token_ref: String, used_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            value,
            token_ref,
            used_at,
            expires_at: used_at
                .checked_add_signed(ttl)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Length of token/nonce prefixes written to logs.
pub const LOG_PREFIX_LEN: usize = 8;

/// Truncate a credential-like value for forensic logging.
pub fn log_prefix(value: &str) -> &str {
    match value.char_indices().nth(LOG_PREFIX_LEN) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

// =============================================================================
// API Responses
// =============================================================================

/// Body of a successful issuance call.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChallengeResponse {
    /// Public token, sent back in `X-Api-Challenge-Token`.
    pub token: String,
    /// Shared HMAC secret. Returned only once, at issuance.
    pub secret: String,
    /// RFC 3339 expiry timestamp.
    pub expires_at: DateTime<Utc>,
    /// Seconds until expiry.
    pub expires_in: i64,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
}

/// API root listing the public endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiIndexResponse {
    pub status: String,
    pub version: String,
    pub endpoints: BTreeMap<String, String>,
}

/// Response of the signed echo endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifiedResponse {
    pub status: String,
    /// Truncated public token the request was signed with.
    pub token_prefix: String,
    pub method: String,
    pub path: String,
}

/// Result of an admin revocation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RevokedTokenResponse {
    pub status: String,
    /// Truncated public token that was revoked.
    pub token_prefix: String,
    pub expires_at: DateTime<Utc>,
}
