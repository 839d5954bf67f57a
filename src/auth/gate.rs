// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The request authentication gate.
//!
//! Each request runs through an ordered pipeline of named validators and
//! stops at the first failure:
//!
//! ```text
//! origin -> headers -> token -> timestamp -> nonce -> signature -> allowed
//! ```
//!
//! Exempt requests (CORS preflight, the issuance endpoint, health, admin,
//! static assets, webhooks, anything outside `/api/`) skip the pipeline.
//! The gate never retries and never touches business state; its only side
//! effect is nonce registration.

use axum::http::{HeaderMap, Method};
use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use super::nonce::{NonceGuard, NonceStatus};
use super::origin::{origin_from_headers, validate_origin};
use super::signature::{hash_body, verify_signature, SigningInput};
use super::timestamp::validate_timestamp;
use super::GateError;
use crate::config::GateConfig;
use crate::models::{log_prefix, ChallengeToken};
use crate::storage::{ChallengeTokenStore, StoreError};

pub const TOKEN_HEADER: &str = "x-api-challenge-token";
pub const TIMESTAMP_HEADER: &str = "x-api-timestamp";
pub const NONCE_HEADER: &str = "x-api-nonce";
pub const SIGNATURE_HEADER: &str = "x-api-signature";

/// The parts of an inbound request the gate looks at.
#[derive(Debug, Clone, Copy)]
pub struct GateRequest<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub headers: &'a HeaderMap,
    /// Raw body bytes exactly as received.
    pub body: &'a [u8],
}

/// Proof that a request passed the gate, attached to request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedRequest {
    pub token: String,
    pub nonce: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// The request matched an exemption and was not inspected.
    Exempt,
    Allowed(AuthenticatedRequest),
}

/// The four signing headers, all present and non-empty.
struct SecurityHeaders<'a> {
    token: &'a str,
    timestamp: &'a str,
    nonce: &'a str,
    signature: &'a str,
}

impl<'a> SecurityHeaders<'a> {
    fn extract(headers: &'a HeaderMap) -> Result<Self, GateError> {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .ok_or(GateError::MissingHeaders)
        };
        Ok(Self {
            token: get(TOKEN_HEADER)?,
            timestamp: get(TIMESTAMP_HEADER)?,
            nonce: get(NONCE_HEADER)?,
            signature: get(SIGNATURE_HEADER)?,
        })
    }
}

/// Orchestrates the validators for every inbound request.
pub struct RequestGate {
    config: GateConfig,
    tokens: ChallengeTokenStore,
    nonces: NonceGuard,
}

impl RequestGate {
    pub fn new(config: GateConfig, tokens: ChallengeTokenStore, nonces: NonceGuard) -> Self {
        Self {
            config,
            tokens,
            nonces,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Whether the request bypasses the gate entirely.
    pub fn is_exempt(&self, method: &Method, path: &str) -> bool {
        if *method == Method::OPTIONS {
            return true;
        }
        if !path.starts_with(self.config.protected_prefix.as_str()) {
            return true;
        }
        self.config.exempt_paths.iter().any(|p| p == path)
            || self
                .config
                .exempt_prefixes
                .iter()
                .any(|p| path.starts_with(p.as_str()))
            || self
                .config
                .exempt_segments
                .iter()
                .any(|s| path.contains(s.as_str()))
    }

    /// Evaluate one request at time `now`.
    pub async fn authenticate(
        &self,
        request: &GateRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<GateDecision, GateError> {
        if self.is_exempt(request.method, request.path) {
            return Ok(GateDecision::Exempt);
        }

        match self.run_pipeline(request, now).await {
            Ok(authenticated) => {
                debug!(
                    method = %request.method,
                    path = request.path,
                    token = %log_prefix(&authenticated.token),
                    "Request validated"
                );
                Ok(GateDecision::Allowed(authenticated))
            }
            Err(err) => {
                self.log_rejection(request, &err);
                Err(err)
            }
        }
    }

    async fn run_pipeline(
        &self,
        request: &GateRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<AuthenticatedRequest, GateError> {
        self.check_origin(request)?;
        let headers = SecurityHeaders::extract(request.headers)?;
        let token = self.check_token(headers.token, now).await?;
        let timestamp =
            validate_timestamp(headers.timestamp, self.config.timestamp_tolerance, now)?;
        self.check_nonce(&token, headers.nonce, now).await?;
        self.check_signature(&token, &headers, request)?;

        Ok(AuthenticatedRequest {
            token: token.public_token,
            nonce: headers.nonce.to_string(),
            timestamp,
        })
    }

    fn check_origin(&self, request: &GateRequest<'_>) -> Result<(), GateError> {
        validate_origin(
            origin_from_headers(request.headers),
            self.config.allowed_origin.as_deref(),
            self.config.debug,
        )
    }

    async fn check_token(
        &self,
        public_token: &str,
        now: DateTime<Utc>,
    ) -> Result<ChallengeToken, GateError> {
        let token = match self.tokens.lookup(public_token).await {
            Ok(token) => token,
            Err(StoreError::NotFound(_)) => {
                debug!(token = %log_prefix(public_token), "Unknown challenge token");
                return Err(GateError::TokenInvalid);
            }
            Err(e) => return Err(e.into()),
        };

        if !token.is_valid_at(now) {
            debug!(
                token = %token.short(),
                revoked = token.revoked,
                expires_at = %token.expires_at,
                "Challenge token expired or revoked"
            );
            return Err(GateError::TokenInvalid);
        }
        Ok(token)
    }

    async fn check_nonce(
        &self,
        token: &ChallengeToken,
        nonce: &str,
        now: DateTime<Utc>,
    ) -> Result<(), GateError> {
        let status = self
            .nonces
            .register_if_unused(&token.public_token, nonce, self.config.nonce_retention(), now)
            .await?;
        match status {
            NonceStatus::Accepted => Ok(()),
            NonceStatus::AlreadyUsed => Err(GateError::NonceReused),
        }
    }

    fn check_signature(
        &self,
        token: &ChallengeToken,
        headers: &SecurityHeaders<'_>,
        request: &GateRequest<'_>,
    ) -> Result<(), GateError> {
        let body_hash = hash_body(request.body);
        let input = SigningInput {
            token: headers.token,
            timestamp: headers.timestamp,
            nonce: headers.nonce,
            method: request.method.as_str(),
            path: request.path,
            body_hash: &body_hash,
        };
        verify_signature(&token.secret, &input, headers.signature)
    }

    fn log_rejection(&self, request: &GateRequest<'_>, err: &GateError) {
        let token = request
            .headers
            .get(TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(log_prefix)
            .unwrap_or("-");
        let nonce = request
            .headers
            .get(NONCE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(log_prefix)
            .unwrap_or("-");

        if let GateError::Internal(_) = err {
            error!(
                kind = err.kind(),
                method = %request.method,
                path = request.path,
                token,
                nonce,
                error = %err,
                "Unexpected error in request gate"
            );
        } else {
            warn!(
                kind = err.kind(),
                method = %request.method,
                path = request.path,
                token,
                nonce,
                reason = %err,
                "Request rejected by gate"
            );
        }
    }
}
