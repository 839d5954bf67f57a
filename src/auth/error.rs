// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Gate rejection taxonomy.
//!
//! Each validator returns its specific kind, which is what gets logged.
//! Externally every authentication kind collapses into the same generic 401
//! body; only [`GateError::Internal`] surfaces as a 500.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::storage::StoreError;

/// Body sent for every authentication failure.
pub const GENERIC_AUTH_MESSAGE: &str = "Request authentication failed";

/// Body sent for internal failures outside debug mode.
pub const GENERIC_INTERNAL_MESSAGE: &str = "Security validation failed";

/// Why a request was refused by the gate.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("missing required security headers")]
    MissingHeaders,

    /// Unknown, expired and revoked tokens are deliberately indistinguishable.
    #[error("invalid or expired token")]
    TokenInvalid,

    #[error("timestamp is not an integer number of seconds")]
    TimestampMalformed,

    #[error("timestamp outside tolerance window (drift {drift_secs}s, tolerance {tolerance_secs}s)")]
    TimestampOutOfTolerance { drift_secs: u64, tolerance_secs: u64 },

    #[error("nonce has already been used")]
    NonceReused,

    #[error("signature mismatch")]
    SignatureMismatch,

    #[error("origin rejected: {0}")]
    OriginRejected(String),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct GateErrorBody {
    error: String,
}

impl GateError {
    /// Stable identifier of the kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            GateError::MissingHeaders => "missing_headers",
            GateError::TokenInvalid => "token_invalid",
            GateError::TimestampMalformed => "timestamp_malformed",
            GateError::TimestampOutOfTolerance { .. } => "timestamp_out_of_tolerance",
            GateError::NonceReused => "nonce_reused",
            GateError::SignatureMismatch => "signature_mismatch",
            GateError::OriginRejected(_) => "origin_rejected",
            GateError::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            GateError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Build the HTTP response. `debug` exposes internal error detail.
    pub fn to_response(&self, debug: bool) -> Response {
        let message = match self {
            GateError::Internal(detail) if debug => format!("Security validation error: {detail}"),
            GateError::Internal(_) => GENERIC_INTERNAL_MESSAGE.to_string(),
            _ => GENERIC_AUTH_MESSAGE.to_string(),
        };
        (self.status_code(), Json(GateErrorBody { error: message })).into_response()
    }
}

impl From<StoreError> for GateError {
    fn from(err: StoreError) -> Self {
        GateError::Internal(err.to_string())
    }
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        self.to_response(false)
    }
}
