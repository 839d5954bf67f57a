// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Request Signing Authentication
//!
//! Challenge/response authentication for the JSON API, replacing session
//! cookies and CSRF tokens.
//!
//! ## Auth Flow
//!
//! 1. Client calls `POST /api/security/challenge/` and receives
//!    `(token, secret, expires_at)`
//! 2. For every protected call the client sends:
//!    - `X-Api-Challenge-Token`: the public token
//!    - `X-Api-Timestamp`: Unix seconds
//!    - `X-Api-Nonce`: a fresh random value
//!    - `X-Api-Signature`: hex `HMAC-SHA256(secret, token|timestamp|nonce|METHOD|path|sha256(body))`
//! 3. The gate checks origin, headers, token validity, timestamp window,
//!    nonce freshness and signature, in that order
//!
//! ## Security
//!
//! - Tokens expire after `API_CHALLENGE_TOKEN_EXPIRY` seconds (default 300)
//! - Clock skew tolerance is `API_REQUEST_TIMESTAMP_TOLERANCE` (default 60)
//! - Nonces are single use across all tokens
//! - Signatures are compared in constant time
//! - All authentication failures produce the same 401 body

pub mod admin;
pub mod error;
pub mod extractor;
pub mod gate;
pub mod issuer;
pub mod middleware;
pub mod nonce;
pub mod origin;
pub mod signature;
pub mod timestamp;

pub use admin::AdminOnly;
pub use error::GateError;
pub use extractor::Signed;
pub use gate::{AuthenticatedRequest, GateDecision, GateRequest, RequestGate};
pub use issuer::{ChallengeTokenIssuer, IssuedToken};
pub use middleware::gate_middleware;
pub use nonce::{NonceGuard, NonceStatus};
