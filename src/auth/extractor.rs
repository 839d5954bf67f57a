// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for requests that passed the gate.
//!
//! ```rust,ignore
//! async fn my_handler(Signed(auth): Signed) -> impl IntoResponse {
//!     // auth.token is the public challenge token the request was signed with
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};

use super::{AuthenticatedRequest, GateError};

/// Extractor for gate-authenticated requests.
///
/// Reads the [`AuthenticatedRequest`] the gate middleware attached. A handler
/// mounted without the middleware rejects every request.
pub struct Signed(pub AuthenticatedRequest);

impl<S> FromRequestParts<S> for Signed
where
    S: Send + Sync,
{
    type Rejection = GateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedRequest>()
            .cloned()
            .map(Signed)
            .ok_or(GateError::MissingHeaders)
    }
}
