// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::{Method, Uri},
    Json,
};

use crate::auth::Signed;
use crate::models::{log_prefix, VerifiedResponse};

/// Signed echo: returns what the gate authenticated.
///
/// Lets client developers check their signing code against a live server.
#[utoipa::path(
    method(get, post),
    path = "/api/security/verify/",
    tag = "Security",
    params(
        ("X-Api-Challenge-Token" = String, Header, description = "Public challenge token"),
        ("X-Api-Timestamp" = String, Header, description = "Unix seconds"),
        ("X-Api-Nonce" = String, Header, description = "Single-use nonce"),
        ("X-Api-Signature" = String, Header, description = "Hex HMAC-SHA256 signature")
    ),
    responses(
        (status = 200, description = "Request signature is valid", body = VerifiedResponse),
        (status = 401, description = "Request authentication failed")
    )
)]
pub async fn verify_signed(Signed(auth): Signed, method: Method, uri: Uri) -> Json<VerifiedResponse> {
    Json(VerifiedResponse {
        status: "ok".to_string(),
        token_prefix: log_prefix(&auth.token).to_string(),
        method: method.to_string(),
        path: uri.path().to_string(),
    })
}
