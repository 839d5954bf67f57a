// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin endpoints, guarded by [`AdminOnly`] instead of request signing.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::{error, info};

use crate::auth::AdminOnly;
use crate::error::ApiError;
use crate::models::{log_prefix, RevokedTokenResponse};
use crate::state::AppState;
use crate::storage::StoreError;

/// Route of the revocation endpoint.
pub const REVOKE_TOKEN_PATH: &str = "/admin/security/tokens/{token}/revoke/";

/// Revoke a challenge token while the server is running.
///
/// Revocation is permanent; the token fails the gate from the next request on.
#[utoipa::path(
    post,
    path = "/admin/security/tokens/{token}/revoke/",
    tag = "Admin",
    params(
        ("token" = String, Path, description = "Public challenge token"),
        ("X-Admin-Key" = String, Header, description = "Configured admin key")
    ),
    responses(
        (status = 200, description = "Token revoked", body = RevokedTokenResponse),
        (status = 401, description = "Missing or invalid admin key"),
        (status = 404, description = "Unknown token, or admin endpoints disabled")
    )
)]
pub async fn revoke_token(
    _admin: AdminOnly,
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<RevokedTokenResponse>, ApiError> {
    let revoked = state.tokens.revoke(&token).await.map_err(|e| match e {
        StoreError::NotFound(_) => {
            info!(token = %log_prefix(&token), "Admin revocation of unknown token");
            ApiError::new(StatusCode::NOT_FOUND, "No such challenge token")
        }
        other => {
            error!(error = %other, "Admin revocation failed");
            ApiError::internal("Failed to revoke challenge token")
        }
    })?;

    Ok(Json(RevokedTokenResponse {
        status: "revoked".to_string(),
        token_prefix: revoked.short().to_string(),
        expires_at: revoked.expires_at,
    }))
}
