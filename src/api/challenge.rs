// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use chrono::Utc;
use tracing::{error, warn};

use crate::auth::origin::{origin_from_headers, validate_origin};
use crate::error::ApiError;
use crate::models::ChallengeResponse;
use crate::state::AppState;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// First `X-Forwarded-For` entry, else the peer address.
pub(crate) fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

/// Issue a challenge token.
///
/// Entry point of the signing scheme, so it is not itself signed. The secret
/// in the response is never returned again.
#[utoipa::path(
    post,
    path = "/api/security/challenge/",
    tag = "Security",
    responses(
        (status = 201, description = "Challenge token issued", body = ChallengeResponse),
        (status = 403, description = "Origin not allowed"),
        (status = 500, description = "Token could not be issued")
    )
)]
pub async fn issue_challenge(
    State(state): State<AppState>,
    connect_info: Option<Extension<ConnectInfo<SocketAddr>>>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<ChallengeResponse>), ApiError> {
    if let Err(e) = validate_origin(
        origin_from_headers(&headers),
        state.config.allowed_origin.as_deref(),
        state.config.debug,
    ) {
        if !state.config.debug {
            warn!(error = %e, "Challenge request from rejected origin");
            return Err(ApiError::forbidden(e.to_string()));
        }
        warn!(error = %e, "Origin validation failed in debug mode");
    }

    let peer = connect_info.map(|Extension(ConnectInfo(addr))| addr);
    let ip = client_ip(&headers, peer);

    let issued = state.issuer.issue(ip).await.map_err(|e| {
        error!(error = %e, "Failed to issue challenge token");
        ApiError::internal("Failed to generate challenge token")
    })?;

    let expires_in = (issued.expires_at - Utc::now()).num_seconds().max(0);

    Ok((
        StatusCode::CREATED,
        Json(ChallengeResponse {
            token: issued.public_token,
            secret: issued.secret,
            expires_at: issued.expires_at,
            expires_in,
        }),
    ))
}
