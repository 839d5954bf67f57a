// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use tracing::warn;

use crate::config::CHALLENGE_PATH;
use crate::error::ApiError;
use crate::models::{ApiIndexResponse, HealthResponse};
use crate::state::AppState;

pub const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");

/// Health check endpoint handler.
///
/// Returns 200 when the token store answers, 503 otherwise.
#[utoipa::path(
    get,
    path = "/health/",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Token store unavailable")
    )
)]
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    state.tokens.ping().await.map_err(|e| {
        warn!(error = %e, "Health check: token store unavailable");
        ApiError::unavailable("Token store unavailable")
    })?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        service: SERVICE_NAME.to_string(),
    }))
}

/// API root with the public endpoints.
#[utoipa::path(
    get,
    path = "/api/",
    tag = "Health",
    responses((status = 200, description = "Endpoint index", body = ApiIndexResponse))
)]
pub async fn api_root() -> Json<ApiIndexResponse> {
    let endpoints = BTreeMap::from([
        ("challenge".to_string(), CHALLENGE_PATH.to_string()),
        ("verify".to_string(), super::VERIFY_PATH.to_string()),
        ("health".to_string(), "/health/".to_string()),
        ("docs".to_string(), "/docs".to_string()),
    ]);

    Json(ApiIndexResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints,
    })
}
