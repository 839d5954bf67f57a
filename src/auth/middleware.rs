// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum middleware running the request gate.
//!
//! The body is buffered once so it can be hashed from the exact received
//! bytes, then handed on unchanged to the handler.
//!
//! ```rust,ignore
//! let app = Router::new()
//!     .route("/api/orders/", post(create_order))
//!     .layer(axum::middleware::from_fn_with_state(state.clone(), gate_middleware))
//!     .with_state(state);
//! ```

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::warn;

use super::gate::{GateDecision, GateRequest};
use crate::error::ApiError;
use crate::state::AppState;

/// Authenticate every request before it reaches a handler.
pub async fn gate_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let gate = &state.gate;

    // Exempt requests are passed through without buffering the body
    if gate.is_exempt(request.method(), request.uri().path()) {
        return next.run(request).await;
    }

    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, gate.config().max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = parts.uri.path(), error = %e, "Failed to buffer request body");
            return ApiError::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large or unreadable",
            )
            .into_response();
        }
    };

    let decision = gate
        .authenticate(
            &GateRequest {
                method: &parts.method,
                path: parts.uri.path(),
                headers: &parts.headers,
                body: &bytes,
            },
            Utc::now(),
        )
        .await;

    match decision {
        Ok(GateDecision::Allowed(authenticated)) => {
            let mut request = Request::from_parts(parts, Body::from(bytes));
            request.extensions_mut().insert(authenticated);
            next.run(request).await
        }
        Ok(GateDecision::Exempt) => next.run(Request::from_parts(parts, Body::from(bytes))).await,
        Err(err) => err.to_response(gate.config().debug),
    }
}
