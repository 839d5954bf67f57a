// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request origin validation.
//!
//! The browser-supplied `Origin` (or, failing that, `Referer`) must match the
//! single configured frontend origin after both sides are reduced to
//! `scheme://host[:port]` without trailing slashes.

use axum::http::{header, HeaderMap};
use tracing::warn;
use url::Url;

use super::GateError;

/// Development frontends accepted in non-production mode.
pub const LOCALHOST_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://127.0.0.1:3000",
    "http://localhost:5173",
    "http://127.0.0.1:5173",
];

/// The `Origin` header if present and non-empty, else `Referer`.
pub fn origin_from_headers(headers: &HeaderMap) -> Option<&str> {
    [header::ORIGIN, header::REFERER]
        .iter()
        .filter_map(|name| headers.get(name))
        .filter_map(|value| value.to_str().ok())
        .find(|value| !value.trim().is_empty())
}

/// Reduce a URL-ish value to `scheme://host[:port]`, without trailing slash.
pub fn normalize_origin(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("http") {
        if let Ok(url) = Url::parse(trimmed) {
            let origin = url.origin();
            if origin.is_tuple() {
                return origin.ascii_serialization();
            }
        }
    }
    trimmed.trim_end_matches('/').to_string()
}

/// Check the request origin against the configured frontend origin.
///
/// With no allowed origin configured the check passes with a warning in
/// debug mode and fails closed otherwise.
pub fn validate_origin(
    presented: Option<&str>,
    allowed: Option<&str>,
    debug: bool,
) -> Result<(), GateError> {
    let Some(allowed) = allowed.filter(|a| !a.trim().is_empty()) else {
        if debug {
            warn!("FRONTEND_URL not configured, allowing all origins in debug mode");
            return Ok(());
        }
        return Err(GateError::OriginRejected(
            "no allowed origin configured".to_string(),
        ));
    };

    let origin = normalize_origin(presented.unwrap_or_default());
    let expected = normalize_origin(allowed);

    if origin == expected {
        return Ok(());
    }

    if debug && LOCALHOST_ORIGINS.contains(&origin.as_str()) {
        return Ok(());
    }

    Err(GateError::OriginRejected(if origin.is_empty() {
        "missing origin".to_string()
    } else {
        origin
    }))
}
