// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Shared-key guard for the `/admin/` endpoints.
//!
//! Admin routes sit outside the signing gate. They are enabled only when
//! `API_GATE_ADMIN_KEY` is configured and every call must present that key
//! in `X-Admin-Key`.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::config::AdminKey;
use crate::error::ApiError;
use crate::state::AppState;

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

const ADMIN_KEY_CONTEXT: &[u8] = b"api-request-gate/admin-key";

type HmacSha256 = Hmac<Sha256>;

fn keyed_tag(key: &[u8]) -> HmacSha256 {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
    mac.update(ADMIN_KEY_CONTEXT);
    mac
}

/// Constant-time comparison of a presented key against the configured one.
///
/// Both sides are reduced to fixed-length HMAC tags before comparing.
pub fn admin_key_matches(expected: &AdminKey, provided: &str) -> bool {
    let provided = keyed_tag(provided.as_bytes()).finalize().into_bytes();
    keyed_tag(expected.expose().as_bytes())
        .verify_slice(&provided)
        .is_ok()
}

/// Extractor admitting only callers holding the admin key.
///
/// Responds 404 while no key is configured, 401 for a missing or wrong key.
pub struct AdminOnly;

impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.config.admin_key.as_ref() else {
            return Err(ApiError::new(StatusCode::NOT_FOUND, "Not found"));
        };

        let provided = parts
            .headers
            .get(ADMIN_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if provided.is_empty() || !admin_key_matches(expected, provided) {
            warn!(path = %parts.uri.path(), "Admin request with invalid key");
            return Err(ApiError::new(StatusCode::UNAUTHORIZED, "Invalid admin credentials"));
        }

        Ok(AdminOnly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GateConfig;
    use axum::http::Request;

    fn state(config: GateConfig) -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::open(config.with_data_dir(dir.path())).unwrap();
        (state, dir)
    }

    fn parts(key: Option<&str>) -> Parts {
        let mut builder = Request::post("/admin/security/tokens/tok/revoke/");
        if let Some(key) = key {
            builder = builder.header(ADMIN_KEY_HEADER, key);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn key_comparison() {
        let key = AdminKey::new("admin-secret").unwrap();
        assert!(admin_key_matches(&key, "admin-secret"));
        assert!(!admin_key_matches(&key, "admin-secreT"));
        assert!(!admin_key_matches(&key, "admin-secret-longer"));
        assert!(!admin_key_matches(&key, ""));
    }

    #[tokio::test]
    async fn accepts_configured_key() {
        let (state, _dir) = state(GateConfig::default().with_admin_key("admin-secret"));
        let mut parts = parts(Some("admin-secret"));
        assert!(AdminOnly::from_request_parts(&mut parts, &state).await.is_ok());
    }

    #[tokio::test]
    async fn rejects_missing_or_wrong_key() {
        let (state, _dir) = state(GateConfig::default().with_admin_key("admin-secret"));

        for key in [None, Some("wrong"), Some("")] {
            let mut parts = parts(key);
            let err = AdminOnly::from_request_parts(&mut parts, &state)
                .await
                .err()
                .unwrap();
            assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        }
    }

    #[tokio::test]
    async fn disabled_without_configured_key() {
        let (state, _dir) = state(GateConfig::default());
        let mut parts = parts(Some("anything"));
        let err = AdminOnly::from_request_parts(&mut parts, &state)
            .await
            .err()
            .unwrap();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }
}
