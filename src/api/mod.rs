// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{
        gate::{NONCE_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER, TOKEN_HEADER},
        gate_middleware,
        origin::normalize_origin,
    },
    config::{GateConfig, CHALLENGE_PATH},
    models::{
        ApiIndexResponse, ChallengeResponse, HealthResponse, RevokedTokenResponse, VerifiedResponse,
    },
    state::AppState,
};

pub mod admin;
pub mod challenge;
pub mod health;
pub mod verify;

/// Path of the signed echo endpoint.
pub const VERIFY_PATH: &str = "/api/security/verify/";

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    let routes = Router::new()
        .route(CHALLENGE_PATH, post(challenge::issue_challenge))
        .route(
            VERIFY_PATH,
            get(verify::verify_signed).post(verify::verify_signed),
        )
        .route("/health/", get(health::health))
        .route("/api/", get(health::api_root))
        .route(admin::REVOKE_TOKEN_PATH, post(admin::revoke_token))
        .with_state(state.clone());

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn_with_state(state, gate_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
            REQUEST_ID_HEADER,
        )))
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static(REQUEST_ID_HEADER),
            MakeRequestUuid,
        ))
        .layer(cors)
}

/// CORS for the configured frontend origin and the signing headers.
///
/// Debug mode without a configured origin is permissive; production without
/// one allows no cross-origin callers.
fn cors_layer(config: &GateConfig) -> CorsLayer {
    let origin = config
        .allowed_origin
        .as_deref()
        .map(normalize_origin)
        .and_then(|o| HeaderValue::from_str(&o).ok());

    let allow_origin = match origin {
        Some(origin) => AllowOrigin::exact(origin),
        None if config.debug => return CorsLayer::permissive(),
        None => {
            warn!("FRONTEND_URL not configured, CORS allows no origins");
            AllowOrigin::list(Vec::<HeaderValue>::new())
        }
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(TOKEN_HEADER),
            HeaderName::from_static(TIMESTAMP_HEADER),
            HeaderName::from_static(NONCE_HEADER),
            HeaderName::from_static(SIGNATURE_HEADER),
        ])
}

#[derive(OpenApi)]
#[openapi(
    paths(
        challenge::issue_challenge,
        verify::verify_signed,
        health::health,
        health::api_root,
        admin::revoke_token
    ),
    components(
        schemas(
            ChallengeResponse,
            VerifiedResponse,
            HealthResponse,
            ApiIndexResponse,
            RevokedTokenResponse
        )
    ),
    tags(
        (name = "Security", description = "Challenge issuance and request signing"),
        (name = "Health", description = "Liveness and endpoint index"),
        (name = "Admin", description = "Operator tooling, guarded by the admin key")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::signature::{hash_body, sign, SigningInput};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use chrono::Utc;
    use serde_json::Value;
    use tower::ServiceExt;

    const FRONTEND: &str = "https://shop.example.com";

    fn app(config: GateConfig) -> (Router, AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::open(config.with_data_dir(dir.path())).unwrap();
        (router(state.clone()), state, dir)
    }

    fn production() -> GateConfig {
        GateConfig::default().with_allowed_origin(FRONTEND)
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn issue(app: &Router) -> (String, String) {
        let response = app
            .clone()
            .oneshot(
                Request::post(CHALLENGE_PATH)
                    .header(header::ORIGIN, FRONTEND)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = json_body(response).await;
        (
            body["token"].as_str().unwrap().to_string(),
            body["secret"].as_str().unwrap().to_string(),
        )
    }

    fn signed_request(
        method: &str,
        path: &str,
        token: &str,
        secret: &str,
        nonce: &str,
        body: &'static [u8],
    ) -> Request<Body> {
        let timestamp = Utc::now().timestamp().to_string();
        let body_hash = hash_body(body);
        let signature = sign(
            secret,
            &SigningInput {
                token,
                timestamp: &timestamp,
                nonce,
                method,
                path,
                body_hash: &body_hash,
            },
        );
        Request::builder()
            .method(method)
            .uri(path)
            .header(header::ORIGIN, FRONTEND)
            .header(TOKEN_HEADER, token)
            .header(TIMESTAMP_HEADER, timestamp)
            .header(NONCE_HEADER, nonce)
            .header(SIGNATURE_HEADER, signature)
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn challenge_returns_token_and_secret() {
        let (app, state, _dir) = app(production());

        let response = app
            .oneshot(
                Request::post(CHALLENGE_PATH)
                    .header(header::ORIGIN, FRONTEND)
                    .header("x-forwarded-for", "203.0.113.7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = json_body(response).await;
        let token = body["token"].as_str().unwrap();
        assert_eq!(token.len(), 43);
        assert_eq!(body["secret"].as_str().unwrap().len(), 43);
        assert!(body["expires_at"].is_string());
        let expires_in = body["expires_in"].as_i64().unwrap();
        assert!((299..=300).contains(&expires_in));

        let stored = state.tokens.lookup(token).await.unwrap();
        assert_eq!(stored.issuing_ip.as_deref(), Some("203.0.113.7"));
    }

    #[tokio::test]
    async fn challenge_from_foreign_origin_is_forbidden_in_production() {
        let (app, _state, _dir) = app(production());

        let response = app
            .oneshot(
                Request::post(CHALLENGE_PATH)
                    .header(header::ORIGIN, "https://evil.example.net")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn challenge_origin_failure_only_logged_in_debug() {
        let (app, _state, _dir) = app(production().with_debug(true));

        let response = app
            .oneshot(
                Request::post(CHALLENGE_PATH)
                    .header(header::ORIGIN, "https://evil.example.net")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn health_and_index_are_open() {
        let (app, _state, _dir) = app(production());

        let response = app
            .clone()
            .oneshot(Request::get("/health/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], health::SERVICE_NAME);

        let response = app
            .oneshot(Request::get("/api/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["endpoints"]["challenge"], CHALLENGE_PATH);
    }

    #[tokio::test]
    async fn unsigned_api_call_is_rejected_with_generic_body() {
        let (app, _state, _dir) = app(production());

        let response = app
            .oneshot(
                Request::get(VERIFY_PATH)
                    .header(header::ORIGIN, FRONTEND)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            json_body(response).await["error"],
            crate::auth::error::GENERIC_AUTH_MESSAGE
        );
    }

    #[tokio::test]
    async fn signed_request_is_echoed() {
        let (app, _state, _dir) = app(production());
        let (token, secret) = issue(&app).await;

        let response = app
            .oneshot(signed_request(
                "POST",
                VERIFY_PATH,
                &token,
                &secret,
                "nonce-echo-1",
                br#"{"hello":"world"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));

        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["method"], "POST");
        assert_eq!(body["path"], VERIFY_PATH);
        assert_eq!(body["token_prefix"], &token[..8]);
    }

    #[tokio::test]
    async fn replayed_signed_request_is_rejected() {
        let (app, _state, _dir) = app(production());
        let (token, secret) = issue(&app).await;

        let first = app
            .clone()
            .oneshot(signed_request("GET", VERIFY_PATH, &token, &secret, "nonce-r", b""))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let replay = app
            .oneshot(signed_request("GET", VERIFY_PATH, &token, &secret, "nonce-r", b""))
            .await
            .unwrap();
        assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let mut config = production();
        config.max_body_bytes = 8;
        let (app, _state, _dir) = app(config);
        let (token, secret) = issue(&app).await;

        let response = app
            .oneshot(signed_request(
                "POST",
                VERIFY_PATH,
                &token,
                &secret,
                "nonce-big",
                b"0123456789abcdef",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn preflight_passes_without_signature() {
        let (app, _state, _dir) = app(production());

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri(VERIFY_PATH)
                    .header(header::ORIGIN, FRONTEND)
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .header(header::ACCESS_CONTROL_REQUEST_HEADERS, TOKEN_HEADER)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(response.status().is_success());
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            FRONTEND
        );
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let (app, _state, _dir) = app(production());

        let response = app
            .oneshot(
                Request::get("/api-doc/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert!(body["paths"].get(CHALLENGE_PATH).is_some());
        assert!(body["paths"][VERIFY_PATH].get("get").is_some());
        assert!(body["paths"][VERIFY_PATH].get("post").is_some());
        assert!(body["paths"]
            .get("/admin/security/tokens/{token}/revoke/")
            .is_some());
    }

    fn revoke_request(token: &str, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::post(format!("/admin/security/tokens/{token}/revoke/"));
        if let Some(key) = key {
            builder = builder.header(crate::auth::admin::ADMIN_KEY_HEADER, key);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn admin_revocation_marks_token() {
        let (app, state, _dir) = app(production().with_admin_key("admin-secret"));
        let (token, _secret) = issue(&app).await;

        let response = app
            .clone()
            .oneshot(revoke_request(&token, Some("admin-secret")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "revoked");
        assert_eq!(body["token_prefix"], &token[..8]);

        assert!(state.tokens.lookup(&token).await.unwrap().revoked);

        let response = app
            .oneshot(revoke_request("no-such-token", Some("admin-secret")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn admin_revocation_requires_the_key() {
        let (app, state, _dir) = app(production().with_admin_key("admin-secret"));
        let (token, _secret) = issue(&app).await;

        for key in [None, Some("wrong-key")] {
            let response = app.clone().oneshot(revoke_request(&token, key)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        }
        assert!(!state.tokens.lookup(&token).await.unwrap().revoked);
    }

    #[tokio::test]
    async fn admin_revocation_is_disabled_without_a_key() {
        let (app, state, _dir) = app(production());
        let (token, _secret) = issue(&app).await;

        let response = app
            .oneshot(revoke_request(&token, Some("anything")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(!state.tokens.lookup(&token).await.unwrap().revoked);
    }
}
