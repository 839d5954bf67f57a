// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{env, net::SocketAddr, path::Path, process::ExitCode, time::Duration};

use api_request_gate::{
    api::router,
    config::{GateConfig, ADMIN_KEY_ENV, LOG_FORMAT_ENV, TLS_CERT_PATH_ENV, TLS_KEY_PATH_ENV},
    models::log_prefix,
    state::AppState,
    storage::{Housekeeper, StoreError},
};
use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return ExitCode::SUCCESS;
    }

    let config = GateConfig::from_env();
    let state = match AppState::open(config) {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "Failed to open gate database");
            return ExitCode::FAILURE;
        }
    };

    match args.first().map(String::as_str) {
        None => {}
        Some("revoke") => return revoke(&state, args.get(1).map(String::as_str)).await,
        Some(other) => {
            eprintln!("Unknown command: {other}");
            print_help();
            return ExitCode::FAILURE;
        }
    }

    match serve(state).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server failed");
            ExitCode::FAILURE
        }
    }
}

async fn serve(state: AppState) -> Result<(), Box<dyn std::error::Error>> {
    let addr = state.config.bind_address()?;

    if state.config.debug {
        warn!("DEBUG enabled: localhost origins accepted, internal errors detailed");
    }
    if state.config.allowed_origin.is_none() && !state.config.debug {
        warn!("FRONTEND_URL not configured, every gated request will be rejected");
    }
    if state.config.admin_key.is_none() {
        info!("{ADMIN_KEY_ENV} not set, admin endpoints disabled");
    }

    let shutdown = CancellationToken::new();
    let housekeeper =
        Housekeeper::new(state.tokens.clone()).with_interval(state.config.housekeeping_interval);
    let housekeeping = tokio::spawn(housekeeper.run(shutdown.clone()));

    let handle = Handle::new();
    let signal_handle = handle.clone();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        signal_shutdown.cancel();
        signal_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
    });

    let tls = tls_config(
        state.config.tls_cert_path.as_deref(),
        state.config.tls_key_path.as_deref(),
    )
    .await?;
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();

    match tls {
        Some(tls) => {
            info!("{NAME} v{VERSION} listening on https://{addr} (docs at /docs)");
            axum_server::bind_rustls(addr, tls)
                .handle(handle)
                .serve(app)
                .await?;
        }
        None => {
            info!("{NAME} v{VERSION} listening on http://{addr} (docs at /docs)");
            axum_server::bind(addr).handle(handle).serve(app).await?;
        }
    }

    shutdown.cancel();
    if let Err(e) = housekeeping.await {
        warn!(error = %e, "Housekeeping task ended abnormally");
    }
    info!("Server stopped");
    Ok(())
}

/// Revoke one challenge token by its public value.
async fn revoke(state: &AppState, public_token: Option<&str>) -> ExitCode {
    let Some(public_token) = public_token.filter(|t| !t.is_empty()) else {
        eprintln!("Usage: {NAME} revoke <public-token>");
        return ExitCode::FAILURE;
    };

    match state.tokens.revoke(public_token).await {
        Ok(token) => {
            println!("Revoked challenge token {}...", token.short());
            ExitCode::SUCCESS
        }
        Err(StoreError::NotFound(_)) => {
            eprintln!("No challenge token {}...", log_prefix(public_token));
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(error = %e, "Failed to revoke challenge token");
            ExitCode::FAILURE
        }
    }
}

/// TLS is enabled when both certificate and key paths are configured.
async fn tls_config(cert: Option<&Path>, key: Option<&Path>) -> std::io::Result<Option<RustlsConfig>> {
    match (cert, key) {
        (Some(cert), Some(key)) => {
            // Install the ring crypto provider for rustls (must be done before any TLS operations)
            if rustls::crypto::ring::default_provider()
                .install_default()
                .is_err()
            {
                warn!("rustls crypto provider already installed");
            }
            RustlsConfig::from_pem_file(cert, key).await.map(Some)
        }
        (None, None) => Ok(None),
        _ => {
            warn!("Only one of {TLS_CERT_PATH_ENV}/{TLS_KEY_PATH_ENV} set, serving plain HTTP");
            Ok(None)
        }
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    let format = env::var(LOG_FORMAT_ENV).unwrap_or_default();
    if format.eq_ignore_ascii_case("json") {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty())
            .init();
    }
}

fn print_help() {
    println!(
        r#"{NAME} {VERSION}
Challenge-token issuance and request-signing gate.

USAGE:
    {NAME}                          Run the HTTP server
    {NAME} revoke <public-token>    Revoke a challenge token

The server holds an exclusive lock on the database, so `revoke` only
works while it is stopped. A running server revokes through
POST /admin/security/tokens/{{token}}/revoke/ with the X-Admin-Key header.

ENVIRONMENT:
    HOST, PORT                         Bind address [default: 0.0.0.0:8080]
    DATA_DIR                           Database directory [default: /data]
    FRONTEND_URL                       Allowed frontend origin
    DEBUG                              Non-production mode
    API_CHALLENGE_TOKEN_EXPIRY         Token lifetime in seconds [default: 300]
    API_REQUEST_TIMESTAMP_TOLERANCE    Clock skew tolerance in seconds [default: 60]
    API_GATE_ADMIN_KEY                 Admin endpoint credential [default: disabled]
    HOUSEKEEPING_INTERVAL_SECS         Expired-record purge interval [default: 300]
    TLS_CERT_PATH, TLS_KEY_PATH        PEM files enabling HTTPS
    LOG_FORMAT                         `json` or `pretty` [default: pretty]
"#
    );
}
