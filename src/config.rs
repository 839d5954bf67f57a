// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names, default values and the
//! [`GateConfig`] passed into the gate at construction time. Configuration is
//! loaded from the environment once at startup; nothing reads it from
//! ambient state afterwards.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `API_CHALLENGE_TOKEN_EXPIRY` | Challenge token TTL in seconds | `300` |
//! | `API_REQUEST_TIMESTAMP_TOLERANCE` | Allowed clock skew in seconds | `60` |
//! | `FRONTEND_URL` | The single allowed request origin | unset |
//! | `DEBUG` | Non-production mode (`true`/`1`) | `false` |
//! | `API_GATE_EXEMPT_PATHS` | Comma-separated exact paths that bypass the gate | see [`DEFAULT_EXEMPT_PATHS`] |
//! | `API_GATE_EXEMPT_PREFIXES` | Comma-separated path prefixes that bypass the gate | see [`DEFAULT_EXEMPT_PREFIXES`] |
//! | `API_GATE_STORE_TIMEOUT_MS` | Upper bound for one store operation | `2000` |
//! | `API_GATE_MAX_BODY_BYTES` | Largest body the gate buffers for hashing | `1048576` |
//! | `NONCE_CACHE_CAPACITY` | Entries kept in the nonce LRU cache | `10000` |
//! | `DATA_DIR` | Directory holding `gate.redb` | `/data` |
//! | `API_GATE_ADMIN_KEY` | Credential for the `/admin/` endpoints; unset disables them | unset |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM certificate chain and key for HTTPS | unset |
//! | `HOUSEKEEPING_INTERVAL_SECS` | Interval of the expired-record purge | `300` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::fmt;
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

pub const TOKEN_EXPIRY_ENV: &str = "API_CHALLENGE_TOKEN_EXPIRY";
pub const TIMESTAMP_TOLERANCE_ENV: &str = "API_REQUEST_TIMESTAMP_TOLERANCE";
pub const FRONTEND_URL_ENV: &str = "FRONTEND_URL";
pub const DEBUG_ENV: &str = "DEBUG";
pub const EXEMPT_PATHS_ENV: &str = "API_GATE_EXEMPT_PATHS";
pub const EXEMPT_PREFIXES_ENV: &str = "API_GATE_EXEMPT_PREFIXES";
pub const STORE_TIMEOUT_ENV: &str = "API_GATE_STORE_TIMEOUT_MS";
pub const MAX_BODY_BYTES_ENV: &str = "API_GATE_MAX_BODY_BYTES";
pub const NONCE_CACHE_CAPACITY_ENV: &str = "NONCE_CACHE_CAPACITY";
pub const HOUSEKEEPING_INTERVAL_ENV: &str = "HOUSEKEEPING_INTERVAL_SECS";
pub const ADMIN_KEY_ENV: &str = "API_GATE_ADMIN_KEY";
pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Environment variable name for the durable store directory.
///
/// The gate database is created as `gate.redb` inside this directory.
///
/// # Default
/// `/data`
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const DEFAULT_TOKEN_TTL_SECS: u64 = 300;
pub const DEFAULT_TIMESTAMP_TOLERANCE_SECS: u64 = 60;

/// Lower bound for how long a consumed nonce is retained.
pub const MIN_NONCE_RETENTION_SECS: u64 = 300;

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(2000);
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
pub const DEFAULT_NONCE_CACHE_CAPACITY: usize = 10_000;
pub const DEFAULT_DATA_DIR: &str = "/data";
pub const DEFAULT_HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

/// Path of the token issuance endpoint.
pub const CHALLENGE_PATH: &str = "/api/security/challenge/";

/// Only paths below this prefix are subject to request signing.
pub const PROTECTED_PREFIX: &str = "/api/";

pub const DEFAULT_EXEMPT_PATHS: &[&str] = &[CHALLENGE_PATH, "/admin/", "/health/", "/api/"];
pub const DEFAULT_EXEMPT_PREFIXES: &[&str] = &["/admin/", "/static/", "/media/"];

/// Path segments whose endpoints carry their own signature scheme
/// (payment-processor webhooks).
pub const DEFAULT_EXEMPT_SEGMENTS: &[&str] = &["/webhook/"];

/// Shared credential guarding the admin endpoints.
///
/// Debug output never shows the value.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminKey(String);

impl AdminKey {
    /// `None` for an empty or whitespace-only value.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into().trim().to_string();
        (!value.is_empty()).then_some(Self(value))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AdminKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AdminKey(<redacted>)")
    }
}

/// Configuration of the request gate and its collaborators.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Lifetime of an issued challenge token.
    pub token_ttl: Duration,
    /// Accepted distance between the request timestamp and server time.
    pub timestamp_tolerance: Duration,
    /// The configured frontend origin (`scheme://host[:port]`).
    pub allowed_origin: Option<String>,
    /// Non-production mode: localhost origins, permissive missing origin,
    /// detailed internal errors.
    pub debug: bool,
    pub exempt_paths: Vec<String>,
    pub exempt_prefixes: Vec<String>,
    pub exempt_segments: Vec<String>,
    pub protected_prefix: String,
    /// Bound on every durable store or cache operation; exceeded means reject.
    pub store_timeout: Duration,
    pub max_body_bytes: usize,
    pub nonce_cache_capacity: usize,
    pub data_dir: PathBuf,
    /// Credential for the admin endpoints; `None` disables them.
    pub admin_key: Option<AdminKey>,
    pub host: String,
    pub port: u16,
    pub housekeeping_interval: Duration,
    pub tls_cert_path: Option<PathBuf>,
    pub tls_key_path: Option<PathBuf>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            token_ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_SECS),
            timestamp_tolerance: Duration::from_secs(DEFAULT_TIMESTAMP_TOLERANCE_SECS),
            allowed_origin: None,
            debug: false,
            exempt_paths: to_owned_list(DEFAULT_EXEMPT_PATHS),
            exempt_prefixes: to_owned_list(DEFAULT_EXEMPT_PREFIXES),
            exempt_segments: to_owned_list(DEFAULT_EXEMPT_SEGMENTS),
            protected_prefix: PROTECTED_PREFIX.to_string(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            nonce_cache_capacity: DEFAULT_NONCE_CACHE_CAPACITY,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            admin_key: None,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            housekeeping_interval: DEFAULT_HOUSEKEEPING_INTERVAL,
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl GateConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let non_empty = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let allowed_origin = non_empty(FRONTEND_URL_ENV);

        let housekeeping_interval = match parse_or(
            &lookup,
            HOUSEKEEPING_INTERVAL_ENV,
            DEFAULT_HOUSEKEEPING_INTERVAL.as_secs(),
        ) {
            0 => {
                warn!(
                    variable = HOUSEKEEPING_INTERVAL_ENV,
                    "Interval must be positive, using default"
                );
                DEFAULT_HOUSEKEEPING_INTERVAL
            }
            secs => Duration::from_secs(secs),
        };

        let debug = lookup(DEBUG_ENV)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);

        Self {
            token_ttl: Duration::from_secs(parse_or(
                &lookup,
                TOKEN_EXPIRY_ENV,
                DEFAULT_TOKEN_TTL_SECS,
            )),
            timestamp_tolerance: Duration::from_secs(parse_or(
                &lookup,
                TIMESTAMP_TOLERANCE_ENV,
                DEFAULT_TIMESTAMP_TOLERANCE_SECS,
            )),
            allowed_origin,
            debug,
            exempt_paths: lookup(EXEMPT_PATHS_ENV)
                .map(|v| split_list(&v))
                .unwrap_or(defaults.exempt_paths),
            exempt_prefixes: lookup(EXEMPT_PREFIXES_ENV)
                .map(|v| split_list(&v))
                .unwrap_or(defaults.exempt_prefixes),
            exempt_segments: defaults.exempt_segments,
            protected_prefix: defaults.protected_prefix,
            store_timeout: Duration::from_millis(parse_or(
                &lookup,
                STORE_TIMEOUT_ENV,
                DEFAULT_STORE_TIMEOUT.as_millis() as u64,
            )),
            max_body_bytes: parse_or(&lookup, MAX_BODY_BYTES_ENV, DEFAULT_MAX_BODY_BYTES),
            nonce_cache_capacity: parse_or(
                &lookup,
                NONCE_CACHE_CAPACITY_ENV,
                DEFAULT_NONCE_CACHE_CAPACITY,
            ),
            data_dir: lookup(DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            admin_key: lookup(ADMIN_KEY_ENV).and_then(AdminKey::new),
            host: non_empty(HOST_ENV).unwrap_or(defaults.host),
            port: parse_or(&lookup, PORT_ENV, DEFAULT_PORT),
            housekeeping_interval,
            tls_cert_path: non_empty(TLS_CERT_PATH_ENV).map(PathBuf::from),
            tls_key_path: non_empty(TLS_KEY_PATH_ENV).map(PathBuf::from),
        }
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    pub fn with_timestamp_tolerance(mut self, tolerance: Duration) -> Self {
        self.timestamp_tolerance = tolerance;
        self
    }

    pub fn with_allowed_origin(mut self, origin: impl Into<String>) -> Self {
        self.allowed_origin = Some(origin.into());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_admin_key(mut self, key: impl Into<String>) -> Self {
        self.admin_key = AdminKey::new(key);
        self
    }

    /// Socket address the server binds, from `host` and `port`.
    pub fn bind_address(&self) -> Result<SocketAddr, AddrParseError> {
        Ok(SocketAddr::new(self.host.parse()?, self.port))
    }

    /// How long a consumed nonce is retained: the token TTL, but never less
    /// than [`MIN_NONCE_RETENTION_SECS`].
    pub fn nonce_retention(&self) -> Duration {
        self.token_ttl
            .max(Duration::from_secs(MIN_NONCE_RETENTION_SECS))
    }

    /// Path of the redb file inside the data directory.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("gate.redb")
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr + Copy,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                warn!(variable = key, value = %raw, "Ignoring malformed configuration value");
                default
            }
        },
        None => default,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn to_owned_list(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
