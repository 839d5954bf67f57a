// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Gate Storage Module
//!
//! Durable and ephemeral state used by the request gate.
//!
//! ## Components
//!
//! - [`GateDatabase`]: redb file holding challenge tokens and consumed
//!   nonces; the single source of truth
//! - [`ChallengeTokenStore`]: async, time-bounded facade over the token table
//! - [`NonceCache`]: in-process LRU of recently seen nonces (pre-filter only)
//! - [`Housekeeper`]: background purge of expired rows, owned by the binary
//!
//! ## Storage Layout
//!
//! ```text
//! $DATA_DIR/
//!   gate.redb
//!     challenge_tokens   public_token -> ChallengeToken (JSON)
//!     nonces             nonce value  -> NonceRecord (JSON)
//! ```
//!
//! redb is synchronous. Async callers go through [`run_blocking`], which moves
//! the call onto tokio's blocking pool and bounds it with a timeout. A timed
//! out call is an error, never a pass.

use std::time::Duration;

pub mod database;
pub mod housekeeping;
pub mod nonce_cache;
pub mod tokens;

pub use database::{GateDatabase, PurgeStats, StoreError, StoreResult};
pub use housekeeping::Housekeeper;
pub use nonce_cache::NonceCache;
pub use tokens::ChallengeTokenStore;

/// Run a synchronous store operation on the blocking pool, bounded by `timeout`.
pub async fn run_blocking<T, F>(timeout: Duration, op: F) -> StoreResult<T>
where
    F: FnOnce() -> StoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(timeout, tokio::task::spawn_blocking(op)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(StoreError::Worker(join_err.to_string())),
        Err(_) => Err(StoreError::Timeout(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_blocking_returns_result() {
        let value = run_blocking(Duration::from_secs(1), || Ok(41 + 1))
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn run_blocking_times_out() {
        let err = run_blocking(Duration::from_millis(10), || {
            std::thread::sleep(Duration::from_millis(200));
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, StoreError::Timeout(_)));
    }

    #[tokio::test]
    async fn run_blocking_reports_panics() {
        let err = run_blocking::<(), _>(Duration::from_secs(1), || panic!("boom"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Worker(_)));
    }
}
