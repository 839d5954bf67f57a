// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Expired Record Housekeeping
//!
//! Background task that periodically deletes expired challenge tokens and
//! nonces from the gate database. Correctness of the gate does not depend on
//! it: expired tokens are refused on lookup and a purged nonce can no longer
//! pass the timestamp window. It only keeps the database from growing.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::ChallengeTokenStore;
use crate::config::DEFAULT_HOUSEKEEPING_INTERVAL;

/// Periodic purge of expired gate records.
pub struct Housekeeper {
    store: ChallengeTokenStore,
    interval: Duration,
}

impl Housekeeper {
    pub fn new(store: ChallengeTokenStore) -> Self {
        Self {
            store,
            interval: DEFAULT_HOUSEKEEPING_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run the purge loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(housekeeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Gate housekeeping starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Gate housekeeping shutting down");
                    return;
                }
            }

            self.sweep().await;
        }
    }

    /// Execute one purge pass.
    pub async fn sweep(&self) {
        match self.store.purge_expired(Utc::now()).await {
            Ok(stats) if stats.tokens > 0 || stats.nonces > 0 => {
                info!(
                    tokens = stats.tokens,
                    nonces = stats.nonces,
                    "Housekeeping: purged expired records"
                );
            }
            Ok(_) => debug!("Housekeeping: nothing to purge"),
            Err(e) => warn!(error = %e, "Housekeeping: purge failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChallengeToken;
    use crate::storage::GateDatabase;
    use std::sync::Arc;

    #[tokio::test]
    async fn sweep_purges_expired_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(GateDatabase::open(&dir.path().join("hk.redb")).unwrap());
        let store = ChallengeTokenStore::new(db, Duration::from_secs(2));

        let stale = ChallengeToken::new(
            "stale".into(),
            "s".into(),
            Utc::now() - chrono::Duration::seconds(3600),
            chrono::Duration::seconds(300),
            None,
        );
        store.insert(stale).await.unwrap();

        Housekeeper::new(store.clone()).sweep().await;
        assert!(store.lookup("stale").await.is_err());
    }

    #[tokio::test]
    async fn run_stops_on_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(GateDatabase::open(&dir.path().join("hk.redb")).unwrap());
        let store = ChallengeTokenStore::new(db, Duration::from_secs(2));

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(
            Housekeeper::new(store)
                .with_interval(Duration::from_secs(3600))
                .run(shutdown.clone()),
        );
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("housekeeper should stop")
            .unwrap();
    }
}
