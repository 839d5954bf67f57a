// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Challenge token repository.
//!
//! Async facade over [`GateDatabase`] used by the issuer, the gate and the
//! revocation command. Every call runs on the blocking pool and is bounded
//! by the configured store timeout.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::database::{GateDatabase, PurgeStats, StoreError, StoreResult};
use super::run_blocking;
use crate::models::ChallengeToken;

/// Durable lookup and revocation of challenge tokens.
#[derive(Clone)]
pub struct ChallengeTokenStore {
    db: Arc<GateDatabase>,
    timeout: Duration,
}

impl ChallengeTokenStore {
    pub fn new(db: Arc<GateDatabase>, timeout: Duration) -> Self {
        Self { db, timeout }
    }

    pub async fn insert(&self, token: ChallengeToken) -> StoreResult<ChallengeToken> {
        let db = self.db.clone();
        run_blocking(self.timeout, move || {
            db.insert_token(&token)?;
            Ok(token)
        })
        .await
    }

    /// Fetch a token by public value; `StoreError::NotFound` if unknown.
    pub async fn lookup(&self, public_token: &str) -> StoreResult<ChallengeToken> {
        let db = self.db.clone();
        let key = public_token.to_string();
        run_blocking(self.timeout, move || {
            db.get_token(&key)?.ok_or_else(|| {
                StoreError::NotFound(format!(
                    "challenge token {}...",
                    crate::models::log_prefix(&key)
                ))
            })
        })
        .await
    }

    /// Administrative revocation. Permanent.
    pub async fn revoke(&self, public_token: &str) -> StoreResult<ChallengeToken> {
        let db = self.db.clone();
        let key = public_token.to_string();
        let token = run_blocking(self.timeout, move || db.revoke_token(&key)).await?;
        tracing::info!(token = %token.short(), "Challenge token revoked");
        Ok(token)
    }

    /// Remove expired tokens and nonces. Housekeeping only.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<PurgeStats> {
        let db = self.db.clone();
        run_blocking(self.timeout, move || db.purge_expired(now)).await
    }

    pub async fn ping(&self) -> StoreResult<()> {
        let db = self.db.clone();
        run_blocking(self.timeout, move || db.ping()).await
    }
}
