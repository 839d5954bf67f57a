// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Single-use nonce registry for replay prevention.
//!
//! The LRU cache is consulted first and can only ever refuse. Acceptance is
//! decided by one write transaction against redb that inserts the nonce iff
//! its value is absent, so concurrent requests carrying the same nonce get
//! exactly one `Accepted`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::models::{log_prefix, NonceRecord};
use crate::storage::{run_blocking, GateDatabase, NonceCache, StoreResult};

/// Outcome of a registration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceStatus {
    Accepted,
    AlreadyUsed,
}

/// Atomic use-once registry for request nonces.
///
/// Uniqueness is global: a nonce value consumed under one token cannot be
/// reused under another.
pub struct NonceGuard {
    db: Arc<GateDatabase>,
    cache: NonceCache,
    timeout: Duration,
}

impl NonceGuard {
    pub fn new(db: Arc<GateDatabase>, cache: NonceCache, timeout: Duration) -> Self {
        Self { db, cache, timeout }
    }

    /// Register `nonce` under `token_ref` unless it was used before.
    ///
    /// Store failures propagate; callers must treat them as a rejection.
    pub async fn register_if_unused(
        &self,
        token_ref: &str,
        nonce: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> StoreResult<NonceStatus> {
        if self.cache.contains(nonce) {
            warn!(nonce = %log_prefix(nonce), "Nonce reused (cache)");
            return Ok(NonceStatus::AlreadyUsed);
        }

        let record = NonceRecord::new(
            nonce.to_string(),
            token_ref.to_string(),
            now,
            chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX),
        );
        let db = self.db.clone();
        let inserted = run_blocking(self.timeout, move || db.insert_nonce_if_absent(&record)).await?;

        if !inserted {
            warn!(nonce = %log_prefix(nonce), "Nonce reused (store)");
            return Ok(NonceStatus::AlreadyUsed);
        }

        self.cache.insert(nonce, ttl);
        debug!(nonce = %log_prefix(nonce), cached = self.cache.len(), "Nonce registered");
        Ok(NonceStatus::Accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(300);

    fn guard() -> (Arc<NonceGuard>, Arc<GateDatabase>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(GateDatabase::open(&dir.path().join("nonce.redb")).unwrap());
        let guard = NonceGuard::new(db.clone(), NonceCache::new(100), Duration::from_secs(2));
        (Arc::new(guard), db, dir)
    }

    #[tokio::test]
    async fn first_use_accepted_second_refused() {
        let (guard, _db, _dir) = guard();
        let now = Utc::now();
        assert_eq!(
            guard.register_if_unused("tok", "n1", TTL, now).await.unwrap(),
            NonceStatus::Accepted
        );
        assert_eq!(
            guard.register_if_unused("tok", "n1", TTL, now).await.unwrap(),
            NonceStatus::AlreadyUsed
        );
    }

    #[tokio::test]
    async fn uniqueness_spans_tokens() {
        let (guard, _db, _dir) = guard();
        let now = Utc::now();
        guard.register_if_unused("tok-a", "shared", TTL, now).await.unwrap();
        assert_eq!(
            guard.register_if_unused("tok-b", "shared", TTL, now).await.unwrap(),
            NonceStatus::AlreadyUsed
        );
    }

    #[tokio::test]
    async fn cache_miss_falls_back_to_store() {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(GateDatabase::open(&dir.path().join("nonce.redb")).unwrap());
        let now = Utc::now();

        // Two guards over one database model two processes with separate caches.
        let first = NonceGuard::new(db.clone(), NonceCache::new(100), Duration::from_secs(2));
        let second = NonceGuard::new(db.clone(), NonceCache::new(100), Duration::from_secs(2));

        assert_eq!(
            first.register_if_unused("tok", "n1", TTL, now).await.unwrap(),
            NonceStatus::Accepted
        );
        assert_eq!(
            second.register_if_unused("tok", "n1", TTL, now).await.unwrap(),
            NonceStatus::AlreadyUsed
        );
    }

    #[tokio::test]
    async fn accepted_nonce_is_cached() {
        let (guard, _db, _dir) = guard();
        guard.register_if_unused("tok", "n1", TTL, Utc::now()).await.unwrap();
        assert_eq!(guard.cache.len(), 1);
        assert!(guard.cache.contains("n1"));
    }

    #[tokio::test]
    async fn records_expiry_and_token_ref() {
        let (guard, db, _dir) = guard();
        let now = Utc::now();
        guard.register_if_unused("tok-x", "n9", TTL, now).await.unwrap();

        let record = db.get_nonce("n9").unwrap().unwrap();
        assert_eq!(record.token_ref, "tok-x");
        assert_eq!(record.expires_at, now + chrono::Duration::seconds(300));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registrations_have_one_winner() {
        let (guard, _db, _dir) = guard();
        let now = Utc::now();

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let guard = guard.clone();
                tokio::spawn(async move {
                    guard
                        .register_if_unused(&format!("tok-{i}"), "race", TTL, now)
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut accepted = 0;
        for task in tasks {
            if task.await.unwrap() == NonceStatus::Accepted {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
    }
}
