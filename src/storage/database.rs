// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Durable gate store backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `challenge_tokens`: public_token → serialized ChallengeToken
//! - `nonces`: nonce value → serialized NonceRecord
//!
//! redb admits one write transaction at a time, so a read-then-insert inside
//! a single write transaction behaves as a unique-constraint insert. Nonce
//! registration relies on this.

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};

use crate::models::{ChallengeToken, NonceRecord};

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: public_token → serialized ChallengeToken (JSON bytes).
const CHALLENGE_TOKENS: TableDefinition<&str, &[u8]> = TableDefinition::new("challenge_tokens");

/// Consumed nonces: nonce value → serialized NonceRecord (JSON bytes).
/// The key is the uniqueness constraint; the namespace is global.
const NONCES: TableDefinition<&str, &[u8]> = TableDefinition::new("nonces");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("store operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("store worker failed: {0}")]
    Worker(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Counts of rows removed by [`GateDatabase::purge_expired`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeStats {
    pub tokens: u64,
    pub nonces: u64,
}

// =============================================================================
// GateDatabase
// =============================================================================

/// Embedded ACID store for challenge tokens and consumed nonces.
pub struct GateDatabase {
    db: Database,
}

impl GateDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(CHALLENGE_TOKENS)?;
            let _ = write_txn.open_table(NONCES)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Cheap readability check used by the health endpoint.
    pub fn ping(&self) -> StoreResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(CHALLENGE_TOKENS)?;
        Ok(())
    }

    // =========================================================================
    // Challenge tokens
    // =========================================================================

    /// Persist a newly issued token. Fails if the public token is taken.
    pub fn insert_token(&self, token: &ChallengeToken) -> StoreResult<()> {
        let json = serde_json::to_vec(token)?;

        let write_txn = self.db.begin_write()?;
        let taken = {
            let mut table = write_txn.open_table(CHALLENGE_TOKENS)?;
            let taken = table.get(token.public_token.as_str())?.is_some();
            if !taken {
                table.insert(token.public_token.as_str(), json.as_slice())?;
            }
            taken
        };
        write_txn.commit()?;

        if taken {
            return Err(StoreError::AlreadyExists(format!(
                "challenge token {}...",
                token.short()
            )));
        }
        Ok(())
    }

    /// Look up a token by its public value.
    pub fn get_token(&self, public_token: &str) -> StoreResult<Option<ChallengeToken>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CHALLENGE_TOKENS)?;
        match table.get(public_token)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Mark a token revoked. Idempotent for already revoked tokens.
    pub fn revoke_token(&self, public_token: &str) -> StoreResult<ChallengeToken> {
        let write_txn = self.db.begin_write()?;
        let token = {
            let mut table = write_txn.open_table(CHALLENGE_TOKENS)?;

            // Read existing value before mutating
            let existing_bytes = match table.get(public_token)? {
                Some(existing) => existing.value().to_vec(),
                None => {
                    return Err(StoreError::NotFound(format!(
                        "challenge token {}...",
                        crate::models::log_prefix(public_token)
                    )))
                }
            };

            let mut token: ChallengeToken = serde_json::from_slice(&existing_bytes)?;
            token.revoked = true;

            let json = serde_json::to_vec(&token)?;
            table.insert(public_token, json.as_slice())?;
            token
        };
        write_txn.commit()?;
        Ok(token)
    }

    // =========================================================================
    // Nonces
    // =========================================================================

    /// Insert the nonce unless its value is already present.
    ///
    /// Returns `true` when this call registered the nonce, `false` when a
    /// record with the same value already existed.
    pub fn insert_nonce_if_absent(&self, record: &NonceRecord) -> StoreResult<bool> {
        let json = serde_json::to_vec(record)?;

        let write_txn = self.db.begin_write()?;
        let inserted = {
            let mut table = write_txn.open_table(NONCES)?;
            if table.get(record.value.as_str())?.is_some() {
                false
            } else {
                table.insert(record.value.as_str(), json.as_slice())?;
                true
            }
        };
        write_txn.commit()?;
        Ok(inserted)
    }

    pub fn get_nonce(&self, value: &str) -> StoreResult<Option<NonceRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(NONCES)?;
        match table.get(value)? {
            Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Housekeeping
    // =========================================================================

    /// Delete tokens and nonces whose `expires_at` lies before `now`.
    ///
    /// Rows that fail to deserialize are kept.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> StoreResult<PurgeStats> {
        let mut stats = PurgeStats::default();

        let write_txn = self.db.begin_write()?;
        {
            let mut tokens = write_txn.open_table(CHALLENGE_TOKENS)?;
            tokens.retain(|_key, value| {
                let expired = serde_json::from_slice::<ChallengeToken>(value)
                    .map(|t| t.is_expired_at(now))
                    .unwrap_or(false);
                if expired {
                    stats.tokens += 1;
                }
                !expired
            })?;

            let mut nonces = write_txn.open_table(NONCES)?;
            nonces.retain(|_key, value| {
                let expired = serde_json::from_slice::<NonceRecord>(value)
                    .map(|n| n.is_expired_at(now))
                    .unwrap_or(false);
                if expired {
                    stats.nonces += 1;
                }
                !expired
            })?;
        }
        write_txn.commit()?;
        Ok(stats)
    }

    /// Open a write transaction and hold it; other writers block until it drops.
    #[cfg(test)]
    pub(crate) fn lock_writes(&self) -> StoreResult<redb::WriteTransaction> {
        Ok(self.db.begin_write()?)
    }
}

// =============================================================================
// Tests
// =============================================================================
