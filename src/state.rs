// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{ChallengeTokenIssuer, NonceGuard, RequestGate};
use crate::config::GateConfig;
use crate::storage::{ChallengeTokenStore, GateDatabase, NonceCache, StoreResult};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GateConfig>,
    pub tokens: ChallengeTokenStore,
    pub issuer: ChallengeTokenIssuer,
    pub gate: Arc<RequestGate>,
}

impl AppState {
    /// Open the gate database under `config.data_dir` and wire the components.
    pub fn open(config: GateConfig) -> StoreResult<Self> {
        let db = Arc::new(GateDatabase::open(&config.database_path())?);
        Ok(Self::new(config, db))
    }

    pub fn new(config: GateConfig, db: Arc<GateDatabase>) -> Self {
        let tokens = ChallengeTokenStore::new(db.clone(), config.store_timeout);
        let issuer = ChallengeTokenIssuer::new(tokens.clone(), config.token_ttl);
        let nonces = NonceGuard::new(
            db,
            NonceCache::new(config.nonce_cache_capacity),
            config.store_timeout,
        );
        let gate = RequestGate::new(config.clone(), tokens.clone(), nonces);

        Self {
            config: Arc::new(config),
            tokens,
            issuer,
            gate: Arc::new(gate),
        }
    }
}
