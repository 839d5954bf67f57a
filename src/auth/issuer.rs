// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Challenge token issuance.
//!
//! Public token and secret are each 32 bytes from the system CSPRNG, encoded
//! as unpadded URL-safe base64 (43 characters, 256 bits of entropy).

use std::time::Duration;

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{DateTime, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use tracing::info;

use crate::models::ChallengeToken;
use crate::storage::{ChallengeTokenStore, StoreError, StoreResult};

/// Random bytes behind each token and secret.
pub const TOKEN_BYTES: usize = 32;

/// A freshly issued credential as handed to the client.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub public_token: String,
    pub secret: String,
    pub expires_at: DateTime<Utc>,
}

/// Creates and persists new challenge tokens.
#[derive(Clone)]
pub struct ChallengeTokenIssuer {
    store: ChallengeTokenStore,
    ttl: Duration,
    rng: SystemRandom,
}

impl ChallengeTokenIssuer {
    pub fn new(store: ChallengeTokenStore, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            rng: SystemRandom::new(),
        }
    }

    /// Issue a token valid from now.
    pub async fn issue(&self, client_ip: Option<String>) -> StoreResult<IssuedToken> {
        self.issue_at(client_ip, Utc::now()).await
    }

    /// Issue a token created at `now`. One durable write.
    pub async fn issue_at(
        &self,
        client_ip: Option<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<IssuedToken> {
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| StoreError::Worker(format!("token TTL out of range: {e}")))?;

        let token = ChallengeToken::new(
            self.random_string()?,
            self.random_string()?,
            now,
            ttl,
            client_ip,
        );
        let token = self.store.insert(token).await?;

        info!(
            token = %token.short(),
            expires_at = %token.expires_at,
            ip = token.issuing_ip.as_deref().unwrap_or("-"),
            "Challenge token issued"
        );

        Ok(IssuedToken {
            public_token: token.public_token,
            secret: token.secret,
            expires_at: token.expires_at,
        })
    }

    fn random_string(&self) -> StoreResult<String> {
        let mut bytes = [0u8; TOKEN_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| StoreError::Worker("system random source unavailable".to_string()))?;
        Ok(Base64UrlUnpadded::encode_string(&bytes))
    }
}
