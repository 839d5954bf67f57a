// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! LRU cache of recently consumed nonces.
//!
//! Holds a disposable "seen" flag per nonce value so replays can be refused
//! without touching redb. Never authoritative: a miss says nothing about
//! whether the nonce was used.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

/// In-process LRU cache of seen nonces with a per-entry TTL.
pub struct NonceCache {
    cache: Mutex<LruCache<String, Instant>>,
}

impl NonceCache {
    /// Create a new cache holding at most `capacity` nonces.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Whether the nonce was recorded and has not yet expired.
    ///
    /// A poisoned lock reads as a miss; the durable store still decides.
    pub fn contains(&self, nonce: &str) -> bool {
        let Ok(mut cache) = self.cache.lock() else {
            return false;
        };
        match cache.get(nonce).copied() {
            Some(expires_at) if expires_at > Instant::now() => true,
            Some(_) => {
                // Expired, drop it
                cache.pop(nonce);
                false
            }
            None => false,
        }
    }

    /// Record a nonce as seen for `ttl`.
    pub fn insert(&self, nonce: &str, ttl: Duration) {
        let Some(expires_at) = Instant::now().checked_add(ttl) else {
            return;
        };
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(nonce.to_string(), expires_at);
        }
    }

    /// Entries currently held, expired ones included until touched.
    pub(crate) fn len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}
