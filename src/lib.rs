// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! API Request Gate - signed challenge/response authentication
//!
//! Issues short-lived challenge tokens (public token + shared secret) and
//! authenticates every call under `/api/` by HMAC signature, timestamp
//! window, single-use nonce and origin.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Token issuance and the request gate
//! - `storage` - Durable token/nonce store (redb) and housekeeping

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod storage;
