// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Storage Console - session auth and root key management for a Garage
//! storage cluster.
//!
//! The console logs a single operator in with an HMAC-signed session
//! cookie, and manages the cluster access key it acts through (the root
//! key): creating it with full access to every bucket, and repairing grants
//! that went missing.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Session tokens, login check, request gate
//! - `garage` - Storage cluster admin API client and in-memory backend
//! - `rootkey` - Root key provisioning, reconciliation and status cache

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod garage;
pub mod rootkey;
pub mod state;
