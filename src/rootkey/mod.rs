// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Root Key Management
//!
//! The console acts on the user's behalf through one access key with full
//! access to every bucket (the root key).
//!
//! - [`provision`] - create the root key and grant it on every bucket
//! - [`reconcile`] - find buckets where the grant is missing and repair them
//! - [`cache`] - remember that a root key exists, to skip discovery
//! - [`fanout`] - concurrent per-bucket calls with per-item outcomes
//!
//! There is no multi-bucket transaction on the cluster. Partial failures are
//! reported bucket by bucket and never rolled back.

pub mod cache;
pub mod fanout;
pub mod provision;
pub mod reconcile;

pub use cache::{RootKeyConfigCache, RootKeyMarker};
pub use provision::{
    BucketGrantOutcome, ProvisionRequest, ProvisioningError, ProvisioningResult,
    RootKeyProvisioner,
};
pub use reconcile::{
    BucketGrantStatus, PermissionReconciler, ReconciliationError, ReconciliationReport,
    RemediationReport,
};
