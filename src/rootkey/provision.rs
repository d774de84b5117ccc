// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Root key provisioning.
//!
//! ## Strategy
//!
//! 1. Create a never-expiring key, with the global `createBucket`
//!    capability when global permissions are requested. Failure here aborts.
//! 2. Without global permissions, stop: no grants are attempted.
//! 3. List every bucket. If that fails the key is still returned, with a
//!    warning and zero grants.
//! 4. Grant `{read, write, owner}` on each bucket concurrently and report
//!    every outcome.
//!
//! The created key is never rolled back. A key that reaches some buckets is
//! returned with a warning saying how many grants failed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use super::fanout::{grant_full_access, Outcome};
use crate::garage::{
    CreateKeyRequest, Credential, CredentialStore, CredentialStoreError, ErrorDetail,
    KeyPermissions,
};

/// Provisioning request.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRequest {
    /// Name of the new access key
    pub name: String,
    /// Grant bucket creation and full access to every existing bucket
    #[serde(default)]
    pub global_permissions: bool,
}

/// Outcome of the grant for one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BucketGrantOutcome {
    pub bucket_id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl From<Outcome<String, ()>> for BucketGrantOutcome {
    fn from(outcome: Outcome<String, ()>) -> Self {
        Self {
            bucket_id: outcome.item,
            success: outcome.result.is_ok(),
            error: outcome.result.as_ref().err().map(ErrorDetail::from),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProvisioningError {
    /// Request rejected before any cluster call.
    #[error("{0}")]
    InvalidRequest(String),

    /// Key creation failed; nothing was created.
    #[error("{0}")]
    CreationFailed(CredentialStoreError),

    /// Key created, bucket list could not be read; no grants attempted.
    #[error("bucket list unavailable: {0}")]
    BucketListUnavailable(CredentialStoreError),

    /// Key created, some grants failed.
    #[error("{}/{} bucket grants failed", .failures.len(), .total)]
    PartialGrantFailure {
        total: usize,
        failures: Vec<BucketGrantOutcome>,
    },
}

impl ProvisioningError {
    /// Whether the key was still created.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidRequest(_) | Self::CreationFailed(_))
    }
}

/// Result of a provisioning run. Never persisted.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProvisioningResult {
    pub credential: Credential,
    /// One entry per bucket listed at provisioning time
    pub per_bucket: Vec<BucketGrantOutcome>,
    /// Present iff the key is not fully provisioned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip)]
    pub degraded: Option<ProvisioningError>,
}

impl ProvisioningResult {
    fn complete(credential: Credential, per_bucket: Vec<BucketGrantOutcome>) -> Self {
        Self {
            credential,
            per_bucket,
            warning: None,
            degraded: None,
        }
    }

    fn degraded(
        credential: Credential,
        per_bucket: Vec<BucketGrantOutcome>,
        issue: ProvisioningError,
    ) -> Self {
        Self {
            credential,
            per_bucket,
            warning: Some(issue.to_string()),
            degraded: Some(issue),
        }
    }

    pub fn failed_grants(&self) -> usize {
        self.per_bucket.iter().filter(|b| !b.success).count()
    }
}

/// Creates root keys and extends them to every bucket.
pub struct RootKeyProvisioner<S> {
    store: Arc<S>,
}

impl<S: CredentialStore> RootKeyProvisioner<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn provision(
        &self,
        request: ProvisionRequest,
    ) -> Result<ProvisioningResult, ProvisioningError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ProvisioningError::InvalidRequest(
                "key name must not be empty".to_string(),
            ));
        }

        let credential = self
            .store
            .create_key(CreateKeyRequest {
                name: name.to_string(),
                never_expires: true,
                allow: request.global_permissions.then_some(KeyPermissions {
                    create_bucket: true,
                }),
            })
            .await
            .map_err(|e| {
                warn!(error = %e, status = ?e.status(), "root key creation failed");
                ProvisioningError::CreationFailed(e)
            })?;

        info!(
            key_id = %credential.id,
            global = request.global_permissions,
            "root key created"
        );

        if !request.global_permissions {
            return Ok(ProvisioningResult::complete(credential, Vec::new()));
        }

        let buckets = match self.store.list_buckets().await {
            Ok(buckets) => buckets,
            Err(e) => {
                warn!(
                    key_id = %credential.id,
                    error = %e,
                    "bucket list unavailable, no grants attempted"
                );
                return Ok(ProvisioningResult::degraded(
                    credential,
                    Vec::new(),
                    ProvisioningError::BucketListUnavailable(e),
                ));
            }
        };

        let total = buckets.len();
        let bucket_ids = buckets.into_iter().map(|b| b.id).collect();
        let per_bucket: Vec<BucketGrantOutcome> =
            grant_full_access(&self.store, &credential.id, bucket_ids)
                .await
                .into_iter()
                .map(BucketGrantOutcome::from)
                .collect();

        let failures: Vec<BucketGrantOutcome> =
            per_bucket.iter().filter(|b| !b.success).cloned().collect();

        if failures.is_empty() {
            info!(key_id = %credential.id, buckets = total, "root key granted on all buckets");
            return Ok(ProvisioningResult::complete(credential, per_bucket));
        }

        for failure in &failures {
            warn!(
                key_id = %credential.id,
                bucket_id = %failure.bucket_id,
                error = failure.error.as_ref().map(|e| e.message.as_str()).unwrap_or_default(),
                "bucket grant failed"
            );
        }

        Ok(ProvisioningResult::degraded(
            credential,
            per_bucket,
            ProvisioningError::PartialGrantFailure { total, failures },
        ))
    }
}
