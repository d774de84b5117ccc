// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Permission drift detection and repair for root keys.
//!
//! A scan reads every bucket's detail and checks that the credential holds
//! `{read, write, owner}` there. Remediation issues the full grant on exactly
//! the buckets that lack it, then scans again. When nothing is missing no
//! mutating call is made, so running it twice in a row is a no-op the
//! second time.
//!
//! A credential is a root candidate iff it has the global `createBucket`
//! capability. With several candidates, the one with the most bucket grants
//! wins, ties broken by the lowest id.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use super::fanout::{fan_out, grant_full_access};
use super::provision::BucketGrantOutcome;
use crate::garage::{
    BucketPermissions, BucketSummary, Credential, CredentialStore, CredentialStoreError,
    ErrorDetail,
};

#[derive(Debug, Clone, thiserror::Error)]
pub enum ReconciliationError {
    #[error("credential list unavailable: {0}")]
    KeyEnumerationFailed(CredentialStoreError),

    #[error("bucket list unavailable: {0}")]
    BucketEnumerationFailed(CredentialStoreError),

    /// The credential to reconcile could not be read.
    #[error("{0}")]
    CredentialLookupFailed(CredentialStoreError),

    #[error("no root key found")]
    NoRootCandidate,
}

/// Grant state of one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BucketGrantStatus {
    pub bucket_id: String,
    #[serde(default)]
    pub global_aliases: Vec<String>,
    /// Permissions the bucket lists for the credential, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<BucketPermissions>,
    pub has_grant: bool,
    /// Set when the bucket detail could not be read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl BucketGrantStatus {
    /// Lacks the full grant and was readable.
    pub fn needs_grant(&self) -> bool {
        !self.has_grant && self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationReport {
    pub credential_id: String,
    pub buckets_total: usize,
    pub buckets_with_grant: usize,
    /// Buckets whose detail could not be read
    pub buckets_unreadable: usize,
    pub per_bucket: Vec<BucketGrantStatus>,
}

impl ReconciliationReport {
    fn new(credential_id: &str, per_bucket: Vec<BucketGrantStatus>) -> Self {
        Self {
            credential_id: credential_id.to_string(),
            buckets_total: per_bucket.len(),
            buckets_with_grant: per_bucket.iter().filter(|b| b.has_grant).count(),
            buckets_unreadable: per_bucket.iter().filter(|b| b.error.is_some()).count(),
            per_bucket,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.buckets_with_grant == self.buckets_total
    }

    /// Readable buckets lacking the full grant.
    pub fn missing(&self) -> Vec<String> {
        self.per_bucket
            .iter()
            .filter(|b| b.needs_grant())
            .map(|b| b.bucket_id.clone())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemediationReport {
    pub before: ReconciliationReport,
    pub grants_issued: usize,
    pub grant_failures: Vec<BucketGrantOutcome>,
    pub after: ReconciliationReport,
}

/// Scans and repairs bucket grants of a root key.
pub struct PermissionReconciler<S> {
    store: Arc<S>,
}

impl<S: CredentialStore> PermissionReconciler<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Find the credential acting as root key.
    ///
    /// Credentials whose detail cannot be read are skipped.
    pub async fn find_root_candidate(&self) -> Result<Credential, ReconciliationError> {
        let keys = self
            .store
            .list_keys()
            .await
            .map_err(ReconciliationError::KeyEnumerationFailed)?;

        let ids: Vec<String> = keys.into_iter().map(|k| k.id).collect();
        let details = fan_out(ids, |id| {
            let store = Arc::clone(&self.store);
            async move { store.get_key(&id).await }
        })
        .await;

        let mut candidates = Vec::new();
        for outcome in details {
            match outcome.result {
                Ok(credential) if credential.can_create_buckets() => candidates.push(credential),
                Ok(_) => {}
                Err(e) => {
                    warn!(key_id = %outcome.item, error = %e, "skipping unreadable credential");
                }
            }
        }

        let candidate = candidates
            .into_iter()
            .max_by(|a, b| by_reach_then_lowest_id(a, b))
            .ok_or(ReconciliationError::NoRootCandidate)?;

        debug!(key_id = %candidate.id, buckets = candidate.buckets.len(), "root key candidate");
        Ok(candidate)
    }

    /// Use `credential_id` when given, else the discovered candidate.
    pub async fn resolve(
        &self,
        credential_id: Option<&str>,
    ) -> Result<String, ReconciliationError> {
        match credential_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => Ok(id.to_string()),
            None => Ok(self.find_root_candidate().await?.id),
        }
    }

    /// Read-only grant report for `credential_id`.
    pub async fn scan(
        &self,
        credential_id: &str,
    ) -> Result<ReconciliationReport, ReconciliationError> {
        self.store
            .get_key(credential_id)
            .await
            .map_err(ReconciliationError::CredentialLookupFailed)?;

        let buckets = self
            .store
            .list_buckets()
            .await
            .map_err(ReconciliationError::BucketEnumerationFailed)?;

        let details = fan_out(buckets, |bucket: BucketSummary| {
            let store = Arc::clone(&self.store);
            async move { store.get_bucket(&bucket.id).await }
        })
        .await;

        let per_bucket = details
            .into_iter()
            .map(|outcome| match outcome.result {
                Ok(info) => {
                    let permissions = info.permissions_for(credential_id);
                    BucketGrantStatus {
                        bucket_id: info.id,
                        global_aliases: info.global_aliases,
                        permissions,
                        has_grant: permissions.is_some_and(|p| p.is_full()),
                        error: None,
                    }
                }
                Err(e) => {
                    warn!(bucket_id = %outcome.item.id, error = %e, "bucket detail unavailable");
                    BucketGrantStatus {
                        bucket_id: outcome.item.id,
                        global_aliases: outcome.item.global_aliases,
                        permissions: None,
                        has_grant: false,
                        error: Some(ErrorDetail::from(&e)),
                    }
                }
            })
            .collect();

        Ok(ReconciliationReport::new(credential_id, per_bucket))
    }

    /// Grant the full set on every readable bucket that lacks it.
    pub async fn remediate(
        &self,
        credential_id: &str,
    ) -> Result<RemediationReport, ReconciliationError> {
        let before = self.scan(credential_id).await?;
        let missing = before.missing();

        if missing.is_empty() {
            debug!(key_id = %credential_id, "no missing grants");
            return Ok(RemediationReport {
                after: before.clone(),
                before,
                grants_issued: 0,
                grant_failures: Vec::new(),
            });
        }

        let outcomes: Vec<BucketGrantOutcome> =
            grant_full_access(&self.store, credential_id, missing)
                .await
                .into_iter()
                .map(BucketGrantOutcome::from)
                .collect();

        let grants_issued = outcomes.iter().filter(|o| o.success).count();
        let grant_failures: Vec<BucketGrantOutcome> =
            outcomes.into_iter().filter(|o| !o.success).collect();

        info!(
            key_id = %credential_id,
            issued = grants_issued,
            failed = grant_failures.len(),
            "remediation grants issued"
        );

        let after = self.scan(credential_id).await.inspect_err(|e| {
            warn!(
                key_id = %credential_id,
                error = %e,
                "confirmation scan failed after remediation"
            );
        })?;

        Ok(RemediationReport {
            before,
            grants_issued,
            grant_failures,
            after,
        })
    }
}

fn by_reach_then_lowest_id(a: &Credential, b: &Credential) -> Ordering {
    a.buckets
        .len()
        .cmp(&b.buckets.len())
        .then_with(|| b.id.cmp(&a.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::garage::InMemoryCredentialStore;

    fn setup() -> Arc<InMemoryCredentialStore> {
        let store = Arc::new(InMemoryCredentialStore::new());
        store.insert_key("GK1", "root", true);
        for id in ["b1", "b2", "b3"] {
            store.insert_bucket(id, format!("alias-{id}"));
        }
        store
    }

    #[tokio::test]
    async fn scan_reports_full_and_partial_grants() {
        let store = setup();
        store.set_grant("b1", "GK1", BucketPermissions::FULL);
        store.set_grant(
            "b2",
            "GK1",
            BucketPermissions {
                read: true,
                write: true,
                owner: false,
            },
        );

        let report = PermissionReconciler::new(store)
            .scan("GK1")
            .await
            .unwrap();

        assert_eq!(report.buckets_total, 3);
        assert_eq!(report.buckets_with_grant, 1);
        assert_eq!(report.missing(), vec!["b2".to_string(), "b3".to_string()]);
        assert!(!report.is_complete());
        let b2 = &report.per_bucket[1];
        assert_eq!(b2.permissions.map(|p| p.owner), Some(false));
        assert_eq!(report.per_bucket[2].permissions, None);
        assert_eq!(report.per_bucket[0].global_aliases, vec!["alias-b1".to_string()]);
    }

    #[tokio::test]
    async fn remediation_repairs_missing_and_partial_grants() {
        let store = setup();
        store.set_grant("b1", "GK1", BucketPermissions::FULL);
        store.set_grant(
            "b2",
            "GK1",
            BucketPermissions {
                read: true,
                write: false,
                owner: false,
            },
        );

        let report = PermissionReconciler::new(store.clone())
            .remediate("GK1")
            .await
            .unwrap();

        assert_eq!(report.before.buckets_with_grant, 1);
        assert_eq!(report.grants_issued, 2);
        assert!(report.grant_failures.is_empty());
        assert!(report.after.is_complete());
        assert_eq!(store.mutation_count(), 2);
        for id in ["b1", "b2", "b3"] {
            assert_eq!(store.grant_of(id, "GK1"), Some(BucketPermissions::FULL));
        }
    }

    #[tokio::test]
    async fn second_remediation_makes_no_mutations() {
        let store = setup();
        let reconciler = PermissionReconciler::new(store.clone());

        reconciler.remediate("GK1").await.unwrap();
        let after_first = store.mutation_count();
        assert_eq!(after_first, 3);

        let second = reconciler.remediate("GK1").await.unwrap();
        assert_eq!(store.mutation_count(), after_first);
        assert_eq!(second.grants_issued, 0);
        assert_eq!(second.after.buckets_with_grant, second.after.buckets_total);
    }

    #[tokio::test]
    async fn detail_failure_is_recorded_and_skipped() {
        let store = setup();
        store.fail_get_bucket_on("b2");

        let reconciler = PermissionReconciler::new(store.clone());
        let scan = reconciler.scan("GK1").await.unwrap();
        assert_eq!(scan.buckets_total, 3);
        assert_eq!(scan.buckets_unreadable, 1);
        let b2 = scan.per_bucket.iter().find(|b| b.bucket_id == "b2").unwrap();
        assert!(b2.error.is_some());
        assert!(!b2.needs_grant());

        let report = reconciler.remediate("GK1").await.unwrap();
        assert_eq!(report.grants_issued, 2);
        assert_eq!(store.grant_of("b2", "GK1"), None);
        assert_eq!(store.mutation_count(), 2);
    }

    #[tokio::test]
    async fn grant_failures_are_reported_and_remain_missing() {
        let store = setup();
        store.fail_grants_on("b3");

        let report = PermissionReconciler::new(store)
            .remediate("GK1")
            .await
            .unwrap();

        assert_eq!(report.grants_issued, 2);
        assert_eq!(report.grant_failures.len(), 1);
        assert_eq!(report.grant_failures[0].bucket_id, "b3");
        assert_eq!(report.after.missing(), vec!["b3".to_string()]);
    }

    #[tokio::test]
    async fn bucket_list_failure_aborts_scan() {
        let store = setup();
        store.fail_list_buckets(CredentialStoreError::Unavailable("refused".into()));
        let err = PermissionReconciler::new(store)
            .scan("GK1")
            .await
            .unwrap_err();
        assert!(matches!(err, ReconciliationError::BucketEnumerationFailed(_)));
    }

    #[tokio::test]
    async fn unknown_credential_keeps_upstream_404() {
        let store = setup();
        let err = PermissionReconciler::new(store)
            .scan("GKmissing")
            .await
            .unwrap_err();
        match err {
            ReconciliationError::CredentialLookupFailed(inner) => {
                assert_eq!(inner.status(), Some(404));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn candidate_requires_create_bucket_capability() {
        let store = Arc::new(InMemoryCredentialStore::new());
        store.insert_bucket("b1", "one");
        store.insert_key("GKplain", "app", false);
        store.set_grant("b1", "GKplain", BucketPermissions::FULL);

        let reconciler = PermissionReconciler::new(store.clone());
        assert!(matches!(
            reconciler.find_root_candidate().await,
            Err(ReconciliationError::NoRootCandidate)
        ));

        store.insert_key("GKroot", "root", true);
        let candidate = reconciler.find_root_candidate().await.unwrap();
        assert_eq!(candidate.id, "GKroot");
    }

    #[tokio::test]
    async fn candidate_with_most_grants_wins_ties_by_lowest_id() {
        let store = Arc::new(InMemoryCredentialStore::new());
        store.insert_bucket("b1", "one");
        store.insert_bucket("b2", "two");
        store.insert_key("GKc", "c", true);
        store.insert_key("GKb", "b", true);
        store.insert_key("GKa", "a", true);

        let reconciler = PermissionReconciler::new(store.clone());
        assert_eq!(reconciler.find_root_candidate().await.unwrap().id, "GKa");

        store.set_grant("b1", "GKc", BucketPermissions::FULL);
        store.set_grant("b2", "GKc", BucketPermissions::FULL);
        store.set_grant("b1", "GKb", BucketPermissions::FULL);
        assert_eq!(reconciler.find_root_candidate().await.unwrap().id, "GKc");
    }

    #[tokio::test]
    async fn key_list_failure_is_reported() {
        let store = setup();
        store.fail_list_keys(CredentialStoreError::Upstream {
            status: 503,
            code: None,
            message: "layout not ready".into(),
        });
        let err = PermissionReconciler::new(store)
            .find_root_candidate()
            .await
            .unwrap_err();
        assert!(matches!(err, ReconciliationError::KeyEnumerationFailed(_)));
    }

    #[tokio::test]
    async fn resolve_prefers_explicit_id() {
        let store = setup();
        let reconciler = PermissionReconciler::new(store);
        assert_eq!(reconciler.resolve(Some("GKx")).await.unwrap(), "GKx");
        assert_eq!(reconciler.resolve(Some("  ")).await.unwrap(), "GK1");
        assert_eq!(reconciler.resolve(None).await.unwrap(), "GK1");
    }
}
