// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory credential store.
//!
//! Stands in for the storage cluster during local development
//! (`GARAGE_BACKEND=memory`) and in tests. Failures can be injected per
//! operation and per bucket, and mutating calls are counted so tests can
//! assert that a run performed no writes.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{
    BucketGrant, BucketInfo, BucketKey, BucketPermissions, BucketSummary, CreateKeyRequest,
    Credential, CredentialStore, CredentialStoreError, KeyBucket, KeyPermissions, KeySummary,
    Secret,
};

struct KeyRecord {
    name: String,
    secret: String,
    permissions: KeyPermissions,
    never_expires: bool,
}

#[derive(Default)]
struct BucketRecord {
    global_aliases: Vec<String>,
    grants: HashMap<String, BucketPermissions>,
}

#[derive(Default)]
struct Inner {
    next_key: u64,
    keys: BTreeMap<String, KeyRecord>,
    buckets: BTreeMap<String, BucketRecord>,
    fail_create_key: Option<CredentialStoreError>,
    fail_list_keys: Option<CredentialStoreError>,
    fail_list_buckets: Option<CredentialStoreError>,
    fail_grant: HashSet<String>,
    fail_get_bucket: HashSet<String>,
}

#[derive(Default)]
pub struct InMemoryCredentialStore {
    inner: Mutex<Inner>,
    mutations: AtomicUsize,
    grant_delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay each grant call, to observe concurrent fan-out.
    pub fn with_grant_delay(mut self, delay: Duration) -> Self {
        self.grant_delay = Some(delay);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a test panicked mid-call; the data is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn insert_bucket(&self, id: impl Into<String>, alias: impl Into<String>) {
        self.lock().buckets.insert(
            id.into(),
            BucketRecord {
                global_aliases: vec![alias.into()],
                grants: HashMap::new(),
            },
        );
    }

    /// Insert a key directly, bypassing the mutation counter.
    pub fn insert_key(&self, id: impl Into<String>, name: impl Into<String>, create_bucket: bool) {
        self.lock().keys.insert(
            id.into(),
            KeyRecord {
                name: name.into(),
                secret: String::new(),
                permissions: KeyPermissions { create_bucket },
                never_expires: true,
            },
        );
    }

    /// Set a grant directly, bypassing the mutation counter.
    pub fn set_grant(&self, bucket_id: &str, key_id: &str, permissions: BucketPermissions) {
        if let Some(bucket) = self.lock().buckets.get_mut(bucket_id) {
            bucket.grants.insert(key_id.to_string(), permissions);
        }
    }

    pub fn grant_of(&self, bucket_id: &str, key_id: &str) -> Option<BucketPermissions> {
        self.lock()
            .buckets
            .get(bucket_id)
            .and_then(|b| b.grants.get(key_id).copied())
    }

    pub fn fail_create_key(&self, err: CredentialStoreError) {
        self.lock().fail_create_key = Some(err);
    }

    pub fn fail_list_keys(&self, err: CredentialStoreError) {
        self.lock().fail_list_keys = Some(err);
    }

    pub fn fail_list_buckets(&self, err: CredentialStoreError) {
        self.lock().fail_list_buckets = Some(err);
    }

    pub fn fail_grants_on(&self, bucket_id: impl Into<String>) {
        self.lock().fail_grant.insert(bucket_id.into());
    }

    pub fn fail_get_bucket_on(&self, bucket_id: impl Into<String>) {
        self.lock().fail_get_bucket.insert(bucket_id.into());
    }

    /// Clear every injected failure.
    pub fn heal(&self) {
        let mut inner = self.lock();
        inner.fail_create_key = None;
        inner.fail_list_keys = None;
        inner.fail_list_buckets = None;
        inner.fail_grant.clear();
        inner.fail_get_bucket.clear();
    }

    /// Number of create/allow/deny calls received, including failed ones.
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    /// Highest number of grant calls observed in flight at once.
    pub fn max_concurrent_grants(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn credential_view(
        id: &str,
        record: &KeyRecord,
        buckets: &BTreeMap<String, BucketRecord>,
    ) -> Credential {
        Credential {
            id: id.to_string(),
            name: record.name.clone(),
            secret_access_key: None,
            expiration: (!record.never_expires).then(|| "1970-01-01T00:00:00Z".to_string()),
            expired: false,
            permissions: record.permissions,
            buckets: buckets
                .iter()
                .filter_map(|(bucket_id, bucket)| {
                    bucket.grants.get(id).map(|permissions| KeyBucket {
                        id: bucket_id.clone(),
                        global_aliases: bucket.global_aliases.clone(),
                        permissions: *permissions,
                    })
                })
                .collect(),
        }
    }

    fn apply_grant(&self, grant: &BucketGrant, allow: bool) -> Result<(), CredentialStoreError> {
        let mut inner = self.lock();
        if inner.fail_grant.contains(&grant.bucket_id) {
            return Err(CredentialStoreError::Upstream {
                status: 500,
                code: Some("InternalError".to_string()),
                message: format!("injected grant failure on bucket {}", grant.bucket_id),
            });
        }
        if !inner.keys.contains_key(&grant.access_key_id) {
            return Err(not_found("NoSuchAccessKey", &grant.access_key_id));
        }
        let bucket = inner
            .buckets
            .get_mut(&grant.bucket_id)
            .ok_or_else(|| not_found("NoSuchBucket", &grant.bucket_id))?;

        let current = bucket
            .grants
            .entry(grant.access_key_id.clone())
            .or_default();
        // Flags set in the request are turned on (allow) or off (deny); others are untouched.
        let flags = grant.permissions;
        if flags.read {
            current.read = allow;
        }
        if flags.write {
            current.write = allow;
        }
        if flags.owner {
            current.owner = allow;
        }
        if *current == BucketPermissions::default() {
            bucket.grants.remove(&grant.access_key_id);
        }
        Ok(())
    }

    async fn grant_call(
        &self,
        grant: BucketGrant,
        allow: bool,
    ) -> Result<(), CredentialStoreError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.grant_delay {
            tokio::time::sleep(delay).await;
        }
        let result = self.apply_grant(&grant, allow);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn not_found(code: &str, id: &str) -> CredentialStoreError {
    CredentialStoreError::Upstream {
        status: 404,
        code: Some(code.to_string()),
        message: format!("{code}: {id}"),
    }
}

impl CredentialStore for InMemoryCredentialStore {
    async fn create_key(
        &self,
        request: CreateKeyRequest,
    ) -> Result<Credential, CredentialStoreError> {
        self.mutations.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.lock();
        if let Some(err) = inner.fail_create_key.clone() {
            return Err(err);
        }

        inner.next_key += 1;
        let n = inner.next_key;
        let id = format!("GK{n:024x}");
        let record = KeyRecord {
            name: request.name,
            secret: format!("{n:064x}"),
            permissions: request.allow.unwrap_or_default(),
            never_expires: request.never_expires,
        };

        let mut credential = Self::credential_view(&id, &record, &inner.buckets);
        credential.secret_access_key = Some(Secret(record.secret.clone()));
        inner.keys.insert(id, record);
        Ok(credential)
    }

    async fn list_keys(&self) -> Result<Vec<KeySummary>, CredentialStoreError> {
        let inner = self.lock();
        if let Some(err) = inner.fail_list_keys.clone() {
            return Err(err);
        }
        Ok(inner
            .keys
            .iter()
            .map(|(id, record)| KeySummary {
                id: id.clone(),
                name: record.name.clone(),
            })
            .collect())
    }

    async fn get_key(&self, id: &str) -> Result<Credential, CredentialStoreError> {
        let inner = self.lock();
        let record = inner
            .keys
            .get(id)
            .ok_or_else(|| not_found("NoSuchAccessKey", id))?;
        Ok(Self::credential_view(id, record, &inner.buckets))
    }

    async fn list_buckets(&self) -> Result<Vec<BucketSummary>, CredentialStoreError> {
        let inner = self.lock();
        if let Some(err) = inner.fail_list_buckets.clone() {
            return Err(err);
        }
        Ok(inner
            .buckets
            .iter()
            .map(|(id, bucket)| BucketSummary {
                id: id.clone(),
                global_aliases: bucket.global_aliases.clone(),
                local_aliases: Vec::new(),
            })
            .collect())
    }

    async fn get_bucket(&self, id: &str) -> Result<BucketInfo, CredentialStoreError> {
        let inner = self.lock();
        if inner.fail_get_bucket.contains(id) {
            return Err(CredentialStoreError::Unavailable(format!(
                "injected detail failure on bucket {id}"
            )));
        }
        let bucket = inner
            .buckets
            .get(id)
            .ok_or_else(|| not_found("NoSuchBucket", id))?;

        let mut keys: Vec<BucketKey> = bucket
            .grants
            .iter()
            .map(|(key_id, permissions)| BucketKey {
                access_key_id: key_id.clone(),
                name: inner
                    .keys
                    .get(key_id)
                    .map(|k| k.name.clone())
                    .unwrap_or_default(),
                permissions: *permissions,
            })
            .collect();
        keys.sort_by(|a, b| a.access_key_id.cmp(&b.access_key_id));

        Ok(BucketInfo {
            id: id.to_string(),
            global_aliases: bucket.global_aliases.clone(),
            keys,
        })
    }

    async fn allow_bucket_key(&self, grant: BucketGrant) -> Result<(), CredentialStoreError> {
        self.grant_call(grant, true).await
    }

    async fn deny_bucket_key(&self, grant: BucketGrant) -> Result<(), CredentialStoreError> {
        self.grant_call(grant, false).await
    }
}
