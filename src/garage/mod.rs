// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Cluster Credential Store
//!
//! The console does not own keys or buckets; it asks the storage cluster's
//! admin API to create keys and to grant or revoke per-bucket permissions.
//! [`CredentialStore`] is the narrow interface the root key provisioner and
//! reconciler depend on.
//!
//! ## Backends
//!
//! - [`GarageAdminClient`] - HTTPS admin API (v2 endpoint shapes)
//! - [`InMemoryCredentialStore`] - local development and tests, with
//!   failure injection

use std::future::Future;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod client;
pub mod error;
pub mod memory;

pub use client::GarageAdminClient;
pub use error::{CredentialStoreError, ErrorDetail};
pub use memory::InMemoryCredentialStore;

// =============================================================================
// Wire Models
// =============================================================================

/// Secret material that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(pub String);

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<redacted>")
    }
}

/// Per-bucket permission flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BucketPermissions {
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub write: bool,
    #[serde(default)]
    pub owner: bool,
}

impl BucketPermissions {
    /// `{read, write, owner}`: the grant a root key holds on every bucket.
    pub const FULL: Self = Self {
        read: true,
        write: true,
        owner: true,
    };

    pub fn is_full(&self) -> bool {
        self.read && self.write && self.owner
    }
}

/// Global (non-bucket) key permissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KeyPermissions {
    #[serde(default)]
    pub create_bucket: bool,
}

/// Body of the create-key call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeyRequest {
    pub name: String,
    pub never_expires: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow: Option<KeyPermissions>,
}

/// Bucket entry in a credential's detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct KeyBucket {
    pub id: String,
    #[serde(default)]
    pub global_aliases: Vec<String>,
    #[serde(default)]
    pub permissions: BucketPermissions,
}

/// Access key with its detail, as returned by create-key and get-key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    #[serde(rename = "accessKeyId")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Only present on creation or when explicitly requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub secret_access_key: Option<Secret>,
    /// RFC 3339 expiration, absent for never-expiring keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<String>,
    #[serde(default)]
    pub expired: bool,
    #[serde(default)]
    pub permissions: KeyPermissions,
    #[serde(default)]
    pub buckets: Vec<KeyBucket>,
}

impl Credential {
    pub fn never_expires(&self) -> bool {
        self.expiration.is_none()
    }

    /// Holds the global bucket-creation capability.
    pub fn can_create_buckets(&self) -> bool {
        self.permissions.create_bucket
    }
}

/// Entry of list-credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct KeySummary {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Local alias of a bucket in a key's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocalAlias {
    pub access_key_id: String,
    pub alias: String,
}

/// Entry of list-buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BucketSummary {
    pub id: String,
    #[serde(default)]
    pub global_aliases: Vec<String>,
    #[serde(default)]
    pub local_aliases: Vec<LocalAlias>,
}

/// Key entry in a bucket's detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BucketKey {
    pub access_key_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub permissions: BucketPermissions,
}

/// Bucket detail, as returned by get-bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BucketInfo {
    pub id: String,
    #[serde(default)]
    pub global_aliases: Vec<String>,
    #[serde(default)]
    pub keys: Vec<BucketKey>,
}

impl BucketInfo {
    /// Permissions this bucket lists for `credential_id`, if any.
    pub fn permissions_for(&self, credential_id: &str) -> Option<BucketPermissions> {
        self.keys
            .iter()
            .find(|k| k.access_key_id == credential_id)
            .map(|k| k.permissions)
    }
}

/// Body of the allow/deny bucket-key calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketGrant {
    pub bucket_id: String,
    pub access_key_id: String,
    pub permissions: BucketPermissions,
}

impl BucketGrant {
    pub fn full(bucket_id: impl Into<String>, access_key_id: impl Into<String>) -> Self {
        Self {
            bucket_id: bucket_id.into(),
            access_key_id: access_key_id.into(),
            permissions: BucketPermissions::FULL,
        }
    }
}

// =============================================================================
// Interface
// =============================================================================

/// Storage cluster key/bucket/permission operations.
///
/// Every call is one independent request to the cluster; there is no
/// multi-bucket transaction.
pub trait CredentialStore: Send + Sync + 'static {
    fn create_key(
        &self,
        request: CreateKeyRequest,
    ) -> impl Future<Output = Result<Credential, CredentialStoreError>> + Send;

    fn list_keys(&self)
        -> impl Future<Output = Result<Vec<KeySummary>, CredentialStoreError>> + Send;

    fn get_key(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Credential, CredentialStoreError>> + Send;

    fn list_buckets(
        &self,
    ) -> impl Future<Output = Result<Vec<BucketSummary>, CredentialStoreError>> + Send;

    fn get_bucket(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<BucketInfo, CredentialStoreError>> + Send;

    fn allow_bucket_key(
        &self,
        grant: BucketGrant,
    ) -> impl Future<Output = Result<(), CredentialStoreError>> + Send;

    fn deny_bucket_key(
        &self,
        grant: BucketGrant,
    ) -> impl Future<Output = Result<(), CredentialStoreError>> + Send;
}

/// Backend selected at start-up.
pub enum CredentialBackend {
    Http(GarageAdminClient),
    Memory(InMemoryCredentialStore),
}

impl CredentialStore for CredentialBackend {
    async fn create_key(
        &self,
        request: CreateKeyRequest,
    ) -> Result<Credential, CredentialStoreError> {
        match self {
            Self::Http(c) => c.create_key(request).await,
            Self::Memory(m) => m.create_key(request).await,
        }
    }

    async fn list_keys(&self) -> Result<Vec<KeySummary>, CredentialStoreError> {
        match self {
            Self::Http(c) => c.list_keys().await,
            Self::Memory(m) => m.list_keys().await,
        }
    }

    async fn get_key(&self, id: &str) -> Result<Credential, CredentialStoreError> {
        match self {
            Self::Http(c) => c.get_key(id).await,
            Self::Memory(m) => m.get_key(id).await,
        }
    }

    async fn list_buckets(&self) -> Result<Vec<BucketSummary>, CredentialStoreError> {
        match self {
            Self::Http(c) => c.list_buckets().await,
            Self::Memory(m) => m.list_buckets().await,
        }
    }

    async fn get_bucket(&self, id: &str) -> Result<BucketInfo, CredentialStoreError> {
        match self {
            Self::Http(c) => c.get_bucket(id).await,
            Self::Memory(m) => m.get_bucket(id).await,
        }
    }

    async fn allow_bucket_key(&self, grant: BucketGrant) -> Result<(), CredentialStoreError> {
        match self {
            Self::Http(c) => c.allow_bucket_key(grant).await,
            Self::Memory(m) => m.allow_bucket_key(grant).await,
        }
    }

    async fn deny_bucket_key(&self, grant: BucketGrant) -> Result<(), CredentialStoreError> {
        match self {
            Self::Http(c) => c.deny_bucket_key(grant).await,
            Self::Memory(m) => m.deny_bucket_key(grant).await,
        }
    }
}
