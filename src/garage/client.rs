// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTPS client for the storage cluster admin API (v2).

use std::time::Duration;

use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use super::{
    BucketGrant, BucketInfo, BucketSummary, CreateKeyRequest, Credential, CredentialStore,
    CredentialStoreError, KeySummary,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Admin API client authenticated with a bearer admin token.
#[derive(Clone)]
pub struct GarageAdminClient {
    base_url: String,
    admin_token: String,
    http: Client,
}

impl GarageAdminClient {
    pub fn new(
        base_url: impl Into<String>,
        admin_token: impl Into<String>,
    ) -> Result<Self, CredentialStoreError> {
        Self::with_timeout(base_url, admin_token, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        admin_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CredentialStoreError> {
        let http = Client::builder().timeout(timeout).build().map_err(|e| {
            CredentialStoreError::Unavailable(format!("failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            admin_token: admin_token.into(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, CredentialStoreError> {
        debug!(path, "admin API GET");
        let response = self
            .http
            .get(self.url(path))
            .bearer_auth(&self.admin_token)
            .query(query)
            .send()
            .await
            .map_err(|e| CredentialStoreError::Unavailable(format!("GET {path} failed: {e}")))?;

        read_json(path, response).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, CredentialStoreError> {
        debug!(path, "admin API POST");
        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(&self.admin_token)
            .json(body)
            .send()
            .await
            .map_err(|e| CredentialStoreError::Unavailable(format!("POST {path} failed: {e}")))?;

        read_json(path, response).await
    }

    async fn post_discard<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(), CredentialStoreError> {
        let _: serde_json::Value = self.post_json(path, body).await?;
        Ok(())
    }
}

async fn read_json<T: DeserializeOwned>(
    path: &str,
    response: Response,
) -> Result<T, CredentialStoreError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CredentialStoreError::from_response(status.as_u16(), &body));
    }

    response
        .json()
        .await
        .map_err(|e| CredentialStoreError::InvalidResponse(format!("{path}: {e}")))
}

impl CredentialStore for GarageAdminClient {
    async fn create_key(
        &self,
        request: CreateKeyRequest,
    ) -> Result<Credential, CredentialStoreError> {
        self.post_json("/v2/CreateKey", &request).await
    }

    async fn list_keys(&self) -> Result<Vec<KeySummary>, CredentialStoreError> {
        self.get_json("/v2/ListKeys", &[]).await
    }

    async fn get_key(&self, id: &str) -> Result<Credential, CredentialStoreError> {
        self.get_json("/v2/GetKeyInfo", &[("id", id)]).await
    }

    async fn list_buckets(&self) -> Result<Vec<BucketSummary>, CredentialStoreError> {
        self.get_json("/v2/ListBuckets", &[]).await
    }

    async fn get_bucket(&self, id: &str) -> Result<BucketInfo, CredentialStoreError> {
        self.get_json("/v2/GetBucketInfo", &[("id", id)]).await
    }

    async fn allow_bucket_key(&self, grant: BucketGrant) -> Result<(), CredentialStoreError> {
        self.post_discard("/v2/AllowBucketKey", &grant).await
    }

    async fn deny_bucket_key(&self, grant: BucketGrant) -> Result<(), CredentialStoreError> {
        self.post_discard("/v2/DenyBucketKey", &grant).await
    }
}

impl std::fmt::Debug for GarageAdminClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GarageAdminClient")
            .field("base_url", &self.base_url)
            .field("admin_token", &"<redacted>")
            .finish()
    }
}
