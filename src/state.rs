// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use axum::extract::FromRef;

use crate::auth::{AuthError, ConsoleCredentials, SigningKey, TokenCodec};
use crate::config::{BackendKind, ConsoleConfig};
use crate::garage::{
    CredentialBackend, CredentialStoreError, GarageAdminClient, InMemoryCredentialStore,
};
use crate::rootkey::{PermissionReconciler, RootKeyConfigCache, RootKeyProvisioner};

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("invalid session secret: {0}")]
    SigningKey(AuthError),

    #[error("failed to build admin API client: {0}")]
    AdminClient(CredentialStoreError),
}

#[derive(Clone)]
pub struct AppState {
    pub codec: Arc<TokenCodec>,
    pub credentials: Arc<ConsoleCredentials>,
    pub store: Arc<CredentialBackend>,
    pub root_key_cache: Arc<RootKeyConfigCache>,
    pub cookie_secure: bool,
}

impl AppState {
    pub fn new(
        codec: TokenCodec,
        credentials: ConsoleCredentials,
        store: CredentialBackend,
        root_key_cache: RootKeyConfigCache,
        cookie_secure: bool,
    ) -> Self {
        Self {
            codec: Arc::new(codec),
            credentials: Arc::new(credentials),
            store: Arc::new(store),
            root_key_cache: Arc::new(root_key_cache),
            cookie_secure,
        }
    }

    pub fn from_config(config: &ConsoleConfig) -> Result<Self, StateError> {
        let key = SigningKey::new(config.auth_secret.as_bytes()).map_err(StateError::SigningKey)?;

        let store = match &config.backend {
            BackendKind::Http {
                admin_url,
                admin_token,
            } => CredentialBackend::Http(
                GarageAdminClient::with_timeout(
                    admin_url.as_str(),
                    admin_token.as_str(),
                    config.admin_api_timeout,
                )
                .map_err(StateError::AdminClient)?,
            ),
            BackendKind::Memory => CredentialBackend::Memory(InMemoryCredentialStore::new()),
        };

        Ok(Self::new(
            TokenCodec::new(key),
            ConsoleCredentials::new(&config.username, &config.password),
            store,
            RootKeyConfigCache::new(config.root_key_cache_ttl),
            config.cookie_secure,
        ))
    }

    pub fn provisioner(&self) -> RootKeyProvisioner<CredentialBackend> {
        RootKeyProvisioner::new(Arc::clone(&self.store))
    }

    pub fn reconciler(&self) -> PermissionReconciler<CredentialBackend> {
        PermissionReconciler::new(Arc::clone(&self.store))
    }
}

impl FromRef<AppState> for Arc<TokenCodec> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.codec)
    }
}

#[cfg(test)]
impl AppState {
    pub(crate) const TEST_USERNAME: &'static str = "admin";
    pub(crate) const TEST_PASSWORD: &'static str = "correct horse";

    /// Memory-backed state with a fixed console login.
    pub(crate) fn for_tests(store: InMemoryCredentialStore) -> Self {
        Self::new(
            TokenCodec::new(SigningKey::new("state-test-secret").unwrap()),
            ConsoleCredentials::new(Self::TEST_USERNAME, Self::TEST_PASSWORD),
            CredentialBackend::Memory(store),
            RootKeyConfigCache::default(),
            true,
        )
    }

    pub(crate) fn memory_store(&self) -> &InMemoryCredentialStore {
        match self.store.as_ref() {
            CredentialBackend::Memory(store) => store,
            CredentialBackend::Http(_) => panic!("test state uses the memory backend"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config(backend: BackendKind, secret: &str) -> ConsoleConfig {
        ConsoleConfig {
            bind_addr: "127.0.0.1:3909".parse().unwrap(),
            auth_secret: secret.to_string(),
            username: "admin".to_string(),
            password: "pw".to_string(),
            backend,
            admin_api_timeout: Duration::from_secs(5),
            root_key_cache_ttl: Duration::from_secs(60),
            cookie_secure: false,
        }
    }

    #[test]
    fn builds_http_backend_from_config() {
        let state = AppState::from_config(&config(
            BackendKind::Http {
                admin_url: "http://garage:3903/".to_string(),
                admin_token: "token".to_string(),
            },
            "secret",
        ))
        .unwrap();
        match state.store.as_ref() {
            CredentialBackend::Http(client) => assert_eq!(client.base_url(), "http://garage:3903"),
            CredentialBackend::Memory(_) => panic!("expected http backend"),
        }
        assert!(!state.cookie_secure);
        assert_eq!(state.root_key_cache.ttl(), Duration::from_secs(60));
    }

    #[test]
    fn empty_secret_is_refused() {
        let err = AppState::from_config(&config(BackendKind::Memory, "")).err().unwrap();
        assert!(matches!(err, StateError::SigningKey(_)));
    }

    #[test]
    fn codec_is_extractable_from_state() {
        let state = AppState::for_tests(InMemoryCredentialStore::new());
        let codec = Arc::<TokenCodec>::from_ref(&state);
        let token = codec.issue("admin");
        assert_eq!(state.codec.verify(&token).unwrap().username, "admin");
    }
}
