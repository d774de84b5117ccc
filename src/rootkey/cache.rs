// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Process-local root key configuration cache.
//!
//! Records that a root key has been provisioned so the status endpoint can
//! skip discovery against the cluster. Best effort only: a miss falls back
//! to discovery, and the cluster stays the source of truth.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{Clock, SystemClock};

/// Default time-to-live for cache entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

const CAPACITY: usize = 16;
const CONFIGURED_KEY: &str = "root_key.configured";

struct CacheEntry {
    value: String,
    /// Unix seconds from the cache clock.
    written_at: i64,
}

/// "A root key is configured" marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RootKeyMarker {
    pub credential_id: String,
    pub marked_at: DateTime<Utc>,
}

/// Small TTL key-value cache.
pub struct RootKeyConfigCache {
    cache: Mutex<LruCache<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl Default for RootKeyConfigCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl RootKeyConfigCache {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Create a cache that reads time from `clock`.
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(CAPACITY).unwrap_or(NonZeroUsize::MIN),
            )),
            clock,
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns `None` if absent, expired, or the lock is poisoned.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entry(key).map(|(value, _)| value)
    }

    fn entry(&self, key: &str) -> Option<(String, i64)> {
        let mut cache = self.cache.lock().ok()?;
        let now = self.clock.now();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        if let Some(entry) = cache.get(key) {
            if now.saturating_sub(entry.written_at) < ttl {
                return Some((entry.value.clone(), entry.written_at));
            }
            cache.pop(key);
        }
        None
    }

    pub fn set(&self, key: &str, value: impl Into<String>) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(
                key.to_string(),
                CacheEntry {
                    value: value.into(),
                    written_at: self.clock.now(),
                },
            );
        }
    }

    pub fn remove(&self, key: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.pop(key);
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    /// Record that `credential_id` is the provisioned root key.
    ///
    /// Marking again refreshes the entry.
    pub fn mark_configured(&self, credential_id: &str) {
        self.set(CONFIGURED_KEY, credential_id);
    }

    pub fn configured(&self) -> Option<RootKeyMarker> {
        self.entry(CONFIGURED_KEY)
            .map(|(credential_id, written_at)| RootKeyMarker {
                credential_id,
                marked_at: DateTime::from_timestamp(written_at, 0).unwrap_or_default(),
            })
    }
}
