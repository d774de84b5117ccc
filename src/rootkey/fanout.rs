// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Concurrent fan-out over independent cluster calls.
//!
//! Each item gets its own spawned task; the caller awaits every handle and
//! receives one outcome per item, in input order. Errors are returned as
//! data, never propagated past the join.
//!
//! Tasks are detached from the caller: if the awaiting request is dropped,
//! calls already in flight still run to completion.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::garage::{BucketGrant, CredentialStore, CredentialStoreError};

/// Outcome of one fanned-out call.
#[derive(Debug)]
pub struct Outcome<I, T> {
    pub item: I,
    pub result: Result<T, CredentialStoreError>,
}

/// Run `call` for every item concurrently and collect all outcomes.
pub async fn fan_out<I, T, F, Fut>(items: Vec<I>, call: F) -> Vec<Outcome<I, T>>
where
    I: Clone + Send + 'static,
    T: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<T, CredentialStoreError>> + Send + 'static,
{
    let handles: Vec<(I, JoinHandle<Result<T, CredentialStoreError>>)> = items
        .into_iter()
        .map(|item| {
            let task = tokio::spawn(call(item.clone()));
            (item, task)
        })
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for (item, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(CredentialStoreError::Unavailable(format!(
                "task did not complete: {e}"
            ))),
        };
        outcomes.push(Outcome { item, result });
    }
    outcomes
}

/// Grant `{read, write, owner}` on every bucket to `access_key_id`.
pub async fn grant_full_access<S: CredentialStore>(
    store: &Arc<S>,
    access_key_id: &str,
    bucket_ids: Vec<String>,
) -> Vec<Outcome<String, ()>> {
    let access_key_id = access_key_id.to_string();
    fan_out(bucket_ids, |bucket_id| {
        let store = Arc::clone(store);
        let grant = BucketGrant::full(bucket_id, access_key_id.clone());
        async move { store.allow_bucket_key(grant).await }
    })
    .await
}
