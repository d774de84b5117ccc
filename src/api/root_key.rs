// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Root key provisioning, status and reconciliation endpoints.
//!
//! Every handler here requires a verified session ([`Auth`]).

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use crate::auth::Auth;
use crate::error::ApiError;
use crate::rootkey::{
    ProvisionRequest, ProvisioningResult, ReconciliationError, ReconciliationReport,
    RemediationReport,
};
use crate::state::AppState;

/// Where the status answer came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StatusSource {
    Cache,
    Discovery,
    None,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RootKeyStatus {
    pub configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<String>,
    pub source: StatusSource,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ReconcileQuery {
    /// Credential to check; defaults to the discovered root key
    pub credential_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RemediateRequest {
    /// Credential to repair; defaults to the discovered root key
    #[serde(default)]
    pub credential_id: Option<String>,
}

/// Create a root key and grant it on every bucket.
///
/// Returns 201 even when some grants failed; `warning` and `perBucket` then
/// say which.
#[utoipa::path(
    post,
    path = "/api/root-key",
    tag = "Root Key",
    request_body = ProvisionRequest,
    responses(
        (status = 201, description = "Key created", body = ProvisioningResult),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Not authenticated"),
        (status = 503, description = "Storage cluster unavailable")
    )
)]
pub async fn provision(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<ProvisionRequest>,
) -> Result<(StatusCode, Json<ProvisioningResult>), ApiError> {
    info!(username = %user.username, name = %request.name, "provisioning root key");
    let global = request.global_permissions;
    let result = state.provisioner().provision(request).await?;
    // A key without global permissions is not a root key.
    if global {
        state.root_key_cache.mark_configured(&result.credential.id);
    }
    Ok((StatusCode::CREATED, Json(result)))
}

/// Whether a root key exists.
///
/// Answers from the cache when possible, else discovers a candidate on the
/// cluster and caches it.
#[utoipa::path(
    get,
    path = "/api/root-key/status",
    tag = "Root Key",
    responses(
        (status = 200, description = "Root key status", body = RootKeyStatus),
        (status = 401, description = "Not authenticated"),
        (status = 503, description = "Storage cluster unavailable")
    )
)]
pub async fn status(
    Auth(_user): Auth,
    State(state): State<AppState>,
) -> Result<Json<RootKeyStatus>, ApiError> {
    if let Some(marker) = state.root_key_cache.configured() {
        return Ok(Json(RootKeyStatus {
            configured: true,
            credential_id: Some(marker.credential_id),
            source: StatusSource::Cache,
        }));
    }

    match state.reconciler().find_root_candidate().await {
        Ok(candidate) => {
            state.root_key_cache.mark_configured(&candidate.id);
            Ok(Json(RootKeyStatus {
                configured: true,
                credential_id: Some(candidate.id),
                source: StatusSource::Discovery,
            }))
        }
        Err(ReconciliationError::NoRootCandidate) => Ok(Json(RootKeyStatus {
            configured: false,
            credential_id: None,
            source: StatusSource::None,
        })),
        Err(e) => Err(e.into()),
    }
}

/// Forget the cached root key status.
#[utoipa::path(
    delete,
    path = "/api/root-key/status",
    tag = "Root Key",
    responses(
        (status = 204, description = "Cache cleared"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn clear_status(Auth(user): Auth, State(state): State<AppState>) -> StatusCode {
    info!(username = %user.username, "root key status cache cleared");
    state.root_key_cache.clear();
    StatusCode::NO_CONTENT
}

/// Report which buckets lack the root key grant. Read-only.
#[utoipa::path(
    get,
    path = "/api/root-key/reconcile",
    tag = "Root Key",
    params(ReconcileQuery),
    responses(
        (status = 200, description = "Grant report", body = ReconciliationReport),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No root key found"),
        (status = 503, description = "Storage cluster unavailable")
    )
)]
pub async fn reconcile_report(
    Auth(_user): Auth,
    State(state): State<AppState>,
    Query(query): Query<ReconcileQuery>,
) -> Result<Json<ReconciliationReport>, ApiError> {
    let reconciler = state.reconciler();
    let credential_id = reconciler.resolve(query.credential_id.as_deref()).await?;
    Ok(Json(reconciler.scan(&credential_id).await?))
}

/// Grant the root key on every bucket where it is missing.
#[utoipa::path(
    post,
    path = "/api/root-key/reconcile",
    tag = "Root Key",
    request_body = RemediateRequest,
    responses(
        (status = 200, description = "Remediation report", body = RemediationReport),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "No root key found"),
        (status = 503, description = "Storage cluster unavailable")
    )
)]
pub async fn remediate(
    Auth(user): Auth,
    State(state): State<AppState>,
    Json(request): Json<RemediateRequest>,
) -> Result<Json<RemediationReport>, ApiError> {
    let reconciler = state.reconciler();
    let credential_id = reconciler.resolve(request.credential_id.as_deref()).await?;
    info!(username = %user.username, key_id = %credential_id, "reconciling root key grants");

    let report = reconciler.remediate(&credential_id).await?;
    // An explicit credential id may name a key that is not the root key.
    if report.after.is_complete() && request.credential_id.is_none() {
        state.root_key_cache.mark_configured(&credential_id);
    }
    Ok(Json(report))
}
