// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use crate::garage::CredentialStoreError;
use crate::rootkey::{ProvisioningError, ReconciliationError};

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = self.status.as_u16(), error = %self.message, "request failed");
        }
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

/// Upstream status passes through; the message is never reworded.
///
/// Cluster 401/403 mean the admin token is wrong, not the console session,
/// so they surface as 502.
impl From<CredentialStoreError> for ApiError {
    fn from(err: CredentialStoreError) -> Self {
        let status = match &err {
            CredentialStoreError::Upstream { status: 401 | 403, .. } => StatusCode::BAD_GATEWAY,
            CredentialStoreError::Upstream { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            CredentialStoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CredentialStoreError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, err.to_string())
    }
}

impl From<ProvisioningError> for ApiError {
    fn from(err: ProvisioningError) -> Self {
        match err {
            ProvisioningError::InvalidRequest(message) => Self::bad_request(message),
            ProvisioningError::CreationFailed(inner) => inner.into(),
            degraded => Self::internal(degraded.to_string()),
        }
    }
}

impl From<ReconciliationError> for ApiError {
    fn from(err: ReconciliationError) -> Self {
        let message = err.to_string();
        match err {
            ReconciliationError::NoRootCandidate => Self::not_found(message),
            ReconciliationError::KeyEnumerationFailed(inner)
            | ReconciliationError::BucketEnumerationFailed(inner)
            | ReconciliationError::CredentialLookupFailed(inner) => Self {
                message,
                ..inner.into()
            },
        }
    }
}
