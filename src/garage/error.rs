// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Errors returned by the storage cluster admin API.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error body the cluster returns on non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct UpstreamErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialStoreError {
    /// The cluster answered with a non-success status.
    #[error("{message}")]
    Upstream {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// The cluster could not be reached.
    #[error("storage cluster unavailable: {0}")]
    Unavailable(String),

    /// The cluster answered 2xx with a body we could not read.
    #[error("invalid response from storage cluster: {0}")]
    InvalidResponse(String),
}

impl CredentialStoreError {
    /// Build an upstream error from a status and raw response body.
    ///
    /// The cluster's `message` is kept verbatim; the raw body is used when it
    /// is not the usual JSON shape.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: UpstreamErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = parsed
            .message
            .filter(|m| !m.trim().is_empty())
            .or_else(|| {
                let raw = body.trim();
                (!raw.is_empty()).then(|| raw.to_string())
            })
            .unwrap_or_else(|| format!("storage cluster returned HTTP {status}"));

        Self::Upstream {
            status,
            code: parsed.code,
            message,
        }
    }

    /// Upstream HTTP status, if the cluster answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Upstream error code, if any.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Upstream { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Serializable per-item error detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    /// Upstream status, absent for transport failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Upstream error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Upstream message, unmodified
    pub message: String,
}

impl From<&CredentialStoreError> for ErrorDetail {
    fn from(err: &CredentialStoreError) -> Self {
        Self {
            status: err.status(),
            code: err.code().map(str::to_string),
            message: err.to_string(),
        }
    }
}
