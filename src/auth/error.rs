// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Message returned to clients for every token rejection.
///
/// Missing, forged and expired tokens are distinguished in logs only.
const GENERIC_UNAUTHORIZED: &str = "Authentication required";

/// Authentication error type.
#[derive(Debug)]
pub enum AuthError {
    /// No `auth-token` cookie present
    MissingToken,
    /// Token structure or encoding is invalid
    MalformedToken,
    /// Token signature does not match
    InvalidSignature,
    /// Token has expired
    TokenExpired,
    /// Username or password missing from the login request
    MissingCredentials,
    /// Username or password does not match
    InvalidCredentials,
    /// Internal error
    InternalError(String),
}

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

impl AuthError {
    /// Get the error code for this error.
    ///
    /// Used for logging; token rejections share one public code.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::MalformedToken => "malformed_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::MissingCredentials => "missing_credentials",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::InternalError(_) => "internal_error",
        }
    }

    /// Whether this error is a rejected or absent session token.
    pub fn is_token_rejection(&self) -> bool {
        matches!(
            self,
            AuthError::MissingToken
                | AuthError::MalformedToken
                | AuthError::InvalidSignature
                | AuthError::TokenExpired
        )
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingToken
            | AuthError::MalformedToken
            | AuthError::InvalidSignature
            | AuthError::TokenExpired
            | AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::MissingCredentials => StatusCode::BAD_REQUEST,
            AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "Session token is missing"),
            AuthError::MalformedToken => write!(f, "Session token is malformed"),
            AuthError::InvalidSignature => write!(f, "Session token signature is invalid"),
            AuthError::TokenExpired => write!(f, "Session token has expired"),
            AuthError::MissingCredentials => write!(f, "Username and password are required"),
            AuthError::InvalidCredentials => write!(f, "Invalid username or password"),
            AuthError::InternalError(msg) => write!(f, "Internal authentication error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.is_token_rejection() {
            tracing::debug!(reason = self.error_code(), "session token rejected");
        }

        let (error, error_code) = if self.is_token_rejection() {
            (GENERIC_UNAUTHORIZED.to_string(), "unauthorized".to_string())
        } else {
            (self.to_string(), self.error_code().to_string())
        };

        (status, Json(AuthErrorBody { error, error_code })).into_response()
    }
}
