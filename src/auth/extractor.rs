// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractor for verified console sessions.
//!
//! Use the `Auth` extractor in every handler that requires proof of
//! identity:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(user): Auth) -> impl IntoResponse {
//!     // user is AuthenticatedUser
//! }
//! ```

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use axum_extra::extract::cookie::CookieJar;

use super::{token::TokenCodec, AuthError, AuthenticatedUser, AUTH_COOKIE};

/// Extractor for authenticated users.
///
/// Reads the `auth-token` cookie (or, for non-browser clients, an
/// `Authorization: Bearer` header) and fully verifies signature and expiry.
pub struct Auth(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for Auth
where
    Arc<TokenCodec>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = session_token(parts).ok_or(AuthError::MissingToken)?;
        let codec = Arc::<TokenCodec>::from_ref(state);

        let claims = codec.verify(&token).inspect_err(|e| {
            tracing::info!(reason = e.error_code(), "session verification failed");
        })?;

        Ok(Auth(AuthenticatedUser::from_claims(claims)))
    }
}

/// Session token from the cookie, falling back to a bearer header.
fn session_token(parts: &Parts) -> Option<String> {
    let jar = CookieJar::from_headers(&parts.headers);
    if let Some(cookie) = jar.get(AUTH_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::token::{tests::FixedClock, SigningKey};
    use axum::http::{header::COOKIE, Request};

    const NOW: i64 = 1_760_000_000;

    fn codec(clock: Arc<FixedClock>) -> Arc<TokenCodec> {
        Arc::new(TokenCodec::with_clock(
            SigningKey::new("extractor-secret").unwrap(),
            clock,
        ))
    }

    fn parts_with(header: Option<(&str, String)>) -> Parts {
        let mut builder = Request::builder().uri("/api/root-key");
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn requires_token() {
        let state = codec(FixedClock::at(NOW));
        let mut parts = parts_with(None);
        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingToken)));
    }

    #[tokio::test]
    async fn accepts_valid_cookie() {
        let state = codec(FixedClock::at(NOW));
        let token = state.issue("admin");
        let mut parts = parts_with(Some((COOKIE.as_str(), format!("{AUTH_COOKIE}={token}"))));

        let Auth(user) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.username, "admin");
    }

    #[tokio::test]
    async fn accepts_bearer_header() {
        let state = codec(FixedClock::at(NOW));
        let token = state.issue("cli");
        let mut parts = parts_with(Some((AUTHORIZATION.as_str(), format!("Bearer {token}"))));

        let Auth(user) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(user.username, "cli");
    }

    #[tokio::test]
    async fn rejects_expired_cookie() {
        let clock = FixedClock::at(NOW);
        let state = codec(clock.clone());
        let token = state.issue("admin");
        clock.set(NOW + 24 * 3600 + 1);

        let mut parts = parts_with(Some((COOKIE.as_str(), format!("{AUTH_COOKIE}={token}"))));
        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::TokenExpired)));
    }

    #[tokio::test]
    async fn rejects_cookie_presence_without_valid_token() {
        let state = codec(FixedClock::at(NOW));
        let mut parts = parts_with(Some((COOKIE.as_str(), format!("{AUTH_COOKIE}=garbage"))));
        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MalformedToken)));
    }
}
