// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request-time session gate.
//!
//! Decides, once per request and without any I/O, whether a page request is
//! let through or redirected to the login page:
//!
//! 1. exact public routes (the login page) are allowed
//! 2. static assets, `/api/**` and anything with a file extension are allowed;
//!    those routes authorize themselves
//! 3. a request without an `auth-token` cookie is redirected to login with
//!    `from=<current path>`
//! 4. a request carrying the cookie is allowed
//!
//! The gate only checks cookie presence. It is not an authorization
//! boundary: every state-changing API handler verifies the token itself
//! through the [`Auth`](super::Auth) extractor.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;

use super::AUTH_COOKIE;

/// Login page path.
pub const LOGIN_PATH: &str = "/login";

/// Prefixes that bypass the gate (assets, API and operational endpoints).
const OPEN_PREFIXES: [&str; 6] = ["/_next", "/static", "/api", "/health", "/docs", "/api-doc"];

/// Route classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Exact match against the public allow-list
    Public,
    /// Asset, API namespace or file-extension path
    StaticOrApi,
    /// Everything else
    Protected,
}

/// Terminal gate state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Redirect { location: String },
}

/// Route classifier and redirect policy.
#[derive(Debug, Clone)]
pub struct SessionGate {
    public_routes: Vec<String>,
    open_prefixes: Vec<String>,
    login_path: String,
}

impl Default for SessionGate {
    fn default() -> Self {
        Self {
            public_routes: vec![LOGIN_PATH.to_string()],
            open_prefixes: OPEN_PREFIXES.iter().map(|p| p.to_string()).collect(),
            login_path: LOGIN_PATH.to_string(),
        }
    }
}

impl SessionGate {
    /// Add an exact-match public route.
    pub fn with_public_route(mut self, path: impl Into<String>) -> Self {
        self.public_routes.push(path.into());
        self
    }

    /// Classify a request path.
    pub fn classify(&self, path: &str) -> RouteClass {
        if self.public_routes.iter().any(|route| route == path) {
            return RouteClass::Public;
        }

        let under_prefix = self.open_prefixes.iter().any(|prefix| {
            path == prefix
                || path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        });
        if under_prefix || has_file_extension(path) {
            return RouteClass::StaticOrApi;
        }

        RouteClass::Protected
    }

    /// Evaluate the gate for a path given whether a token cookie is present.
    pub fn evaluate(&self, path: &str, has_token: bool) -> GateDecision {
        match self.classify(path) {
            RouteClass::Public | RouteClass::StaticOrApi => GateDecision::Allow,
            RouteClass::Protected if has_token => GateDecision::Allow,
            RouteClass::Protected => GateDecision::Redirect {
                location: self.login_redirect(path),
            },
        }
    }

    fn login_redirect(&self, from: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(from.as_bytes()).collect();
        format!("{}?from={encoded}", self.login_path)
    }
}

/// Last path segment contains a dot (`/favicon.ico`, `/img/logo.svg`).
fn has_file_extension(path: &str) -> bool {
    path.rsplit('/')
        .next()
        .is_some_and(|segment| segment.contains('.'))
}

/// Gate middleware.
///
/// ```rust,ignore
/// let app = Router::new()
///     .merge(pages)
///     .layer(axum::middleware::from_fn_with_state(
///         Arc::new(SessionGate::default()),
///         session_gate,
///     ));
/// ```
pub async fn session_gate(
    State(gate): State<Arc<SessionGate>>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    let has_token = jar
        .get(AUTH_COOKIE)
        .is_some_and(|cookie| !cookie.value().is_empty());

    match gate.evaluate(request.uri().path(), has_token) {
        GateDecision::Allow => next.run(request).await,
        GateDecision::Redirect { location } => {
            tracing::debug!(
                path = %request.uri().path(),
                "no session cookie, redirecting to login"
            );
            Redirect::temporary(&location).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request as HttpRequest, StatusCode},
        middleware::from_fn_with_state,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    #[test]
    fn login_and_open_prefixes_always_allowed() {
        let gate = SessionGate::default();
        for path in [
            "/login",
            "/api",
            "/api/auth/login",
            "/api/root-key/reconcile",
            "/_next/static/chunk.js",
            "/health/live",
            "/favicon.ico",
            "/buckets/photos/cat.png",
        ] {
            for has_token in [false, true] {
                assert_eq!(
                    gate.evaluate(path, has_token),
                    GateDecision::Allow,
                    "{path} with token={has_token}"
                );
            }
        }
    }

    #[test]
    fn protected_path_without_token_redirects_with_from() {
        let gate = SessionGate::default();
        assert_eq!(gate.classify("/buckets"), RouteClass::Protected);
        assert_eq!(
            gate.evaluate("/buckets", false),
            GateDecision::Redirect {
                location: "/login?from=%2Fbuckets".to_string()
            }
        );
        assert!(matches!(
            gate.evaluate("/", false),
            GateDecision::Redirect { .. }
        ));
    }

    #[test]
    fn protected_path_with_token_is_allowed() {
        let gate = SessionGate::default();
        assert_eq!(gate.evaluate("/keys", true), GateDecision::Allow);
    }

    #[test]
    fn prefix_match_respects_segment_boundary() {
        let gate = SessionGate::default();
        assert_eq!(gate.classify("/apiary"), RouteClass::Protected);
        assert_eq!(gate.classify("/login/extra"), RouteClass::Protected);
    }

    #[test]
    fn extra_public_route_is_exact_match() {
        let gate = SessionGate::default().with_public_route("/about");
        assert_eq!(gate.classify("/about"), RouteClass::Public);
        assert_eq!(gate.classify("/about/team"), RouteClass::Protected);
    }

    fn gated_app() -> Router {
        Router::new()
            .route("/buckets", get(|| async { "buckets" }))
            .layer(from_fn_with_state(
                Arc::new(SessionGate::default()),
                session_gate,
            ))
    }

    #[tokio::test]
    async fn middleware_redirects_without_cookie() {
        let response = gated_app()
            .oneshot(HttpRequest::get("/buckets").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/login?from=%2Fbuckets"
        );
    }

    #[tokio::test]
    async fn middleware_passes_with_cookie_present() {
        let response = gated_app()
            .oneshot(
                HttpRequest::get("/buckets")
                    .header(header::COOKIE, format!("{AUTH_COOKIE}=anything"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn middleware_treats_empty_cookie_as_absent() {
        let response = gated_app()
            .oneshot(
                HttpRequest::get("/buckets")
                    .header(header::COOKIE, format!("{AUTH_COOKIE}="))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    }
}
