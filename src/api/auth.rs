// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Console login, logout and session verification.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::auth::{Auth, AuthError, AuthenticatedUser, AUTH_COOKIE};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub user: AuthenticatedUser,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LogoutResponse {
    pub success: bool,
}

fn session_cookie(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((AUTH_COOKIE, value))
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .path("/")
        .build()
}

/// Log in with the console credentials.
///
/// Sets the `auth-token` session cookie on success.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in; session cookie set", body = LoginResponse),
        (status = 400, description = "Username or password missing"),
        (status = 401, description = "Invalid username or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<LoginResponse>), AuthError> {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            debug!(error = %rejection, "unreadable login body");
            LoginRequest::default()
        }
    };
    let username = request.username.unwrap_or_default();
    let password = request.password.unwrap_or_default();
    if username.trim().is_empty() || password.is_empty() {
        return Err(AuthError::MissingCredentials);
    }

    if !state.credentials.verify(&username, &password) {
        warn!(username = %username, "console login rejected");
        return Err(AuthError::InvalidCredentials);
    }

    let token = state.codec.issue(&username);
    let mut cookie = session_cookie(token, state.cookie_secure);
    cookie.set_max_age(time::Duration::seconds(state.codec.ttl().num_seconds()));

    info!(username = %username, "console login");
    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            user: AuthenticatedUser {
                username,
                expires_at: 0,
            },
        }),
    ))
}

/// Log out by clearing the session cookie.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    responses(
        (status = 200, description = "Session cookie cleared", body = LogoutResponse)
    )
)]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<LogoutResponse>) {
    let mut cookie = session_cookie(String::new(), state.cookie_secure);
    cookie.make_removal();
    (jar.add(cookie), Json(LogoutResponse { success: true }))
}

/// Verify the session token and return the logged-in user.
#[utoipa::path(
    get,
    path = "/api/auth/verify",
    tag = "Auth",
    responses(
        (status = 200, description = "Session is valid", body = AuthenticatedUser),
        (status = 401, description = "Missing, invalid or expired session")
    )
)]
pub async fn verify(Auth(user): Auth) -> Json<AuthenticatedUser> {
    Json(user)
}

#[cfg(test)]
mod tests {
    use crate::api::router;
    use crate::api::tests::{json_body, send};
    use crate::auth::AUTH_COOKIE;
    use crate::garage::InMemoryCredentialStore;
    use crate::state::AppState;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };

    fn login_request(body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn state() -> AppState {
        AppState::for_tests(InMemoryCredentialStore::new())
    }

    #[tokio::test]
    async fn login_sets_hardened_session_cookie() {
        let state = state();
        let response = send(
            router(state.clone()),
            login_request(serde_json::json!({
                "username": AppState::TEST_USERNAME,
                "password": AppState::TEST_PASSWORD,
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let set_cookie = response.headers()[header::SET_COOKIE]
            .to_str()
            .unwrap()
            .to_string();
        assert!(set_cookie.starts_with(&format!("{AUTH_COOKIE}=")));
        assert!(set_cookie.contains("HttpOnly"));
        assert!(set_cookie.contains("SameSite=Strict"));
        assert!(set_cookie.contains("Secure"));
        assert!(set_cookie.contains("Path=/"));
        assert!(set_cookie.contains("Max-Age=86400"));

        let token = set_cookie
            .trim_start_matches(&format!("{AUTH_COOKIE}="))
            .split(';')
            .next()
            .unwrap();
        assert_eq!(
            state.codec.verify(token).unwrap().username,
            AppState::TEST_USERNAME
        );

        let body = json_body(response).await;
        assert_eq!(body["user"]["username"], AppState::TEST_USERNAME);
    }

    #[tokio::test]
    async fn login_with_missing_fields_is_400() {
        for body in [
            serde_json::json!({}),
            serde_json::json!({ "username": "admin" }),
            serde_json::json!({ "username": "", "password": "x" }),
        ] {
            let response = send(router(state()), login_request(body)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn login_with_unreadable_body_is_400_json() {
        let requests = [
            Request::post("/api/auth/login")
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from("username=admin"))
                .unwrap(),
            Request::post("/api/auth/login").body(Body::empty()).unwrap(),
            Request::post("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        ];
        for request in requests {
            let response = send(router(state()), request).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(json_body(response).await["error_code"], "missing_credentials");
        }
    }

    #[tokio::test]
    async fn login_with_wrong_password_is_401_without_cookie() {
        let response = send(
            router(state()),
            login_request(serde_json::json!({
                "username": AppState::TEST_USERNAME,
                "password": "wrong",
            })),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        let body = json_body(response).await;
        assert_eq!(body["error_code"], "invalid_credentials");
    }

    #[tokio::test]
    async fn logout_clears_cookie() {
        let response = send(
            router(state()),
            Request::post("/api/auth/logout").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        assert!(set_cookie.starts_with(&format!("{AUTH_COOKIE}=;")));
        assert!(set_cookie.contains("Max-Age=0"));
        assert_eq!(json_body(response).await["success"], true);
    }

    #[tokio::test]
    async fn verify_returns_username_for_valid_cookie() {
        let state = state();
        let token = state.codec.issue("admin");
        let response = send(
            router(state),
            Request::get("/api/auth/verify")
                .header(header::COOKIE, format!("{AUTH_COOKIE}={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["username"], "admin");
    }

    #[tokio::test]
    async fn verify_rejects_missing_and_forged_tokens_alike() {
        let forged = format!("{}x", state().codec.issue("admin"));
        let mut bodies = Vec::new();
        for cookie in [None, Some(forged)] {
            let mut request = Request::get("/api/auth/verify");
            if let Some(token) = cookie {
                request = request.header(header::COOKIE, format!("{AUTH_COOKIE}={token}"));
            }
            let response = send(router(state()), request.body(Body::empty()).unwrap()).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            bodies.push(json_body(response).await);
        }
        assert_eq!(bodies[0], bodies[1]);
    }
}
