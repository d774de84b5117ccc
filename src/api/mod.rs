// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{session_gate, AuthenticatedUser, SessionGate},
    garage::{
        BucketPermissions, Credential, ErrorDetail, KeyBucket, KeyPermissions,
    },
    rootkey::{
        BucketGrantOutcome, BucketGrantStatus, ProvisionRequest, ProvisioningResult,
        ReconciliationReport, RemediationReport,
    },
    state::AppState,
};

pub mod auth;
pub mod health;
pub mod root_key;

pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/verify", get(auth::verify))
        .route("/api/root-key", post(root_key::provision))
        .route(
            "/api/root-key/status",
            get(root_key::status).delete(root_key::clear_status),
        )
        .route(
            "/api/root-key/reconcile",
            get(root_key::reconcile_report).post(root_key::remediate),
        )
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(from_fn_with_state(
            Arc::new(SessionGate::default()),
            session_gate,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::login,
        auth::logout,
        auth::verify,
        root_key::provision,
        root_key::status,
        root_key::clear_status,
        root_key::reconcile_report,
        root_key::remediate,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            AuthenticatedUser,
            auth::LoginRequest,
            auth::LoginResponse,
            auth::LogoutResponse,
            ProvisionRequest,
            ProvisioningResult,
            BucketGrantOutcome,
            Credential,
            KeyBucket,
            KeyPermissions,
            BucketPermissions,
            ErrorDetail,
            root_key::RootKeyStatus,
            root_key::StatusSource,
            root_key::RemediateRequest,
            ReconciliationReport,
            BucketGrantStatus,
            RemediationReport,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Auth", description = "Console login and session"),
        (name = "Root Key", description = "Root key provisioning and grant reconciliation"),
        (name = "Health", description = "Liveness and readiness probes")
    )
)]
struct ApiDoc;

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::garage::InMemoryCredentialStore;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, Response, StatusCode},
    };
    use tower::ServiceExt;

    pub(crate) async fn send(app: Router, request: Request<Body>) -> Response<Body> {
        app.oneshot(request).await.unwrap()
    }

    pub(crate) async fn json_body(response: Response<Body>) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn app() -> Router {
        router(AppState::for_tests(InMemoryCredentialStore::new()))
    }

    #[tokio::test]
    async fn pages_without_session_redirect_to_login() {
        let response = send(app(), Request::get("/buckets").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[header::LOCATION], "/login?from=%2Fbuckets");
    }

    #[tokio::test]
    async fn api_and_health_bypass_the_gate() {
        let response = send(app(), Request::get("/health/live").body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = send(
            app(),
            Request::get("/api/auth/verify").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let response = send(
            app(),
            Request::get("/api-doc/openapi.json").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let doc = json_body(response).await;
        assert!(doc["paths"]["/api/root-key"].is_object());
        assert!(doc["paths"]["/api/auth/login"].is_object());
    }

    #[tokio::test]
    async fn responses_carry_a_request_id() {
        let response = send(app(), Request::get("/health/live").body(Body::empty()).unwrap()).await;
        assert!(response.headers().contains_key("x-request-id"));
    }
}
