use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;

use super::creation::CreationError;
use super::dispatcher::LifecycleDispatcher;
use super::domain::{TenantEvent, TenantId};
use super::status::{CallerContext, StatusQueryError, StatusQueryService};
use crate::config::SecretToken;

/// Shared state behind the lifecycle endpoints.
pub struct LifecycleApi {
    pub dispatcher: LifecycleDispatcher,
    pub status: StatusQueryService,
    pub tokens: Vec<SecretToken>,
}

impl LifecycleApi {
    /// Resolve the caller from an `Authorization: Bearer` header.
    pub fn caller(&self, headers: &HeaderMap) -> CallerContext {
        let presented = headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim);

        match presented {
            Some(token)
                if !token.is_empty() && self.tokens.iter().any(|known| known.expose() == token) =>
            {
                CallerContext::authenticated("api-token")
            }
            _ => CallerContext::Anonymous,
        }
    }
}

pub fn lifecycle_router(api: Arc<LifecycleApi>) -> Router {
    Router::new()
        .route("/api/v1/tenant-events", post(event_handler))
        .route(
            "/api/v1/tenants/:tenant_id/deployment-status",
            get(status_handler),
        )
        .with_state(api)
}

pub(crate) async fn event_handler(
    State(api): State<Arc<LifecycleApi>>,
    headers: HeaderMap,
    axum::Json(event): axum::Json<TenantEvent>,
) -> Response {
    if !api.caller(&headers).is_authenticated() {
        return error_response(StatusCode::UNAUTHORIZED, "unauthenticated", None);
    }

    match api.dispatcher.handle(&event).await {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(error @ CreationError::MissingSubdomain { .. }) => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "missing-subdomain",
            Some(error.to_string()),
        ),
        Err(error) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "creation-failed",
            Some(error.to_string()),
        ),
    }
}

pub(crate) async fn status_handler(
    State(api): State<Arc<LifecycleApi>>,
    headers: HeaderMap,
    Path(tenant_id): Path<String>,
) -> Response {
    let caller = api.caller(&headers);
    if !caller.is_authenticated() {
        return error_response(StatusCode::UNAUTHORIZED, "unauthenticated", None);
    }
    let tenant_id = match TenantId::parse(tenant_id) {
        Ok(tenant_id) => tenant_id,
        Err(error) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid-tenant-id",
                Some(error.to_string()),
            )
        }
    };

    match api.status.deployment_status(&caller, &tenant_id).await {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(StatusQueryError::Unauthenticated) => {
            error_response(StatusCode::UNAUTHORIZED, "unauthenticated", None)
        }
        Err(error @ StatusQueryError::NotFound(_)) => {
            error_response(StatusCode::NOT_FOUND, "not-found", Some(error.to_string()))
        }
        Err(error) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            Some(error.to_string()),
        ),
    }
}

fn error_response(status: StatusCode, code: &str, message: Option<String>) -> Response {
    let payload = json!({
        "error": code,
        "message": message,
    });
    (status, axum::Json(payload)).into_response()
}
