//! Authorization audit endpoint: "why would my token be allowed/denied here?"

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
};
use chrono::Utc;

use claimgate_auth::AuthorizationEngine;

use crate::app::{catalog, errors};
use crate::app::routes::guarded;
use crate::middleware::extract_bearer;

pub fn router(engine: &Arc<AuthorizationEngine>) -> Router {
    Router::new().route(
        "/explain/:operation",
        guarded(engine, catalog::AUTHZ_EXPLAIN, get(explain_operation)),
    )
}

/// GET /authz/explain/:operation - explain the caller's own token against an operation
pub async fn explain_operation(
    Extension(engine): Extension<Arc<AuthorizationEngine>>,
    Path(operation): Path<String>,
    headers: HeaderMap,
) -> axum::response::Response {
    let Some(descriptor) = engine.operation(&operation) else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "operation not found");
    };

    let explanation = engine.explain_at(descriptor, extract_bearer(&headers), Utc::now());
    (StatusCode::OK, Json(explanation)).into_response()
}
