//! User account endpoints. Account storage lives outside this service; the
//! handlers only acknowledge admitted requests.

use std::sync::Arc;

use axum::{Extension, Json, Router, http::StatusCode, response::IntoResponse, routing::get, routing::post};
use serde::Deserialize;

use claimgate_auth::AuthorizationEngine;

use crate::app::catalog;
use crate::app::routes::guarded;
use crate::context::PrincipalContext;

#[derive(Debug, Deserialize)]
pub struct RegisterUser {
    pub email: String,
}

pub fn router(engine: &Arc<AuthorizationEngine>) -> Router {
    Router::new()
        .route("/", guarded(engine, catalog::USERS_LIST, get(list_users)))
        .route("/register", guarded(engine, catalog::USERS_REGISTER, post(register)))
}

/// POST /users/register - open to anonymous callers
pub async fn register(Json(body): Json<RegisterUser>) -> impl IntoResponse {
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "accepted", "email": body.email })),
    )
}

/// GET /users - administrators only
pub async fn list_users(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(serde_json::json!({ "users": [], "requested_by": principal.subject().as_str() }))
}
