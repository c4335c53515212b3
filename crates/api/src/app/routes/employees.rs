use std::sync::Arc;

use axum::{Extension, Json, Router, response::IntoResponse, routing::get};

use claimgate_auth::AuthorizationEngine;

use crate::app::catalog;
use crate::app::routes::guarded;
use crate::context::PrincipalContext;

pub fn router(engine: &Arc<AuthorizationEngine>) -> Router {
    Router::new().route("/", guarded(engine, catalog::EMPLOYEES_LIST, get(list_employees)))
}

/// GET /employees - Admin or Manager, and the token must carry a country
pub async fn list_employees(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "employees": [],
        "country": principal.claims().attribute("country"),
    }))
}
