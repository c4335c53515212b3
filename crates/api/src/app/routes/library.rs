use std::sync::Arc;

use axum::{Json, Router, response::IntoResponse, routing::get};

use claimgate_auth::AuthorizationEngine;

use crate::app::catalog;
use crate::app::routes::guarded;

pub fn router(engine: &Arc<AuthorizationEngine>) -> Router {
    Router::new().route("/items", guarded(engine, catalog::LIBRARY_LIST, get(list_items)))
}

/// GET /library/items - principals aged 18 or over
pub async fn list_items() -> impl IntoResponse {
    Json(serde_json::json!({ "items": [] }))
}
