use std::sync::Arc;

use axum::{Extension, Json, Router, http::StatusCode, response::IntoResponse, routing::get};
use serde::Deserialize;

use claimgate_auth::AuthorizationEngine;

use crate::app::catalog;
use crate::app::routes::guarded;
use crate::context::PrincipalContext;

#[derive(Debug, Deserialize)]
pub struct CreateProduct {
    pub name: String,
}

pub fn router(engine: &Arc<AuthorizationEngine>) -> Router {
    Router::new().route(
        "/",
        guarded(engine, catalog::PRODUCTS_LIST, get(list_products))
            .merge(guarded(engine, catalog::PRODUCTS_CREATE, axum::routing::post(create_product))),
    )
}

/// GET /products - any authenticated principal
pub async fn list_products() -> impl IntoResponse {
    Json(serde_json::json!({ "products": [] }))
}

/// POST /products - Admin or Manager
pub async fn create_product(
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<CreateProduct>,
) -> impl IntoResponse {
    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "name": body.name,
            "created_by": principal.subject().as_str(),
        })),
    )
}
