use std::sync::Arc;

use axum::{Router, routing::MethodRouter, routing::get};

use claimgate_auth::AuthorizationEngine;

use crate::app::catalog;
use crate::middleware::{OperationGuard, authorize_operation};

pub mod authz;
pub mod employees;
pub mod library;
pub mod products;
pub mod system;
pub mod users;

/// Attach the authorization guard for `operation` to a method router.
pub fn guarded(engine: &Arc<AuthorizationEngine>, operation: &'static str, route: MethodRouter) -> MethodRouter {
    route.route_layer(axum::middleware::from_fn_with_state(
        OperationGuard::new(Arc::clone(engine), operation),
        authorize_operation,
    ))
}

/// Router for every guarded endpoint.
pub fn router(engine: &Arc<AuthorizationEngine>) -> Router {
    Router::new()
        .route("/whoami", guarded(engine, catalog::WHOAMI, get(system::whoami)))
        .nest("/users", users::router(engine))
        .nest("/employees", employees::router(engine))
        .nest("/products", products::router(engine))
        .nest("/library", library::router(engine))
        .nest("/authz", authz::router(engine))
}
