//! HTTP application wiring (Axum router + authorization guards).
//!
//! - `catalog.rs`: built-in operation table and policy names
//! - `routes/`: HTTP routes + handlers (one file per resource area)
//! - `errors.rs`: denial → response mapping and JSON error bodies

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use claimgate_auth::AuthorizationEngine;

use crate::middleware;

pub mod catalog;
pub mod errors;
pub mod routes;

pub use errors::AppError;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Fails if any route is guarded by an operation the engine does not know,
/// so a mis-wired router never starts serving.
pub fn build_app(engine: Arc<AuthorizationEngine>) -> Result<Router, AppError> {
    if let Some(missing) = catalog::GUARDED_OPERATIONS
        .iter()
        .find(|op| engine.operation(op).is_none())
    {
        return Err(AppError::UnregisteredOperation(missing.to_string()));
    }

    let app = Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router(&engine))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::request_context))
                .layer(Extension(engine)),
        );

    Ok(app)
}
