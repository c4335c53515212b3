use axum::{Extension, Json, http::StatusCode, response::IntoResponse};

use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(principal): Extension<PrincipalContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "subject": principal.subject().as_str(),
        "roles": principal.roles().iter().map(|r| r.as_str()).collect::<Vec<_>>(),
        "attributes": principal.claims().attributes().keys().collect::<Vec<_>>(),
        "expires_at": principal.claims().expires_at().to_rfc3339(),
    }))
}
