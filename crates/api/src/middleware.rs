use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::Instrument;

use claimgate_auth::AuthorizationEngine;

use crate::app::errors::denial_to_response;
use crate::context::{PrincipalContext, RequestId};

/// Per-route guard state: the shared engine plus the operation the route maps to.
#[derive(Clone)]
pub struct OperationGuard {
    pub engine: Arc<AuthorizationEngine>,
    pub operation: &'static str,
}

impl OperationGuard {
    pub fn new(engine: Arc<AuthorizationEngine>, operation: &'static str) -> Self {
        Self { engine, operation }
    }
}

/// Ask the decision point whether this request may reach its handler.
pub async fn authorize_operation(
    State(guard): State<OperationGuard>,
    mut req: Request,
    next: Next,
) -> Response {
    let token = extract_bearer(req.headers()).map(str::to_owned);

    match guard
        .engine
        .admit_operation_at(guard.operation, token.as_deref(), Utc::now())
    {
        Ok(Some(claims)) => {
            req.extensions_mut().insert(PrincipalContext::new(claims));
            next.run(req).await
        }
        Ok(None) => next.run(req).await,
        Err(denial) => {
            // The engine already logged the denial at info inside this request's span.
            tracing::debug!(
                operation = guard.operation,
                reason = %denial.reason,
                "request denied, responding"
            );
            denial_to_response(&denial)
        }
    }
}

/// Assign a request id, run the rest of the stack inside its span and echo it back.
pub async fn request_context(mut req: Request, next: Next) -> Response {
    let request_id = RequestId::new();
    req.extensions_mut().insert(request_id);

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    let mut res = next.run(req).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        res.headers_mut().insert("x-request-id", value);
    }
    res
}

/// The bearer credential, if an `Authorization` header was sent.
///
/// A header that is present but unusable is passed through as-is so the
/// validator rejects it, rather than being treated as "no token".
pub(crate) fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let Ok(header) = header.to_str() else {
        return Some("");
    };

    // The auth scheme is case-insensitive.
    match header.split_once(' ') {
        Some((scheme, credential)) if scheme.eq_ignore_ascii_case("bearer") => Some(credential.trim()),
        _ => Some(header),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::AUTHORIZATION;

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn bearer_extraction() {
        assert_eq!(extract_bearer(&HeaderMap::new()), None);
        assert_eq!(extract_bearer(&headers("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(extract_bearer(&headers("Bearer   ")), Some(""));
        assert_eq!(extract_bearer(&headers("Basic dXNlcjpwYXNz")), Some("Basic dXNlcjpwYXNz"));
    }

    #[test]
    fn bearer_scheme_ignores_case() {
        assert_eq!(extract_bearer(&headers("bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(extract_bearer(&headers("BEARER abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(extract_bearer(&headers("Bearerabc")), Some("Bearerabc"));
    }
}
