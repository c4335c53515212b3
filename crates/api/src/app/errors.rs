use axum::http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE};
use axum::response::IntoResponse;
use serde_json::json;
use thiserror::Error;

use claimgate_auth::{Denial, ReasonCode, ResponseClass};

/// Router wiring that cannot be served.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("route is guarded by unregistered operation '{0}'")]
    UnregisteredOperation(String),
}

/// Map a denial to its response class.
///
/// Only the class is visible to the caller; the denial's diagnostic detail
/// stays in the logs.
pub fn denial_to_response(denial: &Denial) -> axum::response::Response {
    match denial.reason.response_class() {
        ResponseClass::Unauthenticated => {
            let (code, message, challenge) = match denial.reason {
                ReasonCode::ExpiredToken => (
                    "token_expired",
                    "token expired",
                    r#"Bearer error="invalid_token", error_description="token expired""#,
                ),
                _ => ("unauthenticated", "authentication required", "Bearer"),
            };
            let mut res = json_error(StatusCode::UNAUTHORIZED, code, message);
            res.headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static(challenge));
            res
        }
        ResponseClass::Forbidden => json_error(StatusCode::FORBIDDEN, "forbidden", "access denied"),
        ResponseClass::ServerError => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "internal server error",
        ),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denials_map_to_status_classes() {
        let cases = [
            (ReasonCode::Unauthenticated, StatusCode::UNAUTHORIZED),
            (ReasonCode::ExpiredToken, StatusCode::UNAUTHORIZED),
            (ReasonCode::RoleMismatch, StatusCode::FORBIDDEN),
            (ReasonCode::PolicyMismatch, StatusCode::FORBIDDEN),
            (ReasonCode::ConfigError, StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (reason, status) in cases {
            let res = denial_to_response(&Denial::with_detail(reason, "secret detail"));
            assert_eq!(res.status(), status, "{reason}");
        }
    }

    #[test]
    fn expired_token_carries_invalid_token_challenge() {
        let res = denial_to_response(&Denial::new(ReasonCode::ExpiredToken));
        let challenge = res.headers().get(WWW_AUTHENTICATE).unwrap().to_str().unwrap();
        assert!(challenge.contains("invalid_token"));
    }
}
