use serde::Serialize;

/// Why a request was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// No token, or a token that failed verification.
    Unauthenticated,
    /// Correctly signed but past expiry; recoverable by re-authenticating.
    ExpiredToken,
    RoleMismatch,
    PolicyMismatch,
    /// The operation references something that was never registered.
    ConfigError,
}

/// The class of response a dispatcher should produce for a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseClass {
    Unauthenticated,
    Forbidden,
    ServerError,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::Unauthenticated => "unauthenticated",
            ReasonCode::ExpiredToken => "expired_token",
            ReasonCode::RoleMismatch => "role_mismatch",
            ReasonCode::PolicyMismatch => "policy_mismatch",
            ReasonCode::ConfigError => "config_error",
        }
    }

    pub fn response_class(&self) -> ResponseClass {
        match self {
            ReasonCode::Unauthenticated | ReasonCode::ExpiredToken => ResponseClass::Unauthenticated,
            ReasonCode::RoleMismatch | ReasonCode::PolicyMismatch => ResponseClass::Forbidden,
            ReasonCode::ConfigError => ResponseClass::ServerError,
        }
    }
}

impl core::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A denial with an optional diagnostic detail.
///
/// `detail` is for logs and audit output only; dispatchers must not echo it
/// back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Denial {
    pub reason: ReasonCode,
    pub detail: Option<String>,
}

impl Denial {
    pub fn new(reason: ReasonCode) -> Self {
        Self { reason, detail: None }
    }

    pub fn with_detail(reason: ReasonCode, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: Some(detail.into()),
        }
    }
}

/// Outcome of authorizing one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny(Denial),
}

impl Decision {
    pub fn deny(reason: ReasonCode) -> Self {
        Self::Deny(Denial::new(reason))
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn reason(&self) -> Option<ReasonCode> {
        match self {
            Decision::Allow => None,
            Decision::Deny(denial) => Some(denial.reason),
        }
    }
}

impl<T> From<Result<T, Denial>> for Decision {
    fn from(value: Result<T, Denial>) -> Self {
        match value {
            Ok(_) => Decision::Allow,
            Err(denial) => Decision::Deny(denial),
        }
    }
}
