use claimgate_auth::{ClaimSet, Role, SubjectId};
use uuid::Uuid;

/// Correlation id assigned to every inbound request.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for RequestId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Principal context for an admitted request (validated claims).
///
/// Only present on operations that required authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    claims: ClaimSet,
}

impl PrincipalContext {
    pub fn new(claims: ClaimSet) -> Self {
        Self { claims }
    }

    pub fn subject(&self) -> &SubjectId {
        self.claims.subject()
    }

    pub fn roles(&self) -> &[Role] {
        self.claims.roles()
    }

    pub fn claims(&self) -> &ClaimSet {
        &self.claims
    }
}
