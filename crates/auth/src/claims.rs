use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::{Role, SubjectId, TokenRejection};

/// Validated identity claims derived from a bearer token.
///
/// A `ClaimSet` only exists after the token's signature and time window have
/// been checked. It is immutable: the `with_*` helpers consume and return a new
/// value, and are meant for constructing fixtures and for the validator itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClaimSet {
    subject: SubjectId,
    roles: Vec<Role>,
    issued_at: Option<DateTime<Utc>>,
    expires_at: DateTime<Utc>,
    attributes: BTreeMap<String, String>,
}

impl ClaimSet {
    pub fn new(subject: impl Into<SubjectId>, expires_at: DateTime<Utc>) -> Self {
        Self {
            subject: subject.into(),
            roles: Vec::new(),
            issued_at: None,
            expires_at,
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_issued_at(mut self, issued_at: DateTime<Utc>) -> Self {
        self.issued_at = Some(issued_at);
        self
    }

    /// Add a role; duplicates are ignored and insertion order is kept.
    pub fn with_role(mut self, role: impl Into<Role>) -> Self {
        let role = role.into();
        if !self.roles.contains(&role) {
            self.roles.push(role);
        }
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    /// The principal's primary (first) role, if the token carried any.
    pub fn role(&self) -> Option<&Role> {
        self.roles.first()
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn has_role(&self, role: &Role) -> bool {
        self.roles.contains(role)
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Generic claim lookup over the auxiliary attributes.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// True iff the attribute exists with a non-blank value.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some_and(|v| !v.trim().is_empty())
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }
}

/// Deterministically validate a token's time window against `now`.
///
/// `leeway` widens the window on both ends to absorb clock skew. A token is
/// expired once `now >= expires_at + leeway`.
pub fn validate_time_window(
    issued_at: Option<DateTime<Utc>>,
    not_before: Option<DateTime<Utc>>,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
    leeway: Duration,
) -> Result<(), TokenRejection> {
    // Timestamps near the representable limit cannot be widened by leeway.
    let widen = |at: DateTime<Utc>| at.checked_add_signed(leeway).ok_or(TokenRejection::Malformed);

    if let Some(iat) = issued_at {
        if expires_at <= iat {
            return Err(TokenRejection::InvalidTimeWindow);
        }
        if widen(now)? < iat {
            return Err(TokenRejection::NotYetValid);
        }
    }
    if let Some(nbf) = not_before {
        if widen(now)? < nbf {
            return Err(TokenRejection::NotYetValid);
        }
    }
    if now >= widen(expires_at)? {
        return Err(TokenRejection::Expired);
    }
    Ok(())
}
