use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::requirements::{evaluate_policy, role_requirement_satisfied};
use crate::{
    ClaimSet, ConfigError, ConfigResult, Decision, Denial, OperationDescriptor, OperationTable,
    PolicyRegistry, ReasonCode, SubjectId, TokenRejection, TokenValidator,
};

/// Verify that every policy referenced by an operation is registered.
///
/// Run once at startup; a failure here means the process must not serve
/// traffic.
pub fn self_check(operations: &OperationTable, policies: &PolicyRegistry) -> ConfigResult<()> {
    let mut ops: Vec<&OperationDescriptor> = operations.iter().collect();
    ops.sort_by(|a, b| a.name.cmp(&b.name));

    for op in ops {
        if let Some(policy) = op.effective_policy() {
            if !policies.contains(policy) {
                return Err(ConfigError::UnresolvedPolicy {
                    operation: op.name.clone(),
                    policy: policy.to_string(),
                });
            }
        }
    }
    Ok(())
}

/// One step of a single authorization evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum EvaluationStep {
    AnonymousAllow,
    TokenCheck { result: TokenCheck },
    RoleCheck { passed: bool },
    PolicyCheck { policy: String, result: PolicyCheck },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenCheck {
    Valid,
    Missing,
    Invalid,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyCheck {
    Pass,
    Fail,
    ConfigError,
}

/// Authenticated principal as seen by the evaluation (for audit output).
#[derive(Debug, Clone, Serialize)]
pub struct PrincipalState {
    pub subject: SubjectId,
    pub roles: Vec<String>,
    pub attributes: Vec<String>,
}

/// Detailed, auditable account of one authorization decision.
///
/// Contains diagnostic detail; keep it out of responses to untrusted callers.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub operation: String,
    pub allowed_roles: Vec<String>,
    pub policy: Option<String>,
    pub anonymous: bool,
    pub decision: Decision,
    pub steps: Vec<EvaluationStep>,
    pub principal: Option<PrincipalState>,
}

/// The authorization decision point.
///
/// Holds only immutable, shared configuration; every call is an independent
/// evaluation, so one engine can serve any number of concurrent requests.
#[derive(Clone)]
pub struct AuthorizationEngine {
    validator: Arc<dyn TokenValidator>,
    policies: Arc<PolicyRegistry>,
    operations: Arc<OperationTable>,
}

impl core::fmt::Debug for AuthorizationEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuthorizationEngine")
            .field("policies", &self.policies.names())
            .field("operations", &self.operations.len())
            .finish_non_exhaustive()
    }
}

impl AuthorizationEngine {
    /// Build the engine and run the startup self-check.
    pub fn new(
        validator: Arc<dyn TokenValidator>,
        policies: PolicyRegistry,
        operations: OperationTable,
    ) -> ConfigResult<Self> {
        self_check(&operations, &policies)?;

        tracing::info!(
            policies = policies.len(),
            operations = operations.len(),
            "authorization engine ready"
        );

        Ok(Self {
            validator,
            policies: Arc::new(policies),
            operations: Arc::new(operations),
        })
    }

    pub fn policies(&self) -> &PolicyRegistry {
        &self.policies
    }

    pub fn operations(&self) -> &OperationTable {
        &self.operations
    }

    pub fn operation(&self, name: &str) -> Option<&OperationDescriptor> {
        self.operations.get(name)
    }

    /// Decide whether `operation` may proceed with the given bearer token.
    pub fn authorize(&self, operation: &OperationDescriptor, token: Option<&str>) -> Decision {
        self.authorize_at(operation, token, Utc::now())
    }

    /// Same as [`authorize`](Self::authorize) against an explicit clock reading.
    pub fn authorize_at(
        &self,
        operation: &OperationDescriptor,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Decision {
        self.admit_at(operation, token, now).into()
    }

    /// Authorize a registered operation by name.
    ///
    /// An unknown name is a configuration error, never an allow.
    pub fn authorize_operation(&self, name: &str, token: Option<&str>) -> Decision {
        self.admit_operation_at(name, token, Utc::now()).into()
    }

    /// Like [`authorize_operation`](Self::authorize_operation), but hands back the
    /// validated claims on success (`None` for anonymous operations).
    pub fn admit_operation_at(
        &self,
        name: &str,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<ClaimSet>, Denial> {
        match self.operations.get(name) {
            Some(operation) => self.admit_at(operation, token, now),
            None => {
                tracing::error!(operation = name, "operation is not registered");
                Err(Denial::with_detail(
                    ReasonCode::ConfigError,
                    format!("operation '{name}' is not registered"),
                ))
            }
        }
    }

    pub fn admit_at(
        &self,
        operation: &OperationDescriptor,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<ClaimSet>, Denial> {
        let result = self.evaluate(operation, token, now, |_| {});
        log_outcome(operation, &result);
        result
    }

    /// Evaluate and report every step taken.
    pub fn explain_at(
        &self,
        operation: &OperationDescriptor,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> AuthorizationExplanation {
        let mut steps = Vec::new();
        let result = self.evaluate(operation, token, now, |step| steps.push(step));

        let principal = result.as_ref().ok().and_then(Option::as_ref).map(|claims| PrincipalState {
            subject: claims.subject().clone(),
            roles: claims.roles().iter().map(|r| r.as_str().to_string()).collect(),
            attributes: claims.attributes().keys().cloned().collect(),
        });

        AuthorizationExplanation {
            operation: operation.name.clone(),
            allowed_roles: operation.allowed_roles.iter().map(|r| r.as_str().to_string()).collect(),
            policy: operation.policy.clone(),
            anonymous: operation.anonymous,
            decision: result.into(),
            steps,
            principal,
        }
    }

    /// Start → AnonymousAllow | TokenCheck → RoleCheck → PolicyCheck → Allow/Deny.
    fn evaluate<F>(
        &self,
        operation: &OperationDescriptor,
        token: Option<&str>,
        now: DateTime<Utc>,
        mut record: F,
    ) -> Result<Option<ClaimSet>, Denial>
    where
        F: FnMut(EvaluationStep),
    {
        if operation.anonymous {
            record(EvaluationStep::AnonymousAllow);
            return Ok(None);
        }

        let Some(token) = token else {
            record(EvaluationStep::TokenCheck { result: TokenCheck::Missing });
            return Err(Denial::with_detail(ReasonCode::Unauthenticated, "missing bearer token"));
        };

        let claims = match self.validator.validate(token, now) {
            Ok(claims) => {
                record(EvaluationStep::TokenCheck { result: TokenCheck::Valid });
                claims
            }
            Err(TokenRejection::Expired) => {
                record(EvaluationStep::TokenCheck { result: TokenCheck::Expired });
                return Err(Denial::with_detail(
                    ReasonCode::ExpiredToken,
                    TokenRejection::Expired.to_string(),
                ));
            }
            Err(rejection) => {
                record(EvaluationStep::TokenCheck { result: TokenCheck::Invalid });
                return Err(Denial::with_detail(ReasonCode::Unauthenticated, rejection.to_string()));
            }
        };

        if !operation.allowed_roles.is_empty() {
            let passed = role_requirement_satisfied(&operation.allowed_roles, &claims);
            record(EvaluationStep::RoleCheck { passed });
            if !passed {
                return Err(Denial::with_detail(
                    ReasonCode::RoleMismatch,
                    format!(
                        "principal roles {:?} not among {:?}",
                        claims.roles().iter().map(|r| r.as_str()).collect::<Vec<_>>(),
                        operation.allowed_roles.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
                    ),
                ));
            }
        }

        if let Some(policy) = operation.policy.as_deref() {
            match evaluate_policy(&self.policies, policy, &claims, now) {
                Ok(true) => record(EvaluationStep::PolicyCheck {
                    policy: policy.to_string(),
                    result: PolicyCheck::Pass,
                }),
                Ok(false) => {
                    record(EvaluationStep::PolicyCheck {
                        policy: policy.to_string(),
                        result: PolicyCheck::Fail,
                    });
                    return Err(Denial::with_detail(
                        ReasonCode::PolicyMismatch,
                        format!("policy '{policy}' not satisfied"),
                    ));
                }
                Err(unresolved) => {
                    record(EvaluationStep::PolicyCheck {
                        policy: policy.to_string(),
                        result: PolicyCheck::ConfigError,
                    });
                    return Err(Denial::with_detail(ReasonCode::ConfigError, unresolved.to_string()));
                }
            }
        }

        Ok(Some(claims))
    }
}

fn log_outcome(operation: &OperationDescriptor, result: &Result<Option<ClaimSet>, Denial>) {
    match result {
        Ok(claims) => tracing::debug!(
            operation = %operation.name,
            subject = claims.as_ref().map(|c| c.subject().as_str()).unwrap_or("<anonymous>"),
            "authorization allowed"
        ),
        Err(denial) if denial.reason == ReasonCode::ConfigError => tracing::error!(
            operation = %operation.name,
            detail = denial.detail.as_deref().unwrap_or_default(),
            "authorization misconfigured"
        ),
        Err(denial) => tracing::info!(
            operation = %operation.name,
            reason = %denial.reason,
            detail = denial.detail.as_deref().unwrap_or_default(),
            "authorization denied"
        ),
    }
}
