//! `claimgate-auth`: claims-based, declarative authorization engine.
//!
//! This crate is intentionally decoupled from HTTP and storage: it turns a
//! bearer token and a static operation descriptor into a typed [`Decision`].

pub mod authorize;
pub mod claims;
pub mod config;
pub mod decision;
pub mod error;
pub mod operation;
pub mod policy;
pub mod principal;
pub mod requirements;
pub mod roles;
pub mod token;

pub use authorize::{
    AuthorizationEngine, AuthorizationExplanation, EvaluationStep, PolicyCheck, PrincipalState,
    TokenCheck, self_check,
};
pub use claims::{ClaimSet, validate_time_window};
pub use config::{AuthzConfig, KeyConfig, PolicyConfig, TokenConfig};
pub use decision::{Decision, Denial, ReasonCode, ResponseClass};
pub use error::{ConfigError, ConfigResult};
pub use operation::{OperationDescriptor, OperationTable};
pub use policy::{Policy, PolicyRegistry, PolicyRegistryBuilder, PolicyRequirement};
pub use principal::SubjectId;
pub use requirements::{UnresolvedPolicy, evaluate_policy, role_requirement_satisfied};
pub use roles::{AllowedRoles, Role, RoleMode};
pub use token::{
    JwtTokenValidator, KeyError, KeyRing, TokenRejection, TokenSettings, TokenValidator,
    VerificationKey,
};
