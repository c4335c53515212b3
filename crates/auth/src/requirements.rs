//! Role and policy requirement evaluators.
//!
//! Both are pure: no IO, no shared mutable state.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{AllowedRoles, ClaimSet, PolicyRegistry};

/// The operation names a policy the registry does not know.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("policy '{0}' is not registered")]
pub struct UnresolvedPolicy(pub String);

/// Whether the principal holds at least one of the allowed roles.
///
/// An empty set admits any authenticated principal. Matching is exact and
/// case-sensitive; roles do not imply one another.
pub fn role_requirement_satisfied(allowed: &AllowedRoles, claims: &ClaimSet) -> bool {
    allowed.is_empty() || claims.roles().iter().any(|role| allowed.contains(role))
}

/// Resolve `policy` in the registry and apply it to the claim set.
pub fn evaluate_policy(
    registry: &PolicyRegistry,
    policy: &str,
    claims: &ClaimSet,
    now: DateTime<Utc>,
) -> Result<bool, UnresolvedPolicy> {
    registry
        .get(policy)
        .map(|p| p.evaluate(claims, now))
        .ok_or_else(|| UnresolvedPolicy(policy.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PolicyRequirement, Role};
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn principal(role: &'static str) -> ClaimSet {
        ClaimSet::new("u-1", now()).with_role(role)
    }

    #[test]
    fn any_listed_role_satisfies() {
        let allowed: AllowedRoles = ["Admin", "Manager"].into_iter().collect();

        assert!(role_requirement_satisfied(&allowed, &principal("Admin")));
        assert!(role_requirement_satisfied(&allowed, &principal("Manager")));
        assert!(!role_requirement_satisfied(&allowed, &principal("Employee")));
    }

    #[test]
    fn no_hierarchy_and_case_sensitive() {
        let allowed: AllowedRoles = ["Admin"].into_iter().collect();

        assert!(!role_requirement_satisfied(&allowed, &principal("SuperAdmin")));
        assert!(!role_requirement_satisfied(&allowed, &principal("admin")));
    }

    #[test]
    fn empty_set_admits_anyone_authenticated() {
        let allowed = AllowedRoles::any_authenticated();

        assert!(role_requirement_satisfied(&allowed, &principal("Whatever")));
        assert!(role_requirement_satisfied(&allowed, &ClaimSet::new("no-role", now())));
    }

    #[test]
    fn roleless_principal_fails_restricted_operation() {
        let allowed: AllowedRoles = ["Admin"].into_iter().collect();
        assert!(!role_requirement_satisfied(&allowed, &ClaimSet::new("no-role", now())));
    }

    #[test]
    fn multi_role_principal_needs_intersection() {
        let allowed: AllowedRoles = ["Admin", "Manager"].into_iter().collect();
        let claims = ClaimSet::new("u-2", now()).with_role("Employee").with_role("Manager");

        assert!(role_requirement_satisfied(&allowed, &claims));

        let claims = ClaimSet::new("u-3", now()).with_role("Employee").with_role("Auditor");
        assert!(!role_requirement_satisfied(&allowed, &claims));
    }

    #[test]
    fn unknown_policy_is_unresolved_not_false() {
        let registry = PolicyRegistry::builder()
            .declare("HasCountry", PolicyRequirement::claim_present("country"))
            .unwrap()
            .build();
        let claims = principal("Admin");

        assert_eq!(evaluate_policy(&registry, "HasCountry", &claims, now()), Ok(false));
        assert_eq!(
            evaluate_policy(&registry, "Missing", &claims, now()),
            Err(UnresolvedPolicy("Missing".into()))
        );
    }

    proptest! {
        #[test]
        fn role_check_is_set_membership(
            allowed in proptest::collection::btree_set("[A-Ca-c]{1,3}", 0..5),
            held in "[A-Ca-c]{1,3}",
        ) {
            let roles: AllowedRoles = allowed.iter().cloned().map(Role::from).collect();
            let claims = ClaimSet::new("p", now()).with_role(Role::from(held.clone()));

            let expected = allowed.is_empty() || allowed.contains(&held);
            prop_assert_eq!(role_requirement_satisfied(&roles, &claims), expected);
        }
    }
}
