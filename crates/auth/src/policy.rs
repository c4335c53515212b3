//! Named policies and the registry that resolves them.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{ClaimSet, ConfigError, ConfigResult};

fn default_birth_claim() -> String {
    "date_of_birth".to_string()
}

/// Declarative predicate over a claim set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyRequirement {
    /// The attribute exists with a non-blank value.
    ClaimPresent { claim: String },

    /// The attribute equals one of `values` (case-sensitive).
    ClaimValue { claim: String, values: Vec<String> },

    /// The birth-date attribute puts the principal at `years` or older.
    MinimumAge {
        #[serde(default = "default_birth_claim")]
        claim: String,
        years: u32,
    },

    /// Every nested requirement holds.
    AllOf { requirements: Vec<PolicyRequirement> },
}

impl PolicyRequirement {
    pub fn claim_present(claim: impl Into<String>) -> Self {
        Self::ClaimPresent { claim: claim.into() }
    }

    pub fn minimum_age(years: u32) -> Self {
        Self::MinimumAge {
            claim: default_birth_claim(),
            years,
        }
    }

    pub fn is_satisfied(&self, claims: &ClaimSet, now: DateTime<Utc>) -> bool {
        match self {
            Self::ClaimPresent { claim } => claims.has_attribute(claim),
            Self::ClaimValue { claim, values } => claims
                .attribute(claim)
                .is_some_and(|v| values.iter().any(|allowed| allowed == v)),
            Self::MinimumAge { claim, years } => claims
                .attribute(claim)
                .and_then(parse_birth_date)
                .and_then(|dob| now.date_naive().years_since(dob))
                .is_some_and(|age| age >= *years),
            Self::AllOf { requirements } => requirements.iter().all(|r| r.is_satisfied(claims, now)),
        }
    }

    fn check(&self) -> Result<(), String> {
        match self {
            Self::ClaimPresent { claim } | Self::MinimumAge { claim, .. } if claim.trim().is_empty() => {
                Err("claim name is empty".to_string())
            }
            Self::ClaimValue { claim, .. } if claim.trim().is_empty() => Err("claim name is empty".to_string()),
            Self::ClaimValue { values, .. } if values.is_empty() => Err("no accepted values".to_string()),
            Self::AllOf { requirements } if requirements.is_empty() => {
                Err("all_of has no requirements".to_string())
            }
            Self::AllOf { requirements } => requirements.iter().try_for_each(Self::check),
            _ => Ok(()),
        }
    }
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
fn parse_birth_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|d| d.date_naive()))
}

type CustomPredicate = Arc<dyn Fn(&ClaimSet) -> bool + Send + Sync>;

#[derive(Clone)]
enum Predicate {
    Declared(PolicyRequirement),
    Custom(CustomPredicate),
}

/// A named predicate over a claim set.
#[derive(Clone)]
pub struct Policy {
    name: String,
    predicate: Predicate,
}

impl core::fmt::Debug for Policy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut s = f.debug_struct("Policy");
        s.field("name", &self.name);
        match &self.predicate {
            Predicate::Declared(req) => s.field("requirement", req),
            Predicate::Custom(_) => s.field("requirement", &"<custom>"),
        };
        s.finish()
    }
}

impl Policy {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declarative requirement, if this policy was not registered as a closure.
    pub fn requirement(&self) -> Option<&PolicyRequirement> {
        match &self.predicate {
            Predicate::Declared(req) => Some(req),
            Predicate::Custom(_) => None,
        }
    }

    pub fn evaluate(&self, claims: &ClaimSet, now: DateTime<Utc>) -> bool {
        match &self.predicate {
            Predicate::Declared(req) => req.is_satisfied(claims, now),
            Predicate::Custom(f) => f(claims),
        }
    }
}

/// Read-only mapping from policy name to policy, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    policies: HashMap<String, Policy>,
}

impl PolicyRegistry {
    pub fn builder() -> PolicyRegistryBuilder {
        PolicyRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&Policy> {
        self.policies.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.policies.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.policies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[derive(Default)]
pub struct PolicyRegistryBuilder {
    policies: HashMap<String, Policy>,
}

impl PolicyRegistryBuilder {
    /// Register a declarative policy.
    pub fn declare(self, name: impl Into<String>, requirement: PolicyRequirement) -> ConfigResult<Self> {
        let name = name.into();
        requirement.check().map_err(|reason| ConfigError::InvalidPolicy {
            policy: name.clone(),
            reason,
        })?;
        self.insert(name, Predicate::Declared(requirement))
    }

    /// Register a policy backed by an arbitrary pure predicate.
    pub fn custom<F>(self, name: impl Into<String>, predicate: F) -> ConfigResult<Self>
    where
        F: Fn(&ClaimSet) -> bool + Send + Sync + 'static,
    {
        self.insert(name.into(), Predicate::Custom(Arc::new(predicate)))
    }

    fn insert(mut self, name: String, predicate: Predicate) -> ConfigResult<Self> {
        if name.trim().is_empty() {
            return Err(ConfigError::InvalidPolicy {
                policy: name,
                reason: "policy name is empty".to_string(),
            });
        }
        if self.policies.contains_key(&name) {
            return Err(ConfigError::DuplicatePolicy(name));
        }
        self.policies.insert(name.clone(), Policy { name, predicate });
        Ok(self)
    }

    pub fn build(self) -> PolicyRegistry {
        PolicyRegistry {
            policies: self.policies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-15T12:00:00Z").unwrap().with_timezone(&Utc)
    }

    fn claims() -> ClaimSet {
        ClaimSet::new("u-1", now() + chrono::Duration::hours(1)).with_role("Employee")
    }

    #[test]
    fn claim_present_requires_non_blank_value() {
        let req = PolicyRequirement::claim_present("country");

        assert!(!req.is_satisfied(&claims(), now()));
        assert!(!req.is_satisfied(&claims().with_attribute("country", ""), now()));
        assert!(req.is_satisfied(&claims().with_attribute("country", "DE"), now()));
    }

    #[test]
    fn claim_value_matches_any_listed_value() {
        let req = PolicyRequirement::ClaimValue {
            claim: "country".into(),
            values: vec!["DE".into(), "AT".into()],
        };

        assert!(req.is_satisfied(&claims().with_attribute("country", "AT"), now()));
        assert!(!req.is_satisfied(&claims().with_attribute("country", "de"), now()));
        assert!(!req.is_satisfied(&claims(), now()));
    }

    #[test]
    fn minimum_age_counts_whole_years() {
        let req = PolicyRequirement::minimum_age(18);

        assert!(req.is_satisfied(&claims().with_attribute("date_of_birth", "2006-06-15"), now()));
        assert!(!req.is_satisfied(&claims().with_attribute("date_of_birth", "2006-06-16"), now()));
        assert!(req.is_satisfied(
            &claims().with_attribute("date_of_birth", "1980-01-01T00:00:00Z"),
            now()
        ));
        assert!(!req.is_satisfied(&claims().with_attribute("date_of_birth", "yesterday"), now()));
        assert!(!req.is_satisfied(&claims().with_attribute("date_of_birth", "2030-01-01"), now()));
        assert!(!req.is_satisfied(&claims(), now()));
    }

    #[test]
    fn all_of_is_conjunction() {
        let req = PolicyRequirement::AllOf {
            requirements: vec![
                PolicyRequirement::claim_present("country"),
                PolicyRequirement::minimum_age(21),
            ],
        };
        let adult = claims().with_attribute("date_of_birth", "1990-01-01");

        assert!(!req.is_satisfied(&adult, now()));
        assert!(req.is_satisfied(&adult.with_attribute("country", "FR"), now()));
    }

    #[test]
    fn requirement_deserializes_from_tagged_json() {
        let req: PolicyRequirement =
            serde_json::from_str(r#"{"kind":"minimum_age","years":18}"#).unwrap();
        assert_eq!(req, PolicyRequirement::minimum_age(18));

        let req: PolicyRequirement =
            serde_json::from_str(r#"{"kind":"claim_present","claim":"country"}"#).unwrap();
        assert_eq!(req, PolicyRequirement::claim_present("country"));
    }

    #[test]
    fn registry_rejects_duplicates_and_invalid_requirements() {
        let err = PolicyRegistry::builder()
            .declare("HasCountry", PolicyRequirement::claim_present("country"))
            .unwrap()
            .custom("HasCountry", |_| true)
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::DuplicatePolicy(name) if name == "HasCountry"));

        let err = PolicyRegistry::builder()
            .declare("Broken", PolicyRequirement::AllOf { requirements: vec![] })
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::InvalidPolicy { policy, .. } if policy == "Broken"));
    }

    #[test]
    fn custom_policy_runs_predicate() {
        let registry = PolicyRegistry::builder()
            .custom("Staff", |c| c.subject().as_str().starts_with("staff-"))
            .unwrap()
            .build();

        let policy = registry.get("Staff").unwrap();
        assert!(policy.requirement().is_none());
        assert!(!policy.evaluate(&claims(), now()));
        assert!(policy.evaluate(&ClaimSet::new("staff-7", now()), now()));
        assert_eq!(registry.names(), vec!["Staff"]);
    }
}
