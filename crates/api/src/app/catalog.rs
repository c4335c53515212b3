//! Built-in operation catalog served by the demo router.
//!
//! Deployments normally supply the same table through `CLAIMGATE_CONFIG`;
//! this default keeps the binary usable without one.

use claimgate_auth::{AuthzConfig, OperationDescriptor, PolicyConfig, PolicyRequirement};

pub const WHOAMI: &str = "whoami";
pub const USERS_REGISTER: &str = "users.register";
pub const USERS_LIST: &str = "users.list";
pub const EMPLOYEES_LIST: &str = "employees.list";
pub const PRODUCTS_LIST: &str = "products.list";
pub const PRODUCTS_CREATE: &str = "products.create";
pub const LIBRARY_LIST: &str = "library.list";
pub const AUTHZ_EXPLAIN: &str = "authz.explain";

/// Every operation name a route is guarded by.
pub const GUARDED_OPERATIONS: &[&str] = &[
    WHOAMI,
    USERS_REGISTER,
    USERS_LIST,
    EMPLOYEES_LIST,
    PRODUCTS_LIST,
    PRODUCTS_CREATE,
    LIBRARY_LIST,
    AUTHZ_EXPLAIN,
];

pub const HAS_COUNTRY: &str = "HasCountry";
pub const ADULT: &str = "Adult";

/// Default policies and operations (no keys; those come from the environment).
pub fn default_config() -> AuthzConfig {
    AuthzConfig {
        policies: vec![
            PolicyConfig {
                name: HAS_COUNTRY.to_string(),
                requirement: PolicyRequirement::claim_present("country"),
            },
            PolicyConfig {
                name: ADULT.to_string(),
                requirement: PolicyRequirement::minimum_age(18),
            },
        ],
        operations: vec![
            OperationDescriptor::authenticated(WHOAMI),
            OperationDescriptor::anonymous(USERS_REGISTER),
            OperationDescriptor::authenticated(USERS_LIST).with_roles(["Admin", "SuperAdmin"]),
            OperationDescriptor::authenticated(EMPLOYEES_LIST)
                .with_roles(["Admin", "Manager"])
                .with_policy(HAS_COUNTRY),
            OperationDescriptor::authenticated(PRODUCTS_LIST),
            OperationDescriptor::authenticated(PRODUCTS_CREATE).with_roles(["Admin", "Manager"]),
            OperationDescriptor::authenticated(LIBRARY_LIST).with_policy(ADULT),
            OperationDescriptor::authenticated(AUTHZ_EXPLAIN).with_roles(["Admin", "SuperAdmin"]),
        ],
        ..AuthzConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_covers_every_guarded_route() {
        let engine = default_config().with_hs256_secret("catalog-test").build().unwrap();
        for op in GUARDED_OPERATIONS {
            assert!(engine.operation(op).is_some(), "{op} missing");
        }
    }
}
