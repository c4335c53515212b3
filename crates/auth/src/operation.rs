//! Static per-operation authorization requirements.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{AllowedRoles, ConfigError, ConfigResult, Role};

/// What a protected operation requires of its caller.
///
/// When `anonymous` is set, `allowed_roles` and `policy` are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub name: String,

    #[serde(default)]
    pub allowed_roles: AllowedRoles,

    #[serde(default)]
    pub policy: Option<String>,

    #[serde(default)]
    pub anonymous: bool,
}

impl OperationDescriptor {
    /// Open to any authenticated principal.
    pub fn authenticated(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            allowed_roles: AllowedRoles::any_authenticated(),
            policy: None,
            anonymous: false,
        }
    }

    /// Open to everyone; no token is read.
    pub fn anonymous(name: impl Into<String>) -> Self {
        Self {
            anonymous: true,
            ..Self::authenticated(name)
        }
    }

    pub fn with_roles<R: Into<Role>>(mut self, roles: impl IntoIterator<Item = R>) -> Self {
        self.allowed_roles = roles.into_iter().collect();
        self
    }

    pub fn with_policy(mut self, policy: impl Into<String>) -> Self {
        self.policy = Some(policy.into());
        self
    }

    /// The policy this operation actually enforces (none for anonymous operations).
    pub fn effective_policy(&self) -> Option<&str> {
        if self.anonymous {
            None
        } else {
            self.policy.as_deref()
        }
    }
}

/// Operation name → descriptor, immutable after startup.
#[derive(Debug, Clone, Default)]
pub struct OperationTable {
    operations: HashMap<String, OperationDescriptor>,
}

impl OperationTable {
    pub fn new(descriptors: impl IntoIterator<Item = OperationDescriptor>) -> ConfigResult<Self> {
        let mut operations = HashMap::new();
        for descriptor in descriptors {
            if operations.contains_key(&descriptor.name) {
                return Err(ConfigError::DuplicateOperation(descriptor.name));
            }
            operations.insert(descriptor.name.clone(), descriptor);
        }
        Ok(Self { operations })
    }

    pub fn get(&self, name: &str) -> Option<&OperationDescriptor> {
        self.operations.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.operations.values()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
