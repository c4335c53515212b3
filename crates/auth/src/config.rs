//! Declarative engine configuration.
//!
//! The whole authorization setup (keys, policies, operations) is plain data,
//! loaded once at startup and turned into an immutable [`AuthorizationEngine`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Duration;
use jsonwebtoken::Algorithm;
use serde::Deserialize;

use crate::{
    AuthorizationEngine, ConfigError, ConfigResult, JwtTokenValidator, KeyError, KeyRing,
    OperationDescriptor, OperationTable, PolicyRegistry, PolicyRegistryBuilder, PolicyRequirement,
    RoleMode, TokenSettings, VerificationKey,
};

fn default_role_claim() -> String {
    "role".to_string()
}

fn default_algorithm() -> Algorithm {
    Algorithm::HS256
}

/// One verification key as written in configuration.
#[derive(Clone, Deserialize)]
pub struct KeyConfig {
    #[serde(default)]
    pub kid: Option<String>,

    #[serde(default = "default_algorithm")]
    pub algorithm: Algorithm,

    /// Shared secret for HS* algorithms.
    #[serde(default)]
    pub secret: Option<String>,

    /// Inline PEM public key for asymmetric algorithms.
    #[serde(default)]
    pub public_key_pem: Option<String>,

    /// Path to a PEM public key, read at startup.
    #[serde(default)]
    pub public_key_path: Option<PathBuf>,
}

impl core::fmt::Debug for KeyConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("KeyConfig")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .field("public_key_path", &self.public_key_path)
            .finish_non_exhaustive()
    }
}

impl KeyConfig {
    pub fn hs256(secret: impl Into<String>) -> Self {
        Self {
            kid: None,
            algorithm: Algorithm::HS256,
            secret: Some(secret.into()),
            public_key_pem: None,
            public_key_path: None,
        }
    }

    fn is_hmac(&self) -> bool {
        matches!(self.algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
    }

    pub fn load(&self) -> ConfigResult<VerificationKey> {
        let kid = self.kid.clone();
        let kid_label = kid.clone().unwrap_or_else(|| "<default>".to_string());

        if self.is_hmac() {
            let secret = self.secret.as_deref().ok_or(KeyError::MissingMaterial {
                kid: kid_label,
                algorithm: self.algorithm,
                expected: "a shared secret",
            })?;
            return Ok(VerificationKey::hmac(kid, self.algorithm, secret.as_bytes())?);
        }

        let pem = match (&self.public_key_pem, &self.public_key_path) {
            (Some(pem), _) => pem.clone().into_bytes(),
            (None, Some(path)) => std::fs::read(path).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?,
            (None, None) => {
                return Err(KeyError::MissingMaterial {
                    kid: kid_label,
                    algorithm: self.algorithm,
                    expected: "a PEM public key",
                }
                .into());
            }
        };
        Ok(VerificationKey::public_pem(kid, self.algorithm, &pem)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    #[serde(default)]
    pub issuer: Option<String>,

    #[serde(default)]
    pub audience: Option<String>,

    #[serde(default)]
    pub leeway_secs: u32,

    #[serde(default = "default_role_claim")]
    pub role_claim: String,

    #[serde(default)]
    pub role_mode: RoleMode,

    #[serde(default)]
    pub keys: Vec<KeyConfig>,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            issuer: None,
            audience: None,
            leeway_secs: 0,
            role_claim: default_role_claim(),
            role_mode: RoleMode::First,
            keys: Vec::new(),
        }
    }
}

impl TokenConfig {
    pub fn settings(&self) -> TokenSettings {
        TokenSettings {
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
            leeway: Duration::seconds(i64::from(self.leeway_secs)),
            role_claim: self.role_claim.clone(),
            role_mode: self.role_mode,
        }
    }

    pub fn key_ring(&self) -> ConfigResult<KeyRing> {
        if self.keys.is_empty() {
            return Err(ConfigError::NoKeys);
        }
        let keys = self.keys.iter().map(KeyConfig::load).collect::<ConfigResult<Vec<_>>>()?;
        Ok(KeyRing::new(keys)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    pub name: String,
    pub requirement: PolicyRequirement,
}

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthzConfig {
    #[serde(default)]
    pub token: TokenConfig,

    #[serde(default)]
    pub policies: Vec<PolicyConfig>,

    #[serde(default)]
    pub operations: Vec<OperationDescriptor>,
}

impl AuthzConfig {
    pub fn from_json_str(raw: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Install a default (kid-less) HS256 key as the only shared-secret key.
    ///
    /// Every configured HMAC key is dropped, whatever its `kid`, so a secret
    /// committed to a config file stops verifying tokens. Asymmetric keys stay.
    pub fn with_hs256_secret(mut self, secret: impl Into<String>) -> Self {
        let dropped = self.token.keys.len();
        self.token.keys.retain(|k| !k.is_hmac());
        let dropped = dropped - self.token.keys.len();
        if dropped > 0 {
            tracing::warn!(dropped, "HS256 override replaces configured shared-secret keys");
        }
        self.token.keys.push(KeyConfig::hs256(secret));
        self
    }

    pub fn policy_registry(&self) -> ConfigResult<PolicyRegistryBuilder> {
        self.policies
            .iter()
            .try_fold(PolicyRegistry::builder(), |builder, p| {
                builder.declare(p.name.clone(), p.requirement.clone())
            })
    }

    /// Build the engine from declarative configuration only.
    pub fn build(self) -> ConfigResult<AuthorizationEngine> {
        self.build_with(Ok)
    }

    /// Build the engine, letting the caller register custom policies first.
    pub fn build_with<F>(self, extend: F) -> ConfigResult<AuthorizationEngine>
    where
        F: FnOnce(PolicyRegistryBuilder) -> ConfigResult<PolicyRegistryBuilder>,
    {
        let validator = JwtTokenValidator::new(self.token.key_ring()?, self.token.settings());
        let policies = extend(self.policy_registry()?)?.build();
        let operations = OperationTable::new(self.operations)?;

        AuthorizationEngine::new(Arc::new(validator), policies, operations)
    }
}
