//! Process settings read from the environment at startup.

use std::path::PathBuf;

use claimgate_auth::{AuthorizationEngine, AuthzConfig, ConfigResult};

use crate::app::catalog;

const DEV_SECRET: &str = "dev-secret";
const DEFAULT_BIND: &str = "0.0.0.0:8080";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// `CLAIMGATE_CONFIG`: JSON authorization config; the built-in catalog when unset.
    pub config_path: Option<PathBuf>,
    /// `CLAIMGATE_JWT_SECRET`: installs the default HS256 verification key.
    pub jwt_secret: Option<String>,
    /// `CLAIMGATE_BIND`
    pub bind: String,
}

impl Settings {
    pub fn from_env() -> Self {
        Self {
            config_path: std::env::var_os("CLAIMGATE_CONFIG").map(PathBuf::from),
            jwt_secret: std::env::var("CLAIMGATE_JWT_SECRET").ok().filter(|s| !s.is_empty()),
            bind: std::env::var("CLAIMGATE_BIND").unwrap_or_else(|_| DEFAULT_BIND.to_string()),
        }
    }

    pub fn authz_config(&self) -> ConfigResult<AuthzConfig> {
        let config = match &self.config_path {
            Some(path) => {
                tracing::info!(path = %path.display(), "loading authorization config");
                AuthzConfig::from_path(path)?
            }
            None => catalog::default_config(),
        };

        Ok(match &self.jwt_secret {
            Some(secret) => config.with_hs256_secret(secret.clone()),
            None if config.token.keys.is_empty() => {
                tracing::warn!("CLAIMGATE_JWT_SECRET not set; using insecure dev default");
                config.with_hs256_secret(DEV_SECRET)
            }
            None => config,
        })
    }

    /// Load config and build the engine; any error here must stop startup.
    pub fn load_engine(&self) -> ConfigResult<AuthorizationEngine> {
        self.authz_config()?.build()
    }
}
