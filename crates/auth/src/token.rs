//! Bearer token validation.
//!
//! Tokens are compact JWS/JWT credentials. Validation is a pure function of the
//! token bytes, the caller-supplied `now`, and the installed [`KeyRing`].

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Header, Validation};
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::claims::validate_time_window;
use crate::{ClaimSet, Role, RoleMode};

/// Claim names consumed by the validator itself; never copied into attributes.
const REGISTERED_CLAIMS: &[&str] = &["sub", "exp", "iat", "nbf", "iss", "aud", "jti"];

/// Why a bearer token was rejected.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    #[error("token is malformed")]
    Malformed,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token references an unknown signing key")]
    UnknownKey,

    #[error("token algorithm does not match any configured key")]
    AlgorithmMismatch,

    #[error("token has expired")]
    Expired,

    #[error("token not yet valid")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,

    #[error("token issuer is not accepted")]
    InvalidIssuer,

    #[error("token audience is not accepted")]
    InvalidAudience,
}

impl TokenRejection {
    pub fn is_expired(&self) -> bool {
        matches!(self, TokenRejection::Expired)
    }
}

/// Unusable key material. Raised while building a [`KeyRing`], never per request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("key '{kid}': HMAC secret is empty")]
    EmptySecret { kid: String },

    #[error("key '{kid}': invalid PEM key material: {reason}")]
    InvalidPem { kid: String, reason: String },

    #[error("key '{kid}': algorithm {algorithm:?} needs {expected}")]
    MissingMaterial {
        kid: String,
        algorithm: Algorithm,
        expected: &'static str,
    },

    #[error("duplicate key id '{0}'")]
    DuplicateKid(String),

    #[error("key ring is empty")]
    Empty,
}

/// One verification key, optionally addressed by a `kid`.
#[derive(Clone)]
pub struct VerificationKey {
    kid: Option<String>,
    algorithm: Algorithm,
    key: DecodingKey,
}

impl core::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VerificationKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl VerificationKey {
    /// Shared-secret key for the HS* family.
    pub fn hmac(kid: Option<String>, algorithm: Algorithm, secret: &[u8]) -> Result<Self, KeyError> {
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(KeyError::MissingMaterial {
                kid: display_kid(&kid),
                algorithm,
                expected: "a PEM public key",
            });
        }
        if secret.is_empty() {
            return Err(KeyError::EmptySecret { kid: display_kid(&kid) });
        }
        Ok(Self {
            kid,
            algorithm,
            key: DecodingKey::from_secret(secret),
        })
    }

    /// Public key (RSA, EC or Ed25519) in PEM form for the asymmetric families.
    pub fn public_pem(kid: Option<String>, algorithm: Algorithm, pem: &[u8]) -> Result<Self, KeyError> {
        let parsed = match algorithm {
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => DecodingKey::from_rsa_pem(pem),
            Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem),
            Algorithm::EdDSA => DecodingKey::from_ed_pem(pem),
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                return Err(KeyError::MissingMaterial {
                    kid: display_kid(&kid),
                    algorithm,
                    expected: "a shared secret",
                });
            }
        };

        let key = parsed.map_err(|e| KeyError::InvalidPem {
            kid: display_kid(&kid),
            reason: e.to_string(),
        })?;

        Ok(Self { kid, algorithm, key })
    }

    pub fn kid(&self) -> Option<&str> {
        self.kid.as_deref()
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

fn display_kid(kid: &Option<String>) -> String {
    kid.clone().unwrap_or_else(|| "<default>".to_string())
}

/// Immutable set of keys accepted for verification.
///
/// Replaced wholesale on rotation; never mutated in place.
#[derive(Debug, Clone)]
pub struct KeyRing {
    keys: Vec<VerificationKey>,
}

impl KeyRing {
    pub fn new(keys: Vec<VerificationKey>) -> Result<Self, KeyError> {
        if keys.is_empty() {
            return Err(KeyError::Empty);
        }

        let mut seen = std::collections::HashSet::new();
        for kid in keys.iter().filter_map(|k| k.kid()) {
            if !seen.insert(kid) {
                return Err(KeyError::DuplicateKid(kid.to_string()));
            }
        }

        Ok(Self { keys })
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys that may have signed a token with this header, in preference order.
    ///
    /// A `kid` must name a configured key exactly. Without a `kid`, every key
    /// of the header's algorithm is a candidate.
    fn candidates(&self, header: &Header) -> Result<Vec<&VerificationKey>, TokenRejection> {
        if let Some(kid) = header.kid.as_deref() {
            let key = self
                .keys
                .iter()
                .find(|k| k.kid() == Some(kid))
                .ok_or(TokenRejection::UnknownKey)?;
            if key.algorithm != header.alg {
                return Err(TokenRejection::AlgorithmMismatch);
            }
            return Ok(vec![key]);
        }

        let keys: Vec<_> = self.keys.iter().filter(|k| k.algorithm == header.alg).collect();
        if keys.is_empty() {
            return Err(TokenRejection::AlgorithmMismatch);
        }
        Ok(keys)
    }
}

/// Non-key validation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSettings {
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub leeway: Duration,
    pub role_claim: String,
    pub role_mode: RoleMode,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            issuer: None,
            audience: None,
            leeway: Duration::zero(),
            role_claim: "role".to_string(),
            role_mode: RoleMode::First,
        }
    }
}

/// Token validation boundary used by the decision point.
pub trait TokenValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<ClaimSet, TokenRejection>;
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    sub: String,
    exp: i64,
    #[serde(default)]
    iat: Option<i64>,
    #[serde(default)]
    nbf: Option<i64>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// JWT validator backed by `jsonwebtoken`, with an atomically swappable key ring.
pub struct JwtTokenValidator {
    keys: RwLock<Arc<KeyRing>>,
    settings: TokenSettings,
}

impl JwtTokenValidator {
    pub fn new(keys: KeyRing, settings: TokenSettings) -> Self {
        Self {
            keys: RwLock::new(Arc::new(keys)),
            settings,
        }
    }

    /// Convenience constructor for a single HS256 shared secret.
    pub fn hs256(secret: impl AsRef<[u8]>) -> Result<Self, KeyError> {
        let key = VerificationKey::hmac(None, Algorithm::HS256, secret.as_ref())?;
        Ok(Self::new(KeyRing::new(vec![key])?, TokenSettings::default()))
    }

    /// Install a new key ring. Validations already in flight finish with the
    /// ring they loaded.
    pub fn rotate(&self, keys: KeyRing) {
        let next = Arc::new(keys);
        tracing::info!(keys = next.len(), "installing rotated key ring");
        *self.keys.write() = next;
    }

    pub fn key_ring(&self) -> Arc<KeyRing> {
        self.keys.read().clone()
    }

    pub fn settings(&self) -> &TokenSettings {
        &self.settings
    }

    fn validation_for(&self, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        // Time checks run against the caller's clock in `validate_time_window`.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;

        // A configured issuer or audience must be present, not merely unequal when sent.
        let mut required = vec!["sub", "exp"];
        if let Some(issuer) = &self.settings.issuer {
            validation.set_issuer(&[issuer]);
            required.push("iss");
        }
        match &self.settings.audience {
            Some(audience) => {
                validation.set_audience(&[audience]);
                required.push("aud");
            }
            None => validation.validate_aud = false,
        }
        validation.set_required_spec_claims(required.as_slice());
        validation
    }

    fn decode(&self, token: &str) -> Result<RawClaims, TokenRejection> {
        let header = jsonwebtoken::decode_header(token).map_err(|_| TokenRejection::Malformed)?;
        let ring = self.key_ring();

        let mut last = TokenRejection::InvalidSignature;
        for key in ring.candidates(&header)? {
            let validation = self.validation_for(key.algorithm);
            match jsonwebtoken::decode::<RawClaims>(token, &key.key, &validation) {
                Ok(data) => return Ok(data.claims),
                Err(e) => {
                    last = map_jwt_error(e.kind());
                    if last != TokenRejection::InvalidSignature {
                        return Err(last);
                    }
                }
            }
        }
        Err(last)
    }

    fn claim_set_from(&self, raw: RawClaims, now: DateTime<Utc>) -> Result<ClaimSet, TokenRejection> {
        if raw.sub.trim().is_empty() {
            return Err(TokenRejection::Malformed);
        }
        let expires_at = timestamp(raw.exp)?;
        let issued_at = raw.iat.map(timestamp).transpose()?;
        let not_before = raw.nbf.map(timestamp).transpose()?;

        validate_time_window(issued_at, not_before, expires_at, now, self.settings.leeway)?;

        let mut claims = ClaimSet::new(raw.sub, expires_at);
        if let Some(iat) = issued_at {
            claims = claims.with_issued_at(iat);
        }

        let role_claim = self.settings.role_claim.as_str();
        if let Some(value) = raw.extra.get(role_claim) {
            for role in role_values(value, self.settings.role_mode) {
                claims = claims.with_role(Role::from(role));
            }
        }

        for (name, value) in raw.extra {
            if name == role_claim || REGISTERED_CLAIMS.contains(&name.as_str()) {
                continue;
            }
            if let Some(value) = attribute_value(value) {
                claims = claims.with_attribute(name, value);
            }
        }

        Ok(claims)
    }
}

impl TokenValidator for JwtTokenValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<ClaimSet, TokenRejection> {
        let raw = self.decode(token)?;
        self.claim_set_from(raw, now)
    }
}

fn map_jwt_error(kind: &ErrorKind) -> TokenRejection {
    match kind {
        ErrorKind::InvalidSignature => TokenRejection::InvalidSignature,
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName | ErrorKind::InvalidKeyFormat => {
            TokenRejection::AlgorithmMismatch
        }
        ErrorKind::InvalidIssuer => TokenRejection::InvalidIssuer,
        ErrorKind::InvalidAudience => TokenRejection::InvalidAudience,
        ErrorKind::ExpiredSignature => TokenRejection::Expired,
        ErrorKind::ImmatureSignature => TokenRejection::NotYetValid,
        ErrorKind::MissingRequiredClaim(claim) if claim == "iss" => TokenRejection::InvalidIssuer,
        ErrorKind::MissingRequiredClaim(claim) if claim == "aud" => TokenRejection::InvalidAudience,
        _ => TokenRejection::Malformed,
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, TokenRejection> {
    DateTime::from_timestamp(secs, 0).ok_or(TokenRejection::Malformed)
}

/// Role claim values: a single string or an array of strings.
fn role_values(value: &Value, mode: RoleMode) -> Vec<String> {
    let all: Vec<String> = match value {
        Value::String(s) => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };

    let non_empty = all.into_iter().filter(|r| !r.is_empty());
    match mode {
        RoleMode::First => non_empty.take(1).collect(),
        RoleMode::All => non_empty.collect(),
    }
}

fn attribute_value(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}
