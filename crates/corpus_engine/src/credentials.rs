use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;

use crate::CredentialError;

pub const TOKEN_ENV: &str = "PRISMA_TOKEN";
pub const SECRET_ENV: &str = "PRISMA_SECRET";

/// Source of the bearer token attached to every metadata query.
pub trait CredentialProvider: Send + Sync {
    fn bearer_token(&self) -> Result<String, CredentialError>;
}

/// A token handed over as-is.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

impl CredentialProvider for StaticToken {
    fn bearer_token(&self) -> Result<String, CredentialError> {
        if self.0.trim().is_empty() {
            return Err(CredentialError::Missing(TOKEN_ENV.to_string()));
        }
        Ok(self.0.clone())
    }
}

/// Shared secret exchanged for an HS256-signed token with no claims and no
/// expiry, the form the metadata store accepts for service access.
#[derive(Debug, Clone)]
pub struct SharedSecret(pub String);

impl CredentialProvider for SharedSecret {
    fn bearer_token(&self) -> Result<String, CredentialError> {
        if self.0.is_empty() {
            return Err(CredentialError::Missing(SECRET_ENV.to_string()));
        }
        encode(
            &Header::default(),
            &json!({}),
            &EncodingKey::from_secret(self.0.as_bytes()),
        )
        .map_err(|err| CredentialError::Signing(err.to_string()))
    }
}

/// Picks a provider from the environment: a direct token wins over a secret.
pub fn provider_from_env() -> Result<Box<dyn CredentialProvider>, CredentialError> {
    provider_from_lookup(|name| std::env::var(name).ok())
}

pub(crate) fn provider_from_lookup<F>(lookup: F) -> Result<Box<dyn CredentialProvider>, CredentialError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(token) = lookup(TOKEN_ENV).filter(|t| !t.trim().is_empty()) {
        return Ok(Box::new(StaticToken(token)));
    }
    match lookup(SECRET_ENV).filter(|s| !s.is_empty()) {
        Some(secret) => Ok(Box::new(SharedSecret(secret))),
        None => Err(CredentialError::Missing(SECRET_ENV.to_string())),
    }
}
