use crate::config::AuthConfig;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use std::sync::Arc;

/// Claims read from an identity-provider token. `sub` is the owner id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// Verifies bearer tokens with either a shared HS256 secret or an RS256
/// public key.
#[derive(Clone)]
pub struct JwtVerifier {
    decoding_key: Arc<DecodingKey>,
    validation: Validation,
}

impl JwtVerifier {
    pub fn from_secret(secret: &str, issuer: Option<&str>) -> Self {
        Self::new(DecodingKey::from_secret(secret.as_bytes()), Algorithm::HS256, issuer)
    }

    pub fn from_rsa_pem(pem: &[u8], issuer: Option<&str>) -> Result<Self, AppError> {
        let key = DecodingKey::from_rsa_pem(pem)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("Invalid RSA public key: {}", e)))?;
        Ok(Self::new(key, Algorithm::RS256, issuer))
    }

    /// Public key takes precedence over a shared secret when both are set.
    pub async fn from_config(config: &AuthConfig) -> Result<Self, AppError> {
        let issuer = config.issuer.as_deref();
        match (&config.jwt_public_key_path, &config.jwt_secret) {
            (Some(path), _) => {
                let pem = tokio::fs::read(path).await.map_err(|e| {
                    AppError::ConfigError(anyhow::anyhow!(
                        "Failed to read JWT public key {}: {}",
                        path,
                        e
                    ))
                })?;
                Self::from_rsa_pem(&pem, issuer)
            }
            (None, Some(secret)) => Ok(Self::from_secret(secret, issuer)),
            (None, None) => Err(AppError::ConfigError(anyhow::anyhow!(
                "No JWT verification key configured"
            ))),
        }
    }

    fn new(key: DecodingKey, algorithm: Algorithm, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(algorithm);
        validation.validate_aud = false;
        if let Some(iss) = issuer {
            validation.set_issuer(&[iss]);
        }
        Self {
            decoding_key: Arc::new(key),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
        if data.claims.sub.trim().is_empty() {
            return Err(AppError::Unauthorized(anyhow::anyhow!(
                "Token has no subject"
            )));
        }
        Ok(data.claims)
    }
}
