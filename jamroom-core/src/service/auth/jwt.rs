use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::IdentityVerifier;
use crate::models::{AccountTier, Identity, UserId};
use crate::{Error, Result};

/// Access token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// Subscription tier (free, premium, family)
    pub tier: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    #[must_use]
    pub fn user_id(&self) -> UserId {
        UserId::from_string(self.sub.clone())
    }

    pub fn tier(&self) -> Result<AccountTier> {
        self.tier
            .parse()
            .map_err(|_| Error::Authentication(format!("Invalid tier in token: {}", self.tier)))
    }
}

/// HS256 token service shared with the account service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: Arc<EncodingKey>,
    decoding_key: Arc<DecodingKey>,
    leeway_seconds: u64,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("algorithm", &Algorithm::HS256)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}

impl JwtService {
    pub fn new(secret: &[u8], leeway_seconds: u64) -> Result<Self> {
        if secret.is_empty() {
            return Err(Error::Configuration("JWT secret must not be empty".to_string()));
        }

        Ok(Self {
            encoding_key: Arc::new(EncodingKey::from_secret(secret)),
            decoding_key: Arc::new(DecodingKey::from_secret(secret)),
            leeway_seconds,
        })
    }

    /// Sign a token for `identity` that expires after `ttl`
    pub fn sign_token(&self, identity: &Identity, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: identity.user_id.as_str().to_string(),
            tier: identity.account_tier.as_str().to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| Error::Internal(format!("Failed to sign token: {e}")))
    }

    /// Verify a token and extract claims
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.leeway = self.leeway_seconds;

        Ok(decode::<Claims>(token, &self.decoding_key, &validation)?.claims)
    }
}

#[async_trait]
impl IdentityVerifier for JwtService {
    async fn verify(&self, credential: &str) -> Result<Identity> {
        let claims = self.verify_token(credential)?;
        if claims.sub.is_empty() {
            return Err(Error::Authentication("Token has no subject".to_string()));
        }
        let tier = claims.tier()?;
        Ok(Identity::new(claims.user_id(), tier))
    }
}
