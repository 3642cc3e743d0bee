//! Connection identity verification
//!
//! The coordinator never issues credentials. It only checks the access
//! tokens minted by the account service and reads the subscription tier
//! they carry.

pub mod jwt;

use async_trait::async_trait;

use crate::{models::Identity, Error, Result};

pub use jwt::{Claims, JwtService};

/// Verifies a connection's credential, once, at connect time
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<Identity>;
}

/// Extract bearer token from Authorization header value
///
/// Supports both "Bearer <token>" and "bearer <token>" formats.
pub fn extract_bearer_token(auth_value: &str) -> Result<&str> {
    auth_value
        .strip_prefix("Bearer ")
        .or_else(|| auth_value.strip_prefix("bearer "))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            Error::Authentication("Authorization header must start with 'Bearer '".to_string())
        })
}
