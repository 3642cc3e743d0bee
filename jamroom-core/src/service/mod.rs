pub mod auth;
pub mod quota;

pub use auth::{extract_bearer_token, Claims, IdentityVerifier, JwtService};
pub use quota::{QuotaResolver, TierQuotaResolver};
