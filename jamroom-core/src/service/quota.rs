//! Room quota lookup

use async_trait::async_trait;

use crate::config::RoomsConfig;
use crate::models::Identity;
use crate::Result;

/// Resolves the largest room a user may host.
///
/// 0 means the user may not host at all. Lookups may hit a remote
/// subscription service, so callers must not hold room locks across them.
#[async_trait]
pub trait QuotaResolver: Send + Sync {
    async fn max_room_size(&self, identity: &Identity) -> Result<u32>;
}

/// Quota table keyed by the tier carried in the access token
#[derive(Debug, Clone, Default)]
pub struct TierQuotaResolver {
    rooms: RoomsConfig,
}

impl TierQuotaResolver {
    #[must_use]
    pub const fn new(rooms: RoomsConfig) -> Self {
        Self { rooms }
    }
}

#[async_trait]
impl QuotaResolver for TierQuotaResolver {
    async fn max_room_size(&self, identity: &Identity) -> Result<u32> {
        Ok(self.rooms.quota_for(identity.account_tier))
    }
}
