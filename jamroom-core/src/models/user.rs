use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::id::UserId;

/// Subscription tier of an account, resolved when a connection authenticates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountTier {
    /// Free listener
    /// - Can join rooms
    /// - Cannot host
    #[default]
    Free,

    /// Premium subscriber, can host rooms
    Premium,

    /// Family plan, can host larger rooms
    Family,
}

impl AccountTier {
    /// Whether this tier is allowed to create rooms at all
    #[must_use]
    pub const fn can_host(&self) -> bool {
        matches!(self, Self::Premium | Self::Family)
    }

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Premium => "premium",
            Self::Family => "family",
        }
    }
}

impl FromStr for AccountTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(Self::Free),
            "premium" => Ok(Self::Premium),
            "family" => Ok(Self::Family),
            _ => Err(format!("Unknown account tier: {s}")),
        }
    }
}

impl std::fmt::Display for AccountTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verified identity of a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: UserId,
    pub account_tier: AccountTier,
}

impl Identity {
    #[must_use]
    pub const fn new(user_id: UserId, account_tier: AccountTier) -> Self {
        Self {
            user_id,
            account_tier,
        }
    }
}
