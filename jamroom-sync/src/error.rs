//! Error types for the room coordinator
//!
//! Every variant is local to the event that triggered it and is reported
//! only to the originating connection.

use jamroom_core::models::RoomId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Account tier does not permit this action")]
    EntitlementDenied,

    #[error("Already in room {0}")]
    AlreadyInRoom(RoomId),

    #[error("Room not found: {0}")]
    RoomNotFound(RoomId),

    #[error("Room {0} is full")]
    RoomFull(RoomId),

    #[error("Only the room host can do this")]
    NotHost,

    #[error("Not in a room")]
    NotInRoom,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Too many connections: {0}")]
    TooManyConnections(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Stable reason code sent to clients in `*Failed` events
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::EntitlementDenied => "entitlement_denied",
            Self::AlreadyInRoom(_) => "already_in_room",
            Self::RoomNotFound(_) => "room_not_found",
            Self::RoomFull(_) => "room_full",
            Self::NotHost => "not_host",
            Self::NotInRoom => "not_in_room",
            Self::InvalidInput(_) => "invalid_input",
            Self::TooManyConnections(_) => "too_many_connections",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<jamroom_core::Error> for Error {
    fn from(err: jamroom_core::Error) -> Self {
        match err {
            jamroom_core::Error::InvalidInput(msg) => Self::InvalidInput(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Result type for coordinator operations
pub type Result<T> = std::result::Result<T, Error>;
