use jamroom_core::models::{RoomId, RoomSnapshot, TrackRef, UserId};
use serde::{Deserialize, Serialize};

/// Events sent by a client over its connection.
///
/// Decoded once at the transport edge. The sender's user id is implied by
/// the authenticated connection and never read from the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    CreateRoom,
    JoinRoom {
        room_id: RoomId,
    },
    LeaveRoom,
    /// Host playback report (play/pause state and current position)
    Sync {
        is_playing: bool,
        position_seconds: f64,
    },
    /// Host appends a track to the waiting list
    QueueTrack {
        track: TrackRef,
    },
    /// Any member suggests a track
    ProposeTrack {
        track: TrackRef,
    },
    /// Host moves a proposal onto the waiting list
    AcceptProposal {
        index: usize,
    },
    /// Host starts the next track of the waiting list
    SkipTrack,
}

impl ClientEvent {
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::CreateRoom => "createRoom",
            Self::JoinRoom { .. } => "joinRoom",
            Self::LeaveRoom => "leaveRoom",
            Self::Sync { .. } => "sync",
            Self::QueueTrack { .. } => "queueTrack",
            Self::ProposeTrack { .. } => "proposeTrack",
            Self::AcceptProposal { .. } => "acceptProposal",
            Self::SkipTrack => "skipTrack",
        }
    }
}

/// Events delivered to connections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    CreateRoomSuccess {
        room: RoomSnapshot,
    },
    CreateRoomFailed {
        reason: String,
    },
    JoinRoomSuccess {
        room: RoomSnapshot,
        is_host: bool,
    },
    JoinRoomFailed {
        reason: String,
    },
    MemberJoined {
        room_id: RoomId,
        user_id: UserId,
        members: Vec<UserId>,
    },
    MemberLeft {
        room_id: RoomId,
        user_id: UserId,
        members: Vec<UserId>,
    },
    /// The room was destroyed while the recipient was a member
    RoomClosed {
        room_id: RoomId,
        reason: String,
    },
    /// The recipient's own user left the room (possibly from another device)
    LeftRoom {
        room_id: RoomId,
    },
    PlaybackUpdate {
        room_id: RoomId,
        track_ref: Option<TrackRef>,
        is_playing: bool,
        position_seconds: f64,
    },
    /// Presentation-only play/pause signal
    PlaybackPulse {
        room_id: RoomId,
        is_playing: bool,
    },
    QueueUpdated {
        room_id: RoomId,
        waiting_list: Vec<TrackRef>,
        proposal_list: Vec<TrackRef>,
    },
    ActionFailed {
        action: String,
        reason: String,
    },
    ProtocolError {
        message: String,
    },
}

impl ServerEvent {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Get the room ID for events that belong to a specific room
    #[must_use]
    pub fn room_id(&self) -> Option<&RoomId> {
        match self {
            Self::CreateRoomSuccess { room } | Self::JoinRoomSuccess { room, .. } => {
                Some(&room.room_id)
            }
            Self::MemberJoined { room_id, .. }
            | Self::MemberLeft { room_id, .. }
            | Self::RoomClosed { room_id, .. }
            | Self::LeftRoom { room_id }
            | Self::PlaybackUpdate { room_id, .. }
            | Self::PlaybackPulse { room_id, .. }
            | Self::QueueUpdated { room_id, .. } => Some(room_id),
            Self::CreateRoomFailed { .. }
            | Self::JoinRoomFailed { .. }
            | Self::ActionFailed { .. }
            | Self::ProtocolError { .. } => None,
        }
    }

    /// Get a short description of the event type
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::CreateRoomSuccess { .. } => "createRoomSuccess",
            Self::CreateRoomFailed { .. } => "createRoomFailed",
            Self::JoinRoomSuccess { .. } => "joinRoomSuccess",
            Self::JoinRoomFailed { .. } => "joinRoomFailed",
            Self::MemberJoined { .. } => "memberJoined",
            Self::MemberLeft { .. } => "memberLeft",
            Self::RoomClosed { .. } => "roomClosed",
            Self::LeftRoom { .. } => "leftRoom",
            Self::PlaybackUpdate { .. } => "playbackUpdate",
            Self::PlaybackPulse { .. } => "playbackPulse",
            Self::QueueUpdated { .. } => "queueUpdated",
            Self::ActionFailed { .. } => "actionFailed",
            Self::ProtocolError { .. } => "protocolError",
        }
    }
}
