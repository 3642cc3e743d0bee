use jamroom_core::models::{ConnectionId, PlaybackState, Room, UserId};
use std::sync::Arc;
use tracing::debug;

use super::events::ServerEvent;
use super::membership::MembershipIndex;

/// Minimum spacing between accepted host reports that keep the same
/// play/pause state
pub const SYNC_BROADCAST_INTERVAL_MS: i64 = 1000;

/// Playback report sent by a room host
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackUpdate {
    pub is_playing: bool,
    pub position_seconds: f64,
}

/// Apply a host report to the room playback state.
///
/// A report is accepted when it flips play/pause, or when more than
/// [`SYNC_BROADCAST_INTERVAL_MS`] elapsed since the last accepted one.
/// Rejected reports leave `state` untouched. Returns whether the report
/// was accepted and must be broadcast.
pub fn apply_playback_update(
    state: &mut PlaybackState,
    update: PlaybackUpdate,
    now_millis: i64,
) -> bool {
    let state_changed = state.is_playing != update.is_playing;
    let interval_elapsed = now_millis - state.last_update_millis > SYNC_BROADCAST_INTERVAL_MS;

    if !state_changed && !interval_elapsed {
        return false;
    }

    state.is_playing = update.is_playing;
    state.position_seconds = update.position_seconds;
    state.last_update_millis = now_millis;
    true
}

/// Fans room events out to the connections of room members.
///
/// Delivery is a non-blocking enqueue on each connection's outbound
/// channel, so callers may hold the registry lock while broadcasting.
#[derive(Clone)]
pub struct SyncBroadcaster {
    membership: Arc<MembershipIndex>,
}

impl SyncBroadcaster {
    #[must_use]
    pub const fn new(membership: Arc<MembershipIndex>) -> Self {
        Self { membership }
    }

    /// Broadcast an event to every connection of every room member
    pub fn broadcast(&self, room: &Room, event: &ServerEvent) -> usize {
        self.broadcast_except(room, None, event)
    }

    /// Broadcast an event to every room member except `skip`
    pub fn broadcast_except(
        &self,
        room: &Room,
        skip: Option<&UserId>,
        event: &ServerEvent,
    ) -> usize {
        let sent_count: usize = room
            .members()
            .filter(|member| Some(*member) != skip)
            .map(|member| self.membership.send_to_user(member, event))
            .sum();

        debug!(
            room_id = %room.id,
            event_type = event.event_type(),
            sent_count,
            "Broadcast event to room"
        );

        sent_count
    }

    /// Broadcast the room's current playback to all members, host included.
    ///
    /// Members receive the authoritative `playbackUpdate` first, followed by
    /// a `playbackPulse` carrying only the play/pause flag.
    pub fn broadcast_playback(&self, room: &Room) -> usize {
        let playback = &room.playback;
        let update = ServerEvent::PlaybackUpdate {
            room_id: room.id.clone(),
            track_ref: playback.track_ref.clone(),
            is_playing: playback.is_playing,
            position_seconds: playback.position_seconds,
        };
        let pulse = ServerEvent::PlaybackPulse {
            room_id: room.id.clone(),
            is_playing: playback.is_playing,
        };

        let sent = self.broadcast(room, &update);
        self.broadcast(room, &pulse);
        sent
    }

    /// Broadcast the waiting and proposal lists to all members
    pub fn broadcast_queue(&self, room: &Room) -> usize {
        self.broadcast(
            room,
            &ServerEvent::QueueUpdated {
                room_id: room.id.clone(),
                waiting_list: room.waiting_list.clone(),
                proposal_list: room.proposal_list.clone(),
            },
        )
    }

    pub fn send_to_user(&self, user_id: &UserId, event: &ServerEvent) -> usize {
        self.membership.send_to_user(user_id, event)
    }

    pub fn send_to_connection(&self, connection_id: &ConnectionId, event: ServerEvent) -> bool {
        self.membership.send_to_connection(connection_id, event)
    }
}
