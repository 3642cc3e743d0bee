use jamroom_core::models::{
    ConnectionId, PlaybackState, Room, RoomId, RoomSnapshot, TrackRef, UserId,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::broadcaster::{apply_playback_update, PlaybackUpdate, SyncBroadcaster};
use super::events::ServerEvent;
use super::membership::MembershipIndex;
use crate::{Error, Result};

const HOST_LEFT_REASON: &str = "host left";

/// Result of a successful join
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub snapshot: RoomSnapshot,
    pub is_host: bool,
    /// The user was already a member and nothing changed
    pub already_member: bool,
    /// Room the user had to leave first
    pub left: Option<LeaveOutcome>,
}

/// Result of removing a user from their room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    pub room_id: RoomId,
    pub was_host: bool,
    /// Members removed because the host closed the room
    pub evicted: Vec<UserId>,
}

/// Result of a host playback report
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub playback: PlaybackState,
    pub broadcast: bool,
}

#[derive(Default)]
struct RegistryState {
    rooms: HashMap<RoomId, Room>,
    /// At most one room per user
    user_rooms: HashMap<UserId, RoomId>,
}

impl RegistryState {
    /// Room the user is a member of, repairing a stale index entry
    fn member_room_mut(&mut self, user_id: &UserId) -> Result<&mut Room> {
        let room_id = self.user_rooms.get(user_id).ok_or(Error::NotInRoom)?.clone();
        match self.rooms.get_mut(&room_id) {
            Some(room) if room.is_member(user_id) => Ok(room),
            _ => {
                self.user_rooms.remove(user_id);
                error!(
                    user_id = %user_id,
                    room_id = %room_id,
                    "User index pointed at a room the user is not in, repaired"
                );
                Err(Error::Internal(format!(
                    "stale room index for user {user_id}"
                )))
            }
        }
    }

    fn host_room_mut(&mut self, user_id: &UserId) -> Result<&mut Room> {
        let room = self.member_room_mut(user_id)?;
        if room.is_host(user_id) {
            Ok(room)
        } else {
            Err(Error::NotHost)
        }
    }
}

/// Owns every live room and the user to room index.
///
/// All operations run under one registry lock. Events produced by an
/// operation are enqueued to connections before the lock is released, so
/// each connection observes room changes in the order they were applied.
pub struct RoomRegistry {
    state: Mutex<RegistryState>,
    membership: Arc<MembershipIndex>,
    broadcaster: SyncBroadcaster,
}

impl RoomRegistry {
    #[must_use]
    pub fn new(membership: Arc<MembershipIndex>) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            broadcaster: SyncBroadcaster::new(Arc::clone(&membership)),
            membership,
        }
    }

    /// Create a room hosted by `user_id`
    ///
    /// `max_members` is the quota resolved for the user; 0 means the user
    /// may not host.
    pub fn create_room(
        &self,
        user_id: &UserId,
        max_members: u32,
        now_millis: i64,
    ) -> Result<RoomSnapshot> {
        let mut state = self.state.lock();

        if let Some(room_id) = state.user_rooms.get(user_id).cloned() {
            if state.rooms.get(&room_id).is_some_and(|r| r.is_member(user_id)) {
                return Err(Error::AlreadyInRoom(room_id));
            }
            state.user_rooms.remove(user_id);
            error!(
                user_id = %user_id,
                room_id = %room_id,
                "User index pointed at a room the user is not in, repaired"
            );
            return Err(Error::Internal(format!(
                "stale room index for user {user_id}"
            )));
        }

        if max_members < 1 {
            return Err(Error::EntitlementDenied);
        }

        let capacity = usize::try_from(max_members)
            .map_err(|_| Error::InvalidInput(format!("room size {max_members} too large")))?;
        let room = Room::new(user_id.clone(), capacity, now_millis)?;
        let room_id = room.id.clone();
        let snapshot = room.snapshot();

        state.rooms.insert(room_id.clone(), room);
        state.user_rooms.insert(user_id.clone(), room_id.clone());
        self.membership.assign_room(user_id, Some(&room_id));

        self.broadcaster.send_to_user(
            user_id,
            &ServerEvent::CreateRoomSuccess {
                room: snapshot.clone(),
            },
        );

        info!(
            room_id = %room_id,
            host_id = %user_id,
            max_members,
            total_rooms = state.rooms.len(),
            "Room created"
        );

        Ok(snapshot)
    }

    /// Add `user_id` to a room, leaving any other room first
    pub fn join_room(&self, user_id: &UserId, room_id: &RoomId) -> Result<JoinOutcome> {
        let mut state = self.state.lock();

        let Some(room) = state.rooms.get(room_id) else {
            return Err(Error::RoomNotFound(room_id.clone()));
        };

        if room.is_member(user_id) {
            let snapshot = room.snapshot();
            let is_host = room.is_host(user_id);
            self.broadcaster.send_to_user(
                user_id,
                &ServerEvent::JoinRoomSuccess {
                    room: snapshot.clone(),
                    is_host,
                },
            );
            debug!(room_id = %room_id, user_id = %user_id, "Duplicate join ignored");
            return Ok(JoinOutcome {
                snapshot,
                is_host,
                already_member: true,
                left: None,
            });
        }

        if room.is_full() {
            return Err(Error::RoomFull(room_id.clone()));
        }

        let left = self.leave_locked(&mut state, user_id);

        let Some(room) = state.rooms.get_mut(room_id) else {
            // The room was closed by the user's own departure as its host
            return Err(Error::RoomNotFound(room_id.clone()));
        };

        room.add_member(user_id.clone())?;
        if let Err(err) = room.check_invariants() {
            room.remove_member(user_id);
            error!(room_id = %room_id, error = %err, "Room invariant violated on join");
            return Err(err.into());
        }

        let snapshot = room.snapshot();
        let is_host = room.is_host(user_id);

        self.membership.assign_room(user_id, Some(room_id));
        self.broadcaster.broadcast_except(
            room,
            Some(user_id),
            &ServerEvent::MemberJoined {
                room_id: room_id.clone(),
                user_id: user_id.clone(),
                members: snapshot.members.clone(),
            },
        );
        self.broadcaster.send_to_user(
            user_id,
            &ServerEvent::JoinRoomSuccess {
                room: snapshot.clone(),
                is_host,
            },
        );

        info!(
            room_id = %room_id,
            user_id = %user_id,
            members = snapshot.members.len(),
            max_members = snapshot.max_members,
            "User joined room"
        );

        state.user_rooms.insert(user_id.clone(), room_id.clone());

        Ok(JoinOutcome {
            snapshot,
            is_host,
            already_member: false,
            left,
        })
    }

    /// Remove `user_id` from their room. `None` when they occupy no room.
    pub fn leave_room(&self, user_id: &UserId) -> Option<LeaveOutcome> {
        let mut state = self.state.lock();
        self.leave_locked(&mut state, user_id)
    }

    /// Remove `user_id` from their room unless they reconnected meanwhile
    pub fn evict_if_offline(&self, user_id: &UserId) -> Option<LeaveOutcome> {
        let mut state = self.state.lock();
        if self.membership.has_connections(user_id) {
            debug!(user_id = %user_id, "User reconnected, keeping room membership");
            return None;
        }
        self.leave_locked(&mut state, user_id)
    }

    fn leave_locked(&self, state: &mut RegistryState, user_id: &UserId) -> Option<LeaveOutcome> {
        let room_id = state.user_rooms.remove(user_id)?;

        let Some(room) = state.rooms.get_mut(&room_id) else {
            error!(
                user_id = %user_id,
                room_id = %room_id,
                "User index pointed at a missing room, repaired"
            );
            return None;
        };

        room.remove_member(user_id);
        self.membership.assign_room(user_id, None);
        self.broadcaster.send_to_user(
            user_id,
            &ServerEvent::LeftRoom {
                room_id: room_id.clone(),
            },
        );

        if !room.is_host(user_id) {
            self.broadcaster.broadcast(
                room,
                &ServerEvent::MemberLeft {
                    room_id: room_id.clone(),
                    user_id: user_id.clone(),
                    members: room.member_list(),
                },
            );
            info!(
                room_id = %room_id,
                user_id = %user_id,
                members = room.member_count(),
                "User left room"
            );
            return Some(LeaveOutcome {
                room_id,
                was_host: false,
                evicted: Vec::new(),
            });
        }

        let room = state.rooms.remove(&room_id)?;

        let evicted = room.member_list();
        let closed = ServerEvent::RoomClosed {
            room_id: room_id.clone(),
            reason: HOST_LEFT_REASON.to_string(),
        };
        for member in &evicted {
            if state.user_rooms.remove(member).as_ref() != Some(&room_id) {
                warn!(room_id = %room_id, user_id = %member, "Member index did not match closing room");
            }
            self.membership.assign_room(member, None);
            self.broadcaster.send_to_user(member, &closed);
        }

        info!(
            room_id = %room_id,
            host_id = %user_id,
            evicted = evicted.len(),
            total_rooms = state.rooms.len(),
            "Host left, room closed"
        );

        Some(LeaveOutcome {
            room_id,
            was_host: true,
            evicted,
        })
    }

    /// Mark a newly registered connection with its user's room
    ///
    /// A user already in a room who opens another device receives the room
    /// snapshot on that device. Returns the room, if any.
    pub fn attach_connection(
        &self,
        user_id: &UserId,
        connection_id: &ConnectionId,
    ) -> Option<RoomId> {
        let state = self.state.lock();
        let room_id = state.user_rooms.get(user_id)?;
        let room = state.rooms.get(room_id)?;

        self.membership.assign_room(user_id, Some(room_id));
        self.broadcaster.send_to_connection(
            connection_id,
            ServerEvent::JoinRoomSuccess {
                room: room.snapshot(),
                is_host: room.is_host(user_id),
            },
        );

        Some(room_id.clone())
    }

    /// Apply a host playback report, broadcasting it if accepted
    pub fn apply_sync(
        &self,
        user_id: &UserId,
        is_playing: bool,
        position_seconds: f64,
        now_millis: i64,
    ) -> Result<SyncOutcome> {
        let mut state = self.state.lock();
        let room = state.host_room_mut(user_id)?;

        let accepted = apply_playback_update(
            &mut room.playback,
            PlaybackUpdate {
                is_playing,
                position_seconds,
            },
            now_millis,
        );

        if accepted {
            self.broadcaster.broadcast_playback(room);
        } else {
            debug!(room_id = %room.id, "Playback update rate limited");
        }

        Ok(SyncOutcome {
            playback: room.playback.clone(),
            broadcast: accepted,
        })
    }

    /// Host appends a track to the waiting list
    pub fn queue_track(&self, user_id: &UserId, track: TrackRef) -> Result<RoomSnapshot> {
        let mut state = self.state.lock();
        let room = state.host_room_mut(user_id)?;

        room.waiting_list.push(track);
        self.broadcaster.broadcast_queue(room);
        Ok(room.snapshot())
    }

    /// Any member suggests a track for the host to accept
    pub fn propose_track(&self, user_id: &UserId, track: TrackRef) -> Result<RoomSnapshot> {
        let mut state = self.state.lock();
        let room = state.member_room_mut(user_id)?;

        room.proposal_list.push(track);
        self.broadcaster.broadcast_queue(room);
        Ok(room.snapshot())
    }

    /// Host moves the proposal at `index` to the end of the waiting list
    pub fn accept_proposal(&self, user_id: &UserId, index: usize) -> Result<RoomSnapshot> {
        let mut state = self.state.lock();
        let room = state.host_room_mut(user_id)?;

        if index >= room.proposal_list.len() {
            return Err(Error::InvalidInput(format!(
                "no proposal at index {index}"
            )));
        }
        let track = room.proposal_list.remove(index);
        room.waiting_list.push(track);

        self.broadcaster.broadcast_queue(room);
        Ok(room.snapshot())
    }

    /// Host starts the next track of the waiting list
    pub fn skip_track(&self, user_id: &UserId, now_millis: i64) -> Result<RoomSnapshot> {
        let mut state = self.state.lock();
        let room = state.host_room_mut(user_id)?;

        if room.waiting_list.is_empty() {
            return Err(Error::InvalidInput("waiting list is empty".to_string()));
        }
        let track = room.waiting_list.remove(0);
        room.playback.load_track(track, now_millis);

        self.broadcaster.broadcast_playback(room);
        self.broadcaster.broadcast_queue(room);
        Ok(room.snapshot())
    }

    #[must_use]
    pub fn room_of(&self, user_id: &UserId) -> Option<RoomId> {
        self.state.lock().user_rooms.get(user_id).cloned()
    }

    #[must_use]
    pub fn snapshot(&self, room_id: &RoomId) -> Option<RoomSnapshot> {
        self.state.lock().rooms.get(room_id).map(Room::snapshot)
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.state.lock().rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jamroom_core::models::{AccountTier, Identity};
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    struct Harness {
        membership: Arc<MembershipIndex>,
        registry: RoomRegistry,
    }

    impl Harness {
        fn new() -> Self {
            let membership = Arc::new(MembershipIndex::default());
            Self {
                registry: RoomRegistry::new(Arc::clone(&membership)),
                membership,
            }
        }

        fn connect(&self, user: &str) -> UnboundedReceiver<ServerEvent> {
            let (tx, rx) = mpsc::unbounded_channel();
            let conn_id = ConnectionId::from(format!("{user}_{}", self.membership.connection_count()));
            self.membership
                .add_connection(
                    &Identity::new(UserId::from(user), AccountTier::Premium),
                    conn_id,
                    tx,
                )
                .unwrap();
            rx
        }
    }

    fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn user(id: &str) -> UserId {
        UserId::from(id)
    }

    #[test]
    fn test_create_room() {
        let h = Harness::new();
        let mut rx = h.connect("host");

        let snapshot = h.registry.create_room(&user("host"), 5, 100).unwrap();
        assert_eq!(snapshot.host_id, user("host"));
        assert_eq!(snapshot.members, vec![user("host")]);
        assert_eq!(snapshot.max_members, 5);
        assert_eq!(h.registry.room_of(&user("host")), Some(snapshot.room_id.clone()));
        assert_eq!(h.registry.room_count(), 1);

        let events = drain(&mut rx);
        assert!(matches!(&events[..], [ServerEvent::CreateRoomSuccess { .. }]));
    }

    #[test]
    fn test_create_room_zero_quota() {
        let h = Harness::new();
        assert_eq!(
            h.registry.create_room(&user("host"), 0, 0).unwrap_err(),
            Error::EntitlementDenied
        );
        assert_eq!(h.registry.room_count(), 0);
    }

    #[test]
    fn test_create_room_already_in_room() {
        let h = Harness::new();
        let room = h.registry.create_room(&user("host"), 5, 0).unwrap();
        assert_eq!(
            h.registry.create_room(&user("host"), 5, 0).unwrap_err(),
            Error::AlreadyInRoom(room.room_id)
        );
        assert_eq!(h.registry.room_count(), 1);
    }

    #[test]
    fn test_join_room_broadcasts_to_others() {
        let h = Harness::new();
        let mut host_rx = h.connect("host");
        let mut guest_rx = h.connect("guest");
        let room = h.registry.create_room(&user("host"), 5, 0).unwrap();
        drain(&mut host_rx);

        let outcome = h.registry.join_room(&user("guest"), &room.room_id).unwrap();
        assert!(!outcome.is_host);
        assert!(!outcome.already_member);
        assert_eq!(outcome.snapshot.members, vec![user("host"), user("guest")]);

        assert!(matches!(
            &drain(&mut host_rx)[..],
            [ServerEvent::MemberJoined { user_id, .. }] if user_id == &user("guest")
        ));
        assert!(matches!(
            &drain(&mut guest_rx)[..],
            [ServerEvent::JoinRoomSuccess { is_host: false, .. }]
        ));
    }

    #[test]
    fn test_join_unknown_room() {
        let h = Harness::new();
        let missing = RoomId::from("missing");
        assert_eq!(
            h.registry.join_room(&user("guest"), &missing).unwrap_err(),
            Error::RoomNotFound(missing)
        );
    }

    #[test]
    fn test_join_full_room() {
        let h = Harness::new();
        let room = h.registry.create_room(&user("host"), 2, 0).unwrap();
        h.registry.join_room(&user("b"), &room.room_id).unwrap();

        assert_eq!(
            h.registry.join_room(&user("c"), &room.room_id).unwrap_err(),
            Error::RoomFull(room.room_id.clone())
        );
        assert_eq!(h.registry.snapshot(&room.room_id).unwrap().members.len(), 2);
        assert_eq!(h.registry.room_of(&user("c")), None);
    }

    #[test]
    fn test_duplicate_join_is_idempotent() {
        let h = Harness::new();
        let mut host_rx = h.connect("host");
        let room = h.registry.create_room(&user("host"), 5, 0).unwrap();
        h.registry.join_room(&user("guest"), &room.room_id).unwrap();
        drain(&mut host_rx);

        let outcome = h.registry.join_room(&user("guest"), &room.room_id).unwrap();
        assert!(outcome.already_member);
        assert_eq!(outcome.snapshot.members.len(), 2);
        assert!(drain(&mut host_rx).is_empty());
    }

    #[test]
    fn test_full_room_still_accepts_existing_member() {
        let h = Harness::new();
        let room = h.registry.create_room(&user("host"), 1, 0).unwrap();
        assert!(h.registry.join_room(&user("host"), &room.room_id).unwrap().is_host);
    }

    #[test]
    fn test_join_moves_user_between_rooms() {
        let h = Harness::new();
        let mut a_rx = h.connect("a_host");
        let first = h.registry.create_room(&user("a_host"), 5, 0).unwrap();
        let second = h.registry.create_room(&user("b_host"), 5, 0).unwrap();
        h.registry.join_room(&user("guest"), &first.room_id).unwrap();
        drain(&mut a_rx);

        let outcome = h.registry.join_room(&user("guest"), &second.room_id).unwrap();
        assert_eq!(outcome.left.unwrap().room_id, first.room_id);
        assert_eq!(h.registry.room_of(&user("guest")), Some(second.room_id.clone()));
        assert_eq!(h.registry.snapshot(&first.room_id).unwrap().members, vec![user("a_host")]);

        assert!(matches!(&drain(&mut a_rx)[..], [ServerEvent::MemberLeft { .. }]));
    }

    #[test]
    fn test_host_joining_elsewhere_closes_room() {
        let h = Harness::new();
        let first = h.registry.create_room(&user("a_host"), 5, 0).unwrap();
        let second = h.registry.create_room(&user("b_host"), 5, 0).unwrap();
        h.registry.join_room(&user("guest"), &first.room_id).unwrap();

        let outcome = h.registry.join_room(&user("a_host"), &second.room_id).unwrap();
        let left = outcome.left.unwrap();
        assert!(left.was_host);
        assert_eq!(left.evicted, vec![user("guest")]);
        assert!(h.registry.snapshot(&first.room_id).is_none());
        assert_eq!(h.registry.room_of(&user("guest")), None);
    }

    #[test]
    fn test_member_leave() {
        let h = Harness::new();
        let mut guest_rx = h.connect("guest");
        let room = h.registry.create_room(&user("host"), 5, 0).unwrap();
        h.registry.join_room(&user("guest"), &room.room_id).unwrap();
        drain(&mut guest_rx);

        let outcome = h.registry.leave_room(&user("guest")).unwrap();
        assert!(!outcome.was_host);
        assert_eq!(h.registry.room_of(&user("guest")), None);
        assert!(matches!(&drain(&mut guest_rx)[..], [ServerEvent::LeftRoom { .. }]));

        assert!(h.registry.leave_room(&user("guest")).is_none());
    }

    #[test]
    fn test_host_leave_closes_room() {
        let h = Harness::new();
        let mut b_rx = h.connect("b");
        let mut c_rx = h.connect("c");
        let room = h.registry.create_room(&user("host"), 5, 0).unwrap();
        h.registry.join_room(&user("b"), &room.room_id).unwrap();
        h.registry.join_room(&user("c"), &room.room_id).unwrap();
        drain(&mut b_rx);
        drain(&mut c_rx);

        let outcome = h.registry.leave_room(&user("host")).unwrap();
        assert!(outcome.was_host);
        assert_eq!(outcome.evicted, vec![user("b"), user("c")]);
        assert_eq!(h.registry.room_count(), 0);

        for rx in [&mut b_rx, &mut c_rx] {
            let events = drain(rx);
            assert_eq!(events.len(), 1);
            assert!(matches!(
                &events[0],
                ServerEvent::RoomClosed { reason, .. } if reason == HOST_LEFT_REASON
            ));
        }
        assert_eq!(h.registry.room_of(&user("b")), None);
    }

    #[test]
    fn test_evict_if_offline_respects_reconnect() {
        let h = Harness::new();
        let _rx = h.connect("guest");
        let room = h.registry.create_room(&user("host"), 5, 0).unwrap();
        h.registry.join_room(&user("guest"), &room.room_id).unwrap();

        assert!(h.registry.evict_if_offline(&user("guest")).is_none());
        assert_eq!(h.registry.room_of(&user("guest")), Some(room.room_id));

        assert!(h.registry.evict_if_offline(&user("host")).is_some());
    }

    #[test]
    fn test_attach_connection_sends_snapshot() {
        let h = Harness::new();
        let _first = h.connect("guest");
        let room = h.registry.create_room(&user("host"), 5, 0).unwrap();
        h.registry.join_room(&user("guest"), &room.room_id).unwrap();

        let mut second = h.connect("guest");
        let conn_id = h
            .membership
            .get_user_connections(&user("guest"))
            .into_iter()
            .find(|c| c.room_id.is_none())
            .unwrap()
            .connection_id;

        assert_eq!(
            h.registry.attach_connection(&user("guest"), &conn_id),
            Some(room.room_id.clone())
        );
        assert_eq!(
            h.membership.get_connection(&conn_id).unwrap().room_id,
            Some(room.room_id)
        );
        assert!(matches!(
            &drain(&mut second)[..],
            [ServerEvent::JoinRoomSuccess { .. }]
        ));
    }

    #[test]
    fn test_apply_sync_host_only() {
        let h = Harness::new();
        let room = h.registry.create_room(&user("host"), 5, 0).unwrap();
        h.registry.join_room(&user("guest"), &room.room_id).unwrap();

        assert_eq!(
            h.registry.apply_sync(&user("guest"), true, 1.0, 10).unwrap_err(),
            Error::NotHost
        );
        assert_eq!(
            h.registry.apply_sync(&user("stranger"), true, 1.0, 10).unwrap_err(),
            Error::NotInRoom
        );

        let outcome = h.registry.apply_sync(&user("host"), true, 1.0, 10).unwrap();
        assert!(outcome.broadcast);
        assert!(outcome.playback.is_playing);
        assert_eq!(
            h.registry.snapshot(&room.room_id).unwrap().playback.position_seconds,
            1.0
        );
    }

    #[test]
    fn test_queue_operations() {
        let h = Harness::new();
        let mut guest_rx = h.connect("guest");
        let room = h.registry.create_room(&user("host"), 5, 0).unwrap();
        h.registry.join_room(&user("guest"), &room.room_id).unwrap();
        drain(&mut guest_rx);

        assert_eq!(
            h.registry.queue_track(&user("guest"), TrackRef::from("t0")).unwrap_err(),
            Error::NotHost
        );

        h.registry.queue_track(&user("host"), TrackRef::from("t1")).unwrap();
        h.registry.propose_track(&user("guest"), TrackRef::from("t2")).unwrap();
        assert!(matches!(
            h.registry.accept_proposal(&user("host"), 3),
            Err(Error::InvalidInput(_))
        ));
        let snapshot = h.registry.accept_proposal(&user("host"), 0).unwrap();
        assert_eq!(snapshot.waiting_list, vec![TrackRef::from("t1"), TrackRef::from("t2")]);
        assert!(snapshot.proposal_list.is_empty());

        let snapshot = h.registry.skip_track(&user("host"), 5_000).unwrap();
        assert_eq!(snapshot.playback.track_ref, Some(TrackRef::from("t1")));
        assert_eq!(snapshot.playback.last_update_millis, 5_000);
        assert_eq!(snapshot.waiting_list, vec![TrackRef::from("t2")]);

        let events = drain(&mut guest_rx);
        let queue_updates = events
            .iter()
            .filter(|e| matches!(e, ServerEvent::QueueUpdated { .. }))
            .count();
        assert_eq!(queue_updates, 4);
        assert!(events
            .iter()
            .any(|e| matches!(e, ServerEvent::PlaybackUpdate { track_ref: Some(t), .. } if t.as_str() == "t1")));
    }

    #[test]
    fn test_skip_empty_waiting_list() {
        let h = Harness::new();
        h.registry.create_room(&user("host"), 5, 0).unwrap();
        assert!(matches!(
            h.registry.skip_track(&user("host"), 0),
            Err(Error::InvalidInput(_))
        ));
    }
}
