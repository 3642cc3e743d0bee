use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use super::id::{RoomId, TrackRef, UserId};
use super::playback::PlaybackState;
use crate::{Error, Result};

/// A live listening session.
///
/// `members` keeps join order and always contains `host_id`. The host is
/// fixed for the lifetime of the room: when the host leaves, the room is
/// destroyed by the registry rather than handed to another member.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub host_id: UserId,
    members: IndexSet<UserId>,
    pub max_members: usize,
    pub playback: PlaybackState,
    pub waiting_list: Vec<TrackRef>,
    pub proposal_list: Vec<TrackRef>,
    pub created_at_millis: i64,
}

impl Room {
    /// Create a room hosted by `host_id`.
    ///
    /// Fails if `max_members` cannot even hold the host.
    pub fn new(host_id: UserId, max_members: usize, now_millis: i64) -> Result<Self> {
        if max_members == 0 {
            return Err(Error::InvalidInput(
                "Room capacity must allow at least the host".to_string(),
            ));
        }

        let mut members = IndexSet::with_capacity(max_members.min(16));
        members.insert(host_id.clone());

        Ok(Self {
            id: RoomId::new(),
            host_id,
            members,
            max_members,
            playback: PlaybackState::default(),
            waiting_list: Vec::new(),
            proposal_list: Vec::new(),
            created_at_millis: now_millis,
        })
    }

    #[must_use]
    pub fn is_host(&self, user_id: &UserId) -> bool {
        &self.host_id == user_id
    }

    #[must_use]
    pub fn is_member(&self, user_id: &UserId) -> bool {
        self.members.contains(user_id)
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.members.len() >= self.max_members
    }

    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn members(&self) -> impl Iterator<Item = &UserId> {
        self.members.iter()
    }

    #[must_use]
    pub fn member_list(&self) -> Vec<UserId> {
        self.members.iter().cloned().collect()
    }

    /// Add a member. Returns `Ok(false)` if the user was already a member.
    ///
    /// Callers check `is_full` first; hitting the capacity error here means
    /// the caller skipped that check.
    pub fn add_member(&mut self, user_id: UserId) -> Result<bool> {
        if self.members.contains(&user_id) {
            return Ok(false);
        }
        if self.is_full() {
            return Err(Error::Internal(format!(
                "room {} would exceed capacity {}",
                self.id, self.max_members
            )));
        }
        self.members.insert(user_id);
        Ok(true)
    }

    /// Remove a member, keeping the join order of the others
    pub fn remove_member(&mut self, user_id: &UserId) -> bool {
        self.members.shift_remove(user_id)
    }

    /// Verify the structural invariants of the room
    pub fn check_invariants(&self) -> Result<()> {
        if !self.members.contains(&self.host_id) {
            return Err(Error::Internal(format!(
                "room {} lost its host {}",
                self.id, self.host_id
            )));
        }
        if self.members.len() > self.max_members {
            return Err(Error::Internal(format!(
                "room {} has {} members, capacity {}",
                self.id,
                self.members.len(),
                self.max_members
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            room_id: self.id.clone(),
            host_id: self.host_id.clone(),
            members: self.member_list(),
            max_members: self.max_members,
            playback: self.playback.clone(),
            waiting_list: self.waiting_list.clone(),
            proposal_list: self.proposal_list.clone(),
            created_at_millis: self.created_at_millis,
        }
    }
}

/// Everything a client needs to render a room session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub host_id: UserId,
    pub members: Vec<UserId>,
    pub max_members: usize,
    pub playback: PlaybackState,
    pub waiting_list: Vec<TrackRef>,
    pub proposal_list: Vec<TrackRef>,
    pub created_at_millis: i64,
}
