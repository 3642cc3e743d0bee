use serde::{Deserialize, Serialize};

use super::id::TrackRef;

/// Playback state of a listening room, owned by the room's host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub track_ref: Option<TrackRef>,
    pub is_playing: bool,
    pub position_seconds: f64,
    /// Wall-clock millis of the last accepted update (0 = never updated)
    pub last_update_millis: i64,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            track_ref: None,
            is_playing: false,
            position_seconds: 0.0,
            last_update_millis: 0,
        }
    }
}

impl PlaybackState {
    /// Switch to a new track, keeping the play/pause state
    pub fn load_track(&mut self, track: TrackRef, now_millis: i64) {
        self.track_ref = Some(track);
        self.position_seconds = 0.0;
        self.last_update_millis = now_millis;
    }
}
