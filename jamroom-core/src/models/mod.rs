pub mod id;
pub mod playback;
pub mod room;
pub mod user;

pub use id::{generate_id, ConnectionId, RoomId, TrackRef, UserId};
pub use playback::PlaybackState;
pub use room::{Room, RoomSnapshot};
pub use user::{AccountTier, Identity};
