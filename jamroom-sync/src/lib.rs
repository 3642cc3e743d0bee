pub mod error;
pub mod sync;

pub use error::{Error, Result};
pub use sync::{
    ClientEvent, Coordinator, Incoming, MembershipIndex, RoomRegistry, ServerEvent,
    SessionController, SessionState, StreamError, StreamMessage, SyncBroadcaster,
};
