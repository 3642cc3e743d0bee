// Module: sync

pub mod broadcaster;
pub mod coordinator;
pub mod events;
pub mod membership;
pub mod registry;
pub mod session;

pub use broadcaster::{
    apply_playback_update, PlaybackUpdate, SyncBroadcaster, SYNC_BROADCAST_INTERVAL_MS,
};
pub use coordinator::{Clock, Coordinator, CoordinatorMetrics, SystemClock};
pub use events::{ClientEvent, ServerEvent};
pub use membership::{
    ConnectionInfo, ConnectionLimits, DisconnectSignal, MembershipIndex, MembershipMetrics,
    MessageSender,
};
pub use registry::{JoinOutcome, LeaveOutcome, RoomRegistry, SyncOutcome};
pub use session::{Incoming, SessionController, SessionState, StreamError, StreamMessage};
