use jamroom_core::models::{ConnectionId, Identity};
use jamroom_core::service::QuotaResolver;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::events::ServerEvent;
use super::membership::{
    ConnectionLimits, DisconnectSignal, MembershipIndex, MembershipMetrics,
};
use super::registry::RoomRegistry;
use super::session::SessionController;
use crate::Result;

/// Source of wall-clock time for playback timestamps
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Shared state behind every session: who is connected and which rooms exist
pub struct Coordinator {
    membership: Arc<MembershipIndex>,
    registry: RoomRegistry,
    quota: Arc<dyn QuotaResolver>,
    clock: Arc<dyn Clock>,
}

impl Coordinator {
    #[must_use]
    pub fn new(limits: ConnectionLimits, quota: Arc<dyn QuotaResolver>) -> Self {
        Self::with_clock(limits, quota, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(
        limits: ConnectionLimits,
        quota: Arc<dyn QuotaResolver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let membership = Arc::new(MembershipIndex::new(limits));
        Self {
            registry: RoomRegistry::new(Arc::clone(&membership)),
            membership,
            quota,
            clock,
        }
    }

    /// Register an authenticated connection and build its session
    ///
    /// The returned receiver carries every event addressed to the connection
    /// and must be handed to [`SessionController::run`].
    pub fn connect(
        self: &Arc<Self>,
        identity: Identity,
    ) -> Result<(SessionController, mpsc::UnboundedReceiver<ServerEvent>)> {
        let connection_id = ConnectionId::from(format!(
            "{}_{}",
            identity.user_id.as_str(),
            nanoid::nanoid!(8)
        ));
        let (tx, rx) = mpsc::unbounded_channel();

        // Subscribe first so signals sent before the session loop starts,
        // e.g. a shutdown during the WebSocket upgrade, are not missed
        let disconnect_rx = self.membership.subscribe_disconnect();
        self.membership
            .add_connection(&identity, connection_id.clone(), tx)?;

        // Register before attaching so a concurrent eviction sees the user online
        let session =
            SessionController::new(Arc::clone(self), identity, connection_id, disconnect_rx);
        if let Some(room_id) = self
            .registry
            .attach_connection(session.user_id(), session.connection_id())
        {
            debug!(
                connection_id = %session.connection_id(),
                room_id = %room_id,
                "Connection resumed existing room membership"
            );
        }

        Ok((session, rx))
    }

    /// Periodically close idle and expired connections
    pub fn spawn_reaper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                let expired = coordinator.membership.check_timeouts();
                if expired.is_empty() {
                    continue;
                }
                info!(count = expired.len(), "Reaping timed out connections");
                for connection_id in expired {
                    coordinator
                        .membership
                        .request_disconnect(DisconnectSignal::Connection(connection_id));
                }
            }
        })
    }

    #[must_use]
    pub fn membership(&self) -> &Arc<MembershipIndex> {
        &self.membership
    }

    #[must_use]
    pub const fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    #[must_use]
    pub fn quota(&self) -> &dyn QuotaResolver {
        self.quota.as_ref()
    }

    #[must_use]
    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    #[must_use]
    pub fn metrics(&self) -> CoordinatorMetrics {
        CoordinatorMetrics {
            connections: self.membership.metrics(),
            active_rooms: self.registry.room_count(),
        }
    }
}

/// Snapshot of coordinator activity for health endpoints
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorMetrics {
    pub connections: MembershipMetrics,
    pub active_rooms: usize,
}
