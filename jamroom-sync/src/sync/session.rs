//! Per-connection session lifecycle
//!
//! A [`SessionController`] exists only for an authenticated connection. It
//! turns inbound [`ClientEvent`]s into registry operations, forwards
//! outbound events to the transport, and releases the connection's
//! resources exactly once when the transport goes away.

use async_trait::async_trait;
use jamroom_core::models::{ConnectionId, Identity, RoomId, RoomSnapshot, UserId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::coordinator::Coordinator;
use super::events::{ClientEvent, ServerEvent};
use super::membership::DisconnectSignal;
use super::registry::LeaveOutcome;
use crate::{Error, Result};

/// Failure while reading from the transport
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamError {
    /// The frame arrived but is not a valid client event; the session continues
    #[error("malformed message: {0}")]
    Decode(String),

    /// The transport is broken; the session ends
    #[error("transport error: {0}")]
    Transport(String),
}

/// One item read from a transport
#[derive(Debug, Clone, PartialEq)]
pub enum Incoming {
    Event(ClientEvent),
    /// Transport-level liveness, such as a WebSocket pong
    Keepalive,
}

impl From<ClientEvent> for Incoming {
    fn from(event: ClientEvent) -> Self {
        Self::Event(event)
    }
}

/// Bidirectional event stream implemented by each transport
#[async_trait]
pub trait StreamMessage: Send {
    /// Receive the next client event or keepalive
    ///
    /// Returns None when the connection is closed
    async fn recv(&mut self) -> Option<std::result::Result<Incoming, StreamError>>;

    /// Send a server event to the client
    async fn send(&mut self, event: &ServerEvent) -> std::result::Result<(), StreamError>;

    /// Ping the peer; a live peer answers with [`Incoming::Keepalive`]
    async fn ping(&mut self) -> std::result::Result<(), StreamError> {
        Ok(())
    }
}

/// Where a connection stands in the session state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Authenticated,
    InRoom(RoomId),
}

pub struct SessionController {
    coordinator: Arc<Coordinator>,
    identity: Identity,
    connection_id: ConnectionId,
    /// Subscribed before the connection was registered, taken by `run`
    disconnect_rx: Mutex<Option<broadcast::Receiver<DisconnectSignal>>>,
    closed: AtomicBool,
}

impl SessionController {
    pub(crate) fn new(
        coordinator: Arc<Coordinator>,
        identity: Identity,
        connection_id: ConnectionId,
        disconnect_rx: broadcast::Receiver<DisconnectSignal>,
    ) -> Self {
        Self {
            coordinator,
            identity,
            connection_id,
            disconnect_rx: Mutex::new(Some(disconnect_rx)),
            closed: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.identity.user_id
    }

    #[must_use]
    pub const fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        match self.coordinator.registry().room_of(self.user_id()) {
            Some(room_id) => SessionState::InRoom(room_id),
            None => SessionState::Authenticated,
        }
    }

    /// Apply one inbound event
    ///
    /// Failures are answered on this connection only and never end the
    /// session.
    pub async fn handle_event(&self, event: ClientEvent) {
        let event_type = event.event_type();
        debug!(
            connection_id = %self.connection_id,
            user_id = %self.user_id(),
            event_type,
            "Handling client event"
        );

        let registry = self.coordinator.registry();
        let user_id = self.user_id();

        match event {
            ClientEvent::CreateRoom => {
                if let Err(err) = self.create_room().await {
                    self.log_failure(event_type, &err);
                    self.reply(ServerEvent::CreateRoomFailed {
                        reason: err.reason().to_string(),
                    });
                }
            }
            ClientEvent::JoinRoom { room_id } => {
                if let Err(err) = registry.join_room(user_id, &room_id) {
                    self.log_failure(event_type, &err);
                    self.reply(ServerEvent::JoinRoomFailed {
                        reason: err.reason().to_string(),
                    });
                }
            }
            ClientEvent::LeaveRoom => {
                if registry.leave_room(user_id).is_none() {
                    debug!(user_id = %user_id, "Leave ignored, not in a room");
                }
            }
            ClientEvent::Sync {
                is_playing,
                position_seconds,
            } => {
                let now = self.coordinator.now_millis();
                match registry.apply_sync(user_id, is_playing, position_seconds, now) {
                    Ok(_) => {}
                    Err(err @ (Error::NotHost | Error::NotInRoom)) => {
                        debug!(user_id = %user_id, reason = err.reason(), "Sync ignored");
                    }
                    Err(err) => self.log_failure(event_type, &err),
                }
            }
            ClientEvent::QueueTrack { track } => {
                self.report(event_type, registry.queue_track(user_id, track));
            }
            ClientEvent::ProposeTrack { track } => {
                self.report(event_type, registry.propose_track(user_id, track));
            }
            ClientEvent::AcceptProposal { index } => {
                self.report(event_type, registry.accept_proposal(user_id, index));
            }
            ClientEvent::SkipTrack => {
                let now = self.coordinator.now_millis();
                self.report(event_type, registry.skip_track(user_id, now));
            }
        }
    }

    async fn create_room(&self) -> Result<RoomSnapshot> {
        if !self.identity.account_tier.can_host() {
            return Err(Error::EntitlementDenied);
        }

        // Cheap early exit; create_room re-checks under the registry lock
        let registry = self.coordinator.registry();
        if let Some(room_id) = registry.room_of(self.user_id()) {
            return Err(Error::AlreadyInRoom(room_id));
        }

        let max_members = self
            .coordinator
            .quota()
            .max_room_size(&self.identity)
            .await?;

        registry.create_room(self.user_id(), max_members, self.coordinator.now_millis())
    }

    fn report(&self, action: &'static str, result: Result<RoomSnapshot>) {
        if let Err(err) = result {
            self.log_failure(action, &err);
            self.reply(ServerEvent::ActionFailed {
                action: action.to_string(),
                reason: err.reason().to_string(),
            });
        }
    }

    fn log_failure(&self, action: &str, err: &Error) {
        match err {
            Error::Internal(_) => warn!(
                connection_id = %self.connection_id,
                action,
                error = %err,
                "Client event failed"
            ),
            _ => debug!(
                connection_id = %self.connection_id,
                action,
                reason = err.reason(),
                "Client event rejected"
            ),
        }
    }

    fn reply(&self, event: ServerEvent) {
        self.coordinator
            .membership()
            .send_to_connection(&self.connection_id, event);
    }

    /// Run the session until the transport closes or a disconnect is forced
    ///
    /// Always ends with [`Self::disconnect`].
    pub async fn run<S: StreamMessage>(
        &self,
        stream: &mut S,
        mut outbound: mpsc::UnboundedReceiver<ServerEvent>,
    ) {
        let membership = self.coordinator.membership();
        let mut disconnect_rx = self
            .disconnect_rx
            .lock()
            .take()
            .unwrap_or_else(|| membership.subscribe_disconnect());

        // tokio intervals panic on a zero period
        let keepalive_period = membership
            .limits()
            .keepalive_interval
            .max(Duration::from_millis(10));
        let mut keepalive = interval_at(Instant::now() + keepalive_period, keepalive_period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                inbound = stream.recv() => {
                    match inbound {
                        Some(Ok(Incoming::Event(event))) => {
                            membership.record_message(&self.connection_id);
                            self.handle_event(event).await;
                        }
                        Some(Ok(Incoming::Keepalive)) => {
                            membership.record_keepalive(&self.connection_id);
                        }
                        Some(Err(StreamError::Decode(message))) => {
                            membership.record_message(&self.connection_id);
                            debug!(
                                connection_id = %self.connection_id,
                                error = %message,
                                "Malformed client message"
                            );
                            self.reply(ServerEvent::ProtocolError { message });
                        }
                        Some(Err(StreamError::Transport(e))) => {
                            warn!(connection_id = %self.connection_id, error = %e, "Transport error");
                            break;
                        }
                        None => {
                            info!(connection_id = %self.connection_id, "Client disconnected");
                            break;
                        }
                    }
                }

                event = outbound.recv() => {
                    let Some(event) = event else {
                        warn!(connection_id = %self.connection_id, "Outbound channel closed");
                        break;
                    };
                    if let Err(e) = stream.send(&event).await {
                        warn!(connection_id = %self.connection_id, error = %e, "Failed to send event");
                        break;
                    }
                }

                _ = keepalive.tick() => {
                    if let Err(e) = stream.ping().await {
                        warn!(connection_id = %self.connection_id, error = %e, "Failed to send keepalive");
                        break;
                    }
                }

                signal = disconnect_rx.recv() => {
                    match signal {
                        Ok(signal) if signal.targets(&self.connection_id, self.user_id()) => {
                            info!(
                                connection_id = %self.connection_id,
                                signal = ?signal,
                                "Received disconnect signal for this connection"
                            );
                            break;
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Disconnect signal channel lagged");
                        }
                        Err(RecvError::Closed) => {
                            warn!("Disconnect signal channel closed");
                            break;
                        }
                    }
                }
            }
        }

        self.disconnect();
    }

    /// Release this connection's resources
    ///
    /// Idempotent. When this was the user's last connection and the user
    /// has not reconnected meanwhile, the user leaves their room.
    pub fn disconnect(&self) -> Option<LeaveOutcome> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return None;
        }

        let last_connection_closed = self
            .coordinator
            .membership()
            .remove_connection(self.user_id(), &self.connection_id);
        if !last_connection_closed {
            return None;
        }

        let outcome = self.coordinator.registry().evict_if_offline(self.user_id());
        if let Some(left) = &outcome {
            info!(
                user_id = %self.user_id(),
                room_id = %left.room_id,
                was_host = left.was_host,
                "Last connection closed, user removed from room"
            );
        }
        outcome
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.disconnect();
    }
}
