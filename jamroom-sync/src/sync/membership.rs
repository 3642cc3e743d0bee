use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use jamroom_core::config::ConnectionLimitsConfig;
use jamroom_core::models::{AccountTier, ConnectionId, Identity, RoomId, UserId};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use super::events::ServerEvent;
use crate::{Error, Result};

/// Outbound channel of a single connection
pub type MessageSender = mpsc::UnboundedSender<ServerEvent>;

/// Connection information
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub account_tier: AccountTier,
    /// Room occupied by this connection's user
    pub room_id: Option<RoomId>,
    pub connected_at: Instant,
    pub last_activity: Instant,
    pub message_count: u64,
    sender: MessageSender,
}

impl ConnectionInfo {
    fn new(connection_id: ConnectionId, identity: &Identity, sender: MessageSender) -> Self {
        let now = Instant::now();
        Self {
            connection_id,
            user_id: identity.user_id.clone(),
            account_tier: identity.account_tier,
            room_id: None,
            connected_at: now,
            last_activity: now,
            message_count: 0,
            sender,
        }
    }

    #[must_use]
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }

    #[must_use]
    pub fn idle_duration(&self) -> Duration {
        self.last_activity.elapsed()
    }
}

/// Connection limits configuration
#[derive(Debug, Clone)]
pub struct ConnectionLimits {
    /// Maximum connections per user
    pub max_per_user: usize,

    /// Maximum total connections
    pub max_total: usize,

    /// Idle timeout (disconnect if no activity)
    pub idle_timeout: Duration,

    /// Maximum connection duration
    pub max_duration: Duration,

    /// Interval between transport pings sent by each session
    pub keepalive_interval: Duration,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self::from(&ConnectionLimitsConfig::default())
    }
}

impl From<&ConnectionLimitsConfig> for ConnectionLimits {
    fn from(config: &ConnectionLimitsConfig) -> Self {
        Self {
            max_per_user: config.max_per_user,
            max_total: config.max_total,
            idle_timeout: config.idle_timeout(),
            max_duration: config.max_duration(),
            keepalive_interval: config.keepalive_interval(),
        }
    }
}

/// Request to close connections from outside their session loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectSignal {
    Connection(ConnectionId),
    User(UserId),
    /// Every connection, used on server shutdown
    All,
}

impl DisconnectSignal {
    #[must_use]
    pub fn targets(&self, connection_id: &ConnectionId, user_id: &UserId) -> bool {
        match self {
            Self::Connection(id) => id == connection_id,
            Self::User(id) => id == user_id,
            Self::All => true,
        }
    }
}

/// Tracks every open connection and which user owns it.
///
/// `user_connections` holds one non-empty set per connected user; a user
/// has no entry once their last connection closes. Lock order is always
/// `user_connections` before `connections`, and no shard guard of
/// `connections` is held while touching `user_connections`.
pub struct MembershipIndex {
    /// All active connections by `connection_id`
    connections: DashMap<ConnectionId, ConnectionInfo>,

    /// Connections by `user_id`
    user_connections: DashMap<UserId, HashSet<ConnectionId>>,

    limits: ConnectionLimits,

    disconnect_tx: broadcast::Sender<DisconnectSignal>,

    /// Metrics
    total_connections: AtomicU64,
    total_messages: AtomicU64,
}

impl MembershipIndex {
    #[must_use]
    pub fn new(limits: ConnectionLimits) -> Self {
        let (disconnect_tx, _) = broadcast::channel(256);
        Self {
            connections: DashMap::new(),
            user_connections: DashMap::new(),
            limits,
            disconnect_tx,
            total_connections: AtomicU64::new(0),
            total_messages: AtomicU64::new(0),
        }
    }

    /// Register a new connection for `identity`
    ///
    /// Rejected when the server or the user is at the connection limit.
    pub fn add_connection(
        &self,
        identity: &Identity,
        connection_id: ConnectionId,
        sender: MessageSender,
    ) -> Result<()> {
        if self.connections.len() >= self.limits.max_total {
            return Err(Error::TooManyConnections(format!(
                "server at capacity ({} connections)",
                self.limits.max_total
            )));
        }

        let user_id = identity.user_id.clone();
        let mut user_conns = self.user_connections.entry(user_id.clone()).or_default();
        if user_conns.len() >= self.limits.max_per_user {
            let rejected = Error::TooManyConnections(format!(
                "too many connections for this user (max {})",
                self.limits.max_per_user
            ));
            let empty = user_conns.is_empty();
            drop(user_conns);
            if empty {
                self.user_connections.remove_if(&user_id, |_, set| set.is_empty());
            }
            return Err(rejected);
        }

        user_conns.insert(connection_id.clone());
        self.connections.insert(
            connection_id.clone(),
            ConnectionInfo::new(connection_id.clone(), identity, sender),
        );
        let user_connection_count = user_conns.len();
        drop(user_conns);

        self.total_connections.fetch_add(1, Ordering::Relaxed);

        info!(
            connection_id = %connection_id,
            user_id = %user_id,
            user_connections = user_connection_count,
            total_connections = self.connections.len(),
            "Connection registered"
        );

        Ok(())
    }

    /// Remove a connection
    ///
    /// Returns `true` only when this removed the user's last open connection.
    /// Unknown connections and connections owned by another user are left
    /// untouched and return `false`.
    pub fn remove_connection(&self, user_id: &UserId, connection_id: &ConnectionId) -> bool {
        let Some((_, conn_info)) = self
            .connections
            .remove_if(connection_id, |_, info| &info.user_id == user_id)
        else {
            debug!(
                connection_id = %connection_id,
                user_id = %user_id,
                "Attempted to remove unknown connection"
            );
            return false;
        };

        let last_connection_closed = match self.user_connections.entry(user_id.clone()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().remove(connection_id);
                if entry.get().is_empty() {
                    entry.remove();
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(_) => {
                warn!(
                    connection_id = %connection_id,
                    user_id = %user_id,
                    "Connection had no user entry"
                );
                false
            }
        };

        info!(
            connection_id = %connection_id,
            user_id = %user_id,
            duration = ?conn_info.duration(),
            message_count = conn_info.message_count,
            last_connection_closed,
            "Connection unregistered"
        );

        last_connection_closed
    }

    /// Record the room currently occupied by every connection of a user
    pub fn assign_room(&self, user_id: &UserId, room_id: Option<&RoomId>) {
        let Some(conn_ids) = self.user_connections.get(user_id) else {
            return;
        };
        for conn_id in conn_ids.iter() {
            if let Some(mut conn) = self.connections.get_mut(conn_id) {
                conn.room_id = room_id.cloned();
            }
        }
    }

    /// Send an event to one connection
    pub fn send_to_connection(&self, connection_id: &ConnectionId, event: ServerEvent) -> bool {
        let Some(conn) = self.connections.get(connection_id) else {
            return false;
        };
        Self::deliver(&conn, event)
    }

    /// Send an event to every connection of a user
    pub fn send_to_user(&self, user_id: &UserId, event: &ServerEvent) -> usize {
        let Some(conn_ids) = self.user_connections.get(user_id) else {
            return 0;
        };

        conn_ids
            .iter()
            .filter_map(|conn_id| self.connections.get(conn_id))
            .filter(|conn| Self::deliver(conn, event.clone()))
            .count()
    }

    fn deliver(conn: &ConnectionInfo, event: ServerEvent) -> bool {
        let event_type = event.event_type();
        match conn.sender.send(event) {
            Ok(()) => {
                debug!(
                    user_id = %conn.user_id,
                    connection_id = %conn.connection_id,
                    event_type,
                    "Event sent to connection"
                );
                true
            }
            Err(_) => {
                // The session loop is shutting down and will unregister itself
                warn!(
                    user_id = %conn.user_id,
                    connection_id = %conn.connection_id,
                    event_type,
                    "Failed to send event, connection closing"
                );
                false
            }
        }
    }

    /// Record message activity for a connection
    pub fn record_message(&self, connection_id: &ConnectionId) {
        if let Some(mut conn) = self.connections.get_mut(connection_id) {
            conn.last_activity = Instant::now();
            conn.message_count += 1;
        }
        self.total_messages.fetch_add(1, Ordering::Relaxed);
    }

    /// Record transport-level liveness (a pong or client ping)
    ///
    /// Keeps a silent but connected listener from being reaped without
    /// counting as a client message.
    pub fn record_keepalive(&self, connection_id: &ConnectionId) {
        if let Some(mut conn) = self.connections.get_mut(connection_id) {
            conn.last_activity = Instant::now();
        }
    }

    /// Check for idle or expired connections
    ///
    /// Idle means neither a client message nor a keepalive answer arrived
    /// within `idle_timeout`, i.e. the transport is presumed dead.
    ///
    /// Returns list of connection IDs that should be disconnected
    #[must_use]
    pub fn check_timeouts(&self) -> Vec<ConnectionId> {
        let mut to_disconnect = Vec::new();

        for entry in &self.connections {
            let conn = entry.value();

            if conn.idle_duration() > self.limits.idle_timeout {
                warn!(
                    connection_id = %conn.connection_id,
                    idle_duration = ?conn.idle_duration(),
                    "Connection idle timeout"
                );
                to_disconnect.push(conn.connection_id.clone());
                continue;
            }

            if conn.duration() > self.limits.max_duration {
                warn!(
                    connection_id = %conn.connection_id,
                    duration = ?conn.duration(),
                    "Connection max duration reached"
                );
                to_disconnect.push(conn.connection_id.clone());
            }
        }

        to_disconnect
    }

    #[must_use]
    pub const fn limits(&self) -> &ConnectionLimits {
        &self.limits
    }

    /// Subscribe to forced-disconnect requests
    #[must_use]
    pub fn subscribe_disconnect(&self) -> broadcast::Receiver<DisconnectSignal> {
        self.disconnect_tx.subscribe()
    }

    /// Ask the session loops matching `signal` to close their transport
    ///
    /// Returns the number of session loops that saw the signal.
    pub fn request_disconnect(&self, signal: DisconnectSignal) -> usize {
        debug!(signal = ?signal, "Disconnect requested");
        self.disconnect_tx.send(signal).unwrap_or(0)
    }

    /// Get connection count
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Get connection count for a user
    #[must_use]
    pub fn user_connection_count(&self, user_id: &UserId) -> usize {
        self.user_connections.get(user_id).map_or(0, |conns| conns.len())
    }

    #[must_use]
    pub fn has_connections(&self, user_id: &UserId) -> bool {
        self.user_connections.contains_key(user_id)
    }

    /// Get connection info
    #[must_use]
    pub fn get_connection(&self, connection_id: &ConnectionId) -> Option<ConnectionInfo> {
        self.connections.get(connection_id).map(|c| c.clone())
    }

    /// Get all connections for a user
    #[must_use]
    pub fn get_user_connections(&self, user_id: &UserId) -> Vec<ConnectionInfo> {
        let Some(conn_ids) = self.user_connections.get(user_id) else {
            return Vec::new();
        };
        conn_ids
            .iter()
            .filter_map(|id| self.connections.get(id).map(|c| c.clone()))
            .collect()
    }

    /// Get metrics summary
    #[must_use]
    pub fn metrics(&self) -> MembershipMetrics {
        MembershipMetrics {
            active_connections: self.connection_count(),
            active_users: self.user_connections.len(),
            total_connections: self.total_connections.load(Ordering::Relaxed),
            total_messages: self.total_messages.load(Ordering::Relaxed),
        }
    }
}

impl Default for MembershipIndex {
    fn default() -> Self {
        Self::new(ConnectionLimits::default())
    }
}

/// Connection metrics
#[derive(Debug, Clone, serde::Serialize)]
pub struct MembershipMetrics {
    pub active_connections: usize,
    pub active_users: usize,
    pub total_connections: u64,
    pub total_messages: u64,
}
