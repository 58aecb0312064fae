use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::auth::UserIdentity;
use crate::relay::ServerEvent;

/// Handle for a single live connection.
///
/// The handle itself is immutable; it carries just enough to enqueue an
/// outbound event. Writing to the underlying socket is owned exclusively by
/// the connection's send task.
pub struct ConnectionHandle {
    pub id: Uuid,
    pub sender: mpsc::Sender<ServerEvent>,
    pub connected_at: DateTime<Utc>,
}

impl ConnectionHandle {
    pub fn new(sender: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender,
            connected_at: Utc::now(),
        }
    }

    /// Enqueue an event for delivery. Fails when the connection's send task
    /// has already shut down; callers treat that as a per-member delivery
    /// failure, never as fatal.
    pub async fn send(&self, event: ServerEvent) -> Result<(), mpsc::error::SendError<ServerEvent>> {
        self.sender.send(event).await
    }
}

struct ConnectionEntry {
    handle: Arc<ConnectionHandle>,
    identity: Option<Arc<UserIdentity>>,
}

/// A connection removed from the registry, carrying its last-bound identity
/// to drive cascading cleanup.
pub struct RemovedConnection {
    pub handle: Arc<ConnectionHandle>,
    pub identity: Option<Arc<UserIdentity>>,
}

/// Single source of truth for which connections are live and as whom they
/// are authenticated. connection_id -> (handle, bound identity).
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<Uuid, ConnectionEntry>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection on transport accept. Refuses duplicates.
    pub fn register(&self, handle: Arc<ConnectionHandle>) -> bool {
        match self.connections.entry(handle.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                tracing::warn!(connection_id = %handle.id, "Connection already registered");
                false
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(ConnectionEntry {
                    handle,
                    identity: None,
                });
                true
            }
        }
    }

    /// Attach or replace the identity bound to a live connection.
    pub fn bind_identity(&self, connection_id: Uuid, identity: Arc<UserIdentity>) -> bool {
        match self.connections.get_mut(&connection_id) {
            Some(mut entry) => {
                entry.identity = Some(identity);
                true
            }
            None => {
                tracing::debug!(
                    connection_id = %connection_id,
                    "Identity bind for unregistered connection dropped"
                );
                false
            }
        }
    }

    /// Currently bound identity, if any.
    pub fn lookup(&self, connection_id: Uuid) -> Option<Arc<UserIdentity>> {
        self.connections
            .get(&connection_id)
            .and_then(|entry| entry.identity.clone())
    }

    /// Delivery reference for a live connection.
    pub fn get(&self, connection_id: Uuid) -> Option<Arc<ConnectionHandle>> {
        self.connections
            .get(&connection_id)
            .map(|entry| entry.handle.clone())
    }

    pub fn contains(&self, connection_id: Uuid) -> bool {
        self.connections.contains_key(&connection_id)
    }

    /// Atomically remove a connection, returning its last-bound identity for
    /// cascading cleanup of the identity index and usage tracker.
    pub fn remove(&self, connection_id: Uuid) -> Option<RemovedConnection> {
        self.connections
            .remove(&connection_id)
            .map(|(_, entry)| RemovedConnection {
                handle: entry.handle,
                identity: entry.identity,
            })
    }

    /// Number of live connections (`active_sessions`).
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
