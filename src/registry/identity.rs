use dashmap::DashMap;
use std::collections::HashSet;
use uuid::Uuid;

/// user_id -> set of live connection IDs (supports multiple devices).
///
/// A connection ID enters a set only after authentication succeeds, and
/// belongs to at most one identity at a time.
#[derive(Default)]
pub struct IdentityIndex {
    users: DashMap<String, HashSet<Uuid>>,
}

impl IdentityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent: adding the same connection twice has no further effect.
    pub fn add(&self, user_id: &str, connection_id: Uuid) {
        self.users
            .entry(user_id.to_string())
            .or_default()
            .insert(connection_id);
    }

    /// Remove a connection from the identity's set; the entry itself is
    /// dropped once the set becomes empty.
    pub fn remove(&self, user_id: &str, connection_id: Uuid) {
        if let Some(mut connections) = self.users.get_mut(user_id) {
            connections.remove(&connection_id);
            if connections.is_empty() {
                drop(connections);
                self.users.remove(user_id);
            }
        }
    }

    /// Connection IDs currently bound to the identity (possibly empty).
    pub fn connections_for(&self, user_id: &str) -> Vec<Uuid> {
        self.users
            .get(user_id)
            .map(|connections| connections.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of identities with at least one live connection
    /// (`connected_users`).
    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
