use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use uuid::Uuid;

/// resource_id -> connection -> last-activity timestamp.
///
/// Presence/telemetry only; entries for a connection never outlive the
/// connection, and a resource with no remaining connections is dropped.
#[derive(Default)]
pub struct UsageTracker {
    resources: DashMap<String, HashMap<Uuid, DateTime<Utc>>>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert the last-activity timestamp for (resource, connection).
    pub fn touch(&self, resource_id: &str, connection_id: Uuid, timestamp: DateTime<Utc>) {
        self.resources
            .entry(resource_id.to_string())
            .or_default()
            .insert(connection_id, timestamp);
    }

    /// Remove the connection from every resource set. Called exactly once,
    /// during disconnect cleanup.
    pub fn release_connection(&self, connection_id: Uuid) {
        for mut entry in self.resources.iter_mut() {
            entry.value_mut().remove(&connection_id);
        }

        // Drop resources left without any active connection
        self.resources.retain(|_, connections| !connections.is_empty());
    }

    /// Number of resources with at least one active connection.
    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }
}
