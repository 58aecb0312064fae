use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::registry::{ConnectionRegistry, IdentityIndex};

use super::ServerEvent;

/// Room membership resolution, owned by the transport/channel layer and
/// injected here so fan-out stays testable with a fake provider.
pub trait RoomMembership: Send + Sync {
    fn members_of(&self, room: &str) -> Vec<Uuid>;
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DispatchError {
    #[error("no live connections for identity")]
    NoRecipients,
}

/// Result of one fan-out.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DeliveryReport {
    /// Connections the event was addressed to.
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
struct DispatcherStats {
    total_sent: AtomicU64,
    total_delivered: AtomicU64,
    total_failed: AtomicU64,
    push_events: AtomicU64,
    channel_broadcasts: AtomicU64,
}

/// Snapshot of dispatcher delivery counters.
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub total_sent: u64,
    pub total_delivered: u64,
    pub total_failed: u64,
    pub push_events: u64,
    pub channel_broadcasts: u64,
}

impl DispatcherStats {
    fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            total_sent: self.total_sent.load(Ordering::Relaxed),
            total_delivered: self.total_delivered.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
            push_events: self.push_events.load(Ordering::Relaxed),
            channel_broadcasts: self.channel_broadcasts.load(Ordering::Relaxed),
        }
    }

    fn record(&self, report: DeliveryReport) {
        self.total_sent.fetch_add(1, Ordering::Relaxed);
        self.total_delivered
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.total_failed
            .fetch_add(report.failed as u64, Ordering::Relaxed);
    }
}

/// Fans events out to an identity's connections or to a room's members.
///
/// Delivery is best-effort, at most once: every member is attempted
/// independently and a failure to one never aborts the rest.
pub struct EventDispatcher {
    connections: Arc<ConnectionRegistry>,
    identities: Arc<IdentityIndex>,
    rooms: Arc<dyn RoomMembership>,
    stats: DispatcherStats,
}

impl EventDispatcher {
    pub fn new(
        connections: Arc<ConnectionRegistry>,
        identities: Arc<IdentityIndex>,
        rooms: Arc<dyn RoomMembership>,
    ) -> Self {
        Self {
            connections,
            identities,
            rooms,
            stats: DispatcherStats::default(),
        }
    }

    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    /// Deliver an event to every live connection of an identity.
    ///
    /// Fails with `NoRecipients` when the identity has no connections; the
    /// report's `attempted` is the set size at lookup time, so a connection
    /// torn down mid-flight shows up as a recorded failure rather than a
    /// shrunk count.
    #[tracing::instrument(name = "dispatch.send_to_identity", skip(self, event))]
    pub async fn send_to_identity(
        &self,
        user_id: &str,
        event: ServerEvent,
    ) -> Result<DeliveryReport, DispatchError> {
        let targets = self.identities.connections_for(user_id);
        if targets.is_empty() {
            return Err(DispatchError::NoRecipients);
        }

        let report = self.deliver(&targets, &event).await;
        self.stats.record(report);
        self.stats.push_events.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            user_id = %user_id,
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            "Delivered event to identity"
        );

        Ok(report)
    }

    /// Deliver an event to every member of a room except `exclude`.
    #[tracing::instrument(name = "dispatch.broadcast_to_room", skip(self, event, exclude))]
    pub async fn broadcast_to_room(
        &self,
        room: &str,
        exclude: Option<Uuid>,
        event: ServerEvent,
    ) -> DeliveryReport {
        let targets: Vec<Uuid> = self
            .rooms
            .members_of(room)
            .into_iter()
            .filter(|id| Some(*id) != exclude)
            .collect();

        let report = self.deliver(&targets, &event).await;
        self.stats.record(report);
        self.stats.channel_broadcasts.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            room = %room,
            attempted = report.attempted,
            delivered = report.delivered,
            failed = report.failed,
            "Broadcast event to room"
        );

        report
    }

    /// Attempt delivery to each target independently. A target missing from
    /// the connection registry or whose channel has closed counts as a
    /// failure; nothing here is fatal to the caller.
    async fn deliver(&self, targets: &[Uuid], event: &ServerEvent) -> DeliveryReport {
        let mut delivered = 0;
        let mut failed = 0;

        for connection_id in targets {
            let Some(handle) = self.connections.get(*connection_id) else {
                tracing::debug!(
                    connection_id = %connection_id,
                    "Delivery target already unregistered"
                );
                failed += 1;
                continue;
            };

            match handle.send(event.clone()).await {
                Ok(()) => delivered += 1,
                Err(_) => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        "Delivery failed, channel closed"
                    );
                    failed += 1;
                }
            }
        }

        DeliveryReport {
            attempted: targets.len(),
            delivered,
            failed,
        }
    }
}
