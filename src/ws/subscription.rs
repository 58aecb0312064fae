use dashmap::DashMap;
use std::collections::HashSet;
use uuid::Uuid;

use crate::relay::{channel_room, RoomMembership};

/// Transport-owned room membership: room name -> subscribed connection IDs.
///
/// This is the relay's room primitive; the event router only ever sees it
/// through the `RoomMembership` trait.
#[derive(Default)]
pub struct SubscriptionIndex {
    rooms: DashMap<String, HashSet<Uuid>>,
}

impl SubscriptionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a connection into a channel's room.
    pub fn subscribe(&self, connection_id: Uuid, channel: &str) {
        self.rooms
            .entry(channel_room(channel))
            .or_default()
            .insert(connection_id);

        tracing::debug!(connection_id = %connection_id, channel = %channel, "Subscribed to channel");
    }

    /// Leave a channel's room; empty rooms are dropped.
    pub fn unsubscribe(&self, connection_id: Uuid, channel: &str) {
        let room = channel_room(channel);
        if let Some(mut members) = self.rooms.get_mut(&room) {
            members.remove(&connection_id);
            if members.is_empty() {
                drop(members);
                self.rooms.remove(&room);
            }
        }

        tracing::debug!(connection_id = %connection_id, channel = %channel, "Unsubscribed from channel");
    }

    /// Remove a connection from every room on disconnect.
    pub fn release_connection(&self, connection_id: Uuid) {
        for mut entry in self.rooms.iter_mut() {
            entry.value_mut().remove(&connection_id);
        }

        self.rooms.retain(|_, members| !members.is_empty());
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl RoomMembership for SubscriptionIndex {
    fn members_of(&self, room: &str) -> Vec<Uuid> {
        self.rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }
}
