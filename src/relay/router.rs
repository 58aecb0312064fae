use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{AuthDelegate, UserIdentity};
use crate::registry::{ConnectionRegistry, IdentityIndex, UsageTracker};

use super::{channel_room, ClientEvent, EventDispatcher, ServerEvent};

/// Dispatch core: applies per-type handling to inbound events and drives
/// the registries through the connect/disconnect lifecycle.
pub struct EventRouter {
    connections: Arc<ConnectionRegistry>,
    identities: Arc<IdentityIndex>,
    usage: Arc<UsageTracker>,
    delegate: Arc<dyn AuthDelegate>,
    dispatcher: Arc<EventDispatcher>,
}

impl EventRouter {
    pub fn new(
        connections: Arc<ConnectionRegistry>,
        identities: Arc<IdentityIndex>,
        usage: Arc<UsageTracker>,
        delegate: Arc<dyn AuthDelegate>,
        dispatcher: Arc<EventDispatcher>,
    ) -> Self {
        Self {
            connections,
            identities,
            usage,
            delegate,
            dispatcher,
        }
    }

    /// Run the delegated authentication path for a connection and bind the
    /// returned identity. Failure leaves the connection registered and
    /// unauthenticated; nothing is sent to the client from here.
    ///
    /// The delegate call suspends without holding any registry lock.
    #[tracing::instrument(name = "relay.authenticate", skip(self, token))]
    pub async fn authenticate_connection(
        &self,
        connection_id: Uuid,
        token: &str,
    ) -> Option<Arc<UserIdentity>> {
        let identity = match self.delegate.authenticate(token).await {
            Ok(identity) => Arc::new(identity),
            Err(e) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    error = %e,
                    "Authentication failed"
                );
                return None;
            }
        };

        // The connection may have gone away while the delegate call was in
        // flight; it must be in the registry before it may enter the index.
        let previous = self.connections.lookup(connection_id);
        if !self.connections.bind_identity(connection_id, identity.clone()) {
            return None;
        }

        // A connection belongs to at most one identity's set; re-authentication
        // as someone else retires the old index entry.
        if let Some(previous) = previous {
            if previous.id != identity.id {
                self.identities.remove(&previous.id, connection_id);
            }
        }
        self.identities.add(&identity.id, connection_id);

        // Close the window where disconnect cleanup ran between the bind and
        // the index insert: a vanished connection must not linger in the index.
        if !self.connections.contains(connection_id) {
            self.identities.remove(&identity.id, connection_id);
            return None;
        }

        tracing::info!(
            connection_id = %connection_id,
            user_id = %identity.id,
            "User authenticated"
        );

        Some(identity)
    }

    /// Handle one decoded inbound event.
    #[tracing::instrument(
        name = "relay.event",
        skip(self, event),
        fields(event_type = ?std::mem::discriminant(&event))
    )]
    pub async fn dispatch(&self, connection_id: Uuid, event: ClientEvent) {
        match event {
            ClientEvent::UserJoin { auth } => self.handle_user_join(connection_id, auth).await,
            ClientEvent::Usage { model } => self.handle_usage(connection_id, model),
            ClientEvent::ChatEvents { data } => {
                tracing::debug!(connection_id = %connection_id, data = %data, "Chat event received");
            }
            ClientEvent::ChannelEvents(payload) => {
                self.handle_channel_event(connection_id, payload).await;
            }
            ClientEvent::Unknown { event_type } => {
                tracing::debug!(
                    connection_id = %connection_id,
                    event_type = %event_type,
                    "Unknown event type dropped"
                );
            }
        }
    }

    async fn handle_user_join(&self, connection_id: Uuid, auth: Option<super::Credential>) {
        if !self.connections.contains(connection_id) {
            tracing::debug!(connection_id = %connection_id, "Join from unregistered connection dropped");
            return;
        }

        let Some(credential) = auth else {
            self.send_to_connection(
                connection_id,
                ServerEvent::JoinRejected {
                    message: "missing credential".to_string(),
                },
            )
            .await;
            return;
        };

        match self
            .authenticate_connection(connection_id, &credential.token)
            .await
        {
            Some(identity) => {
                self.send_to_connection(
                    connection_id,
                    ServerEvent::Joined {
                        id: identity.id.clone(),
                        name: identity.name.clone(),
                    },
                )
                .await;
            }
            None => {
                self.send_to_connection(
                    connection_id,
                    ServerEvent::JoinRejected {
                        message: "authentication failed".to_string(),
                    },
                )
                .await;
            }
        }
    }

    fn handle_usage(&self, connection_id: Uuid, model: Option<String>) {
        // Registration is required, authentication is not.
        if !self.connections.contains(connection_id) {
            tracing::debug!(connection_id = %connection_id, "Usage ping from unregistered connection dropped");
            return;
        }

        let Some(model) = model else {
            tracing::debug!(connection_id = %connection_id, "Usage ping without model dropped");
            return;
        };

        self.usage.touch(&model, connection_id, Utc::now());
        tracing::debug!(connection_id = %connection_id, model = %model, "Usage tracked");
    }

    async fn handle_channel_event(&self, connection_id: Uuid, payload: super::ChannelEventPayload) {
        let Some(channel_id) = payload.channel_id else {
            tracing::debug!(
                connection_id = %connection_id,
                "Channel event without channel_id dropped"
            );
            return;
        };

        // Provenance: the sender's bound identity, or `{}` when anonymous.
        let user = match self.connections.lookup(connection_id) {
            Some(identity) => serde_json::to_value(&*identity).unwrap_or_else(|_| json!({})),
            None => json!({}),
        };

        let event = ServerEvent::ChannelEvent {
            channel_id: channel_id.clone(),
            message_id: payload.message_id,
            data: payload.data,
            user,
        };

        self.dispatcher
            .broadcast_to_room(&channel_room(&channel_id), Some(connection_id), event)
            .await;
    }

    /// Cascading disconnect cleanup. Runs to completion exactly once per
    /// connection, whether or not it ever authenticated.
    ///
    /// Removal order: registry first, so a fan-out racing this cleanup either
    /// resolves a live handle or records the failed delivery.
    pub fn handle_disconnect(&self, connection_id: Uuid) {
        let removed = self.connections.remove(connection_id);

        if let Some(removed) = &removed {
            if let Some(identity) = &removed.identity {
                self.identities.remove(&identity.id, connection_id);
            }
        }

        self.usage.release_connection(connection_id);

        match removed.and_then(|r| r.identity) {
            Some(identity) => {
                tracing::info!(
                    connection_id = %connection_id,
                    user_id = %identity.id,
                    "Connection removed"
                );
            }
            None => {
                tracing::info!(connection_id = %connection_id, "Connection removed");
            }
        }
    }

    async fn send_to_connection(&self, connection_id: Uuid, event: ServerEvent) {
        let Some(handle) = self.connections.get(connection_id) else {
            return;
        };
        if handle.send(event).await.is_err() {
            tracing::debug!(
                connection_id = %connection_id,
                "Response dropped, channel closed"
            );
        }
    }
}
