use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Room name for a channel's subscribers.
pub fn channel_room(channel_id: &str) -> String {
    format!("channel:{}", channel_id)
}

/// Credential supplied by a client at connect or join time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JoinPayload {
    #[serde(default)]
    pub auth: Option<Credential>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsagePayload {
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelEventPayload {
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub data: Value,
}

/// Inbound events the relay core interprets. Decoded once at the transport
/// boundary; anything outside the closed set lands in `Unknown` and is
/// dropped after logging.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Explicit identity claim after connect.
    UserJoin { auth: Option<Credential> },
    /// Resource activity ping.
    Usage { model: Option<String> },
    /// Informational passthrough; the relay does not interpret it.
    ChatEvents { data: Value },
    /// Room broadcast request.
    ChannelEvents(ChannelEventPayload),
    Unknown { event_type: String },
}

impl ClientEvent {
    /// Build a typed event from a decoded `(type, data)` frame.
    pub fn from_parts(event_type: &str, data: Value) -> Self {
        match event_type {
            "user-join" => {
                let payload: JoinPayload = serde_json::from_value(data).unwrap_or_default();
                ClientEvent::UserJoin { auth: payload.auth }
            }
            "usage" => {
                let payload: UsagePayload = serde_json::from_value(data).unwrap_or_default();
                ClientEvent::Usage {
                    model: payload.model,
                }
            }
            "chat-events" => ClientEvent::ChatEvents { data },
            "channel-events" => {
                let payload: ChannelEventPayload =
                    serde_json::from_value(data).unwrap_or_default();
                ClientEvent::ChannelEvents(payload)
            }
            other => ClientEvent::Unknown {
                event_type: other.to_string(),
            },
        }
    }
}

/// Outbound events, framed as `{"type": ..., "data": ...}`.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// Join acknowledgement carrying the identity's public attributes.
    Joined { id: String, name: String },
    /// Explicit join rejection.
    JoinRejected { message: String },
    /// A channel broadcast re-emitted to room members, with the sender's
    /// identity attached as provenance (`{}` when unauthenticated).
    ChannelEvent {
        channel_id: String,
        message_id: Option<String>,
        data: Value,
        user: Value,
    },
    /// Backend-originated event addressed to an identity's connections; the
    /// event name is chosen by the caller.
    Push { event: String, data: Value },
}

impl ServerEvent {
    pub fn push(event: impl Into<String>, data: Value) -> Self {
        Self::Push {
            event: event.into(),
            data,
        }
    }

    pub fn to_frame(&self) -> Value {
        match self {
            ServerEvent::Joined { id, name } => json!({
                "type": "joined",
                "data": { "id": id, "name": name },
            }),
            ServerEvent::JoinRejected { message } => json!({
                "type": "join-error",
                "data": { "message": message },
            }),
            ServerEvent::ChannelEvent {
                channel_id,
                message_id,
                data,
                user,
            } => json!({
                "type": "channel-events",
                "data": {
                    "channel_id": channel_id,
                    "message_id": message_id,
                    "data": data,
                    "user": user,
                },
            }),
            ServerEvent::Push { event, data } => json!({
                "type": event,
                "data": data,
            }),
        }
    }

    pub fn to_json(&self) -> String {
        self.to_frame().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_join_decode() {
        let data = json!({ "auth": { "token": "secret" } });
        match ClientEvent::from_parts("user-join", data) {
            ClientEvent::UserJoin { auth: Some(credential) } => {
                assert_eq!(credential.token, "secret");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_user_join_without_credential() {
        match ClientEvent::from_parts("user-join", json!({})) {
            ClientEvent::UserJoin { auth: None } => {}
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_usage_decode() {
        match ClientEvent::from_parts("usage", json!({ "model": "gpt-4" })) {
            ClientEvent::Usage { model: Some(model) } => assert_eq!(model, "gpt-4"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_channel_events_decode() {
        let data = json!({
            "channel_id": "general",
            "message_id": "m1",
            "data": { "content": "hi" },
        });
        match ClientEvent::from_parts("channel-events", data) {
            ClientEvent::ChannelEvents(payload) => {
                assert_eq!(payload.channel_id.as_deref(), Some("general"));
                assert_eq!(payload.message_id.as_deref(), Some("m1"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_tag_is_closed_off() {
        match ClientEvent::from_parts("mystery", json!({})) {
            ClientEvent::Unknown { event_type } => assert_eq!(event_type, "mystery"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_payload_degrades_to_defaults() {
        // A string where an object is expected decodes to an empty payload,
        // mirroring a client that sent garbage without killing the connection.
        match ClientEvent::from_parts("usage", json!("not-an-object")) {
            ClientEvent::Usage { model: None } => {}
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_push_frame_uses_caller_event_name() {
        let event = ServerEvent::push("chat-events", json!({ "x": 1 }));
        let frame = event.to_frame();
        assert_eq!(frame["type"], "chat-events");
        assert_eq!(frame["data"]["x"], 1);
    }

    #[test]
    fn test_channel_event_frame_shape() {
        let event = ServerEvent::ChannelEvent {
            channel_id: "general".to_string(),
            message_id: None,
            data: json!({ "content": "hi" }),
            user: json!({}),
        };
        let frame = event.to_frame();
        assert_eq!(frame["type"], "channel-events");
        assert_eq!(frame["data"]["channel_id"], "general");
        assert_eq!(frame["data"]["user"], json!({}));
    }

    #[test]
    fn test_channel_room_namespacing() {
        assert_eq!(channel_room("abc"), "channel:abc");
    }
}
