use serde::Deserialize;
use serde_json::Value;

use crate::relay::ClientEvent;

/// Raw wire frame: `{"type": <tag>, "data": <payload>}`.
#[derive(Debug, Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ChannelListPayload {
    #[serde(default)]
    channels: Vec<String>,
}

/// A decoded inbound frame. Subscribe/unsubscribe are transport-level room
/// management and never reach the event router; everything else is a core
/// event.
#[derive(Debug, Clone)]
pub enum ClientFrame {
    Subscribe { channels: Vec<String> },
    Unsubscribe { channels: Vec<String> },
    Event(ClientEvent),
}

impl ClientFrame {
    /// Decode a text frame once; dispatch downstream is by `match`.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        let raw: RawFrame = serde_json::from_str(text)?;

        Ok(match raw.event_type.as_str() {
            "subscribe" => {
                let payload: ChannelListPayload =
                    serde_json::from_value(raw.data).unwrap_or_default();
                ClientFrame::Subscribe {
                    channels: payload.channels,
                }
            }
            "unsubscribe" => {
                let payload: ChannelListPayload =
                    serde_json::from_value(raw.data).unwrap_or_default();
                ClientFrame::Unsubscribe {
                    channels: payload.channels,
                }
            }
            other => ClientFrame::Event(ClientEvent::from_parts(other, raw.data)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_frame() {
        let frame = ClientFrame::decode(r#"{"type":"subscribe","data":{"channels":["general"]}}"#)
            .unwrap();
        match frame {
            ClientFrame::Subscribe { channels } => assert_eq!(channels, vec!["general"]),
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_event_frame_passes_through() {
        let frame =
            ClientFrame::decode(r#"{"type":"usage","data":{"model":"gpt-4"}}"#).unwrap();
        match frame {
            ClientFrame::Event(ClientEvent::Usage { model }) => {
                assert_eq!(model.as_deref(), Some("gpt-4"));
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn test_frame_without_data() {
        let frame = ClientFrame::decode(r#"{"type":"chat-events"}"#).unwrap();
        assert!(matches!(
            frame,
            ClientFrame::Event(ClientEvent::ChatEvents { .. })
        ));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        assert!(ClientFrame::decode("not json").is_err());
        assert!(ClientFrame::decode(r#"{"data":{}}"#).is_err());
    }
}
