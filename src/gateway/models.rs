use serde::{Deserialize, Serialize};
use serde_json::Value;

fn default_event() -> String {
    "chat-events".to_string()
}

/// `POST /emit` request body.
#[derive(Debug, Deserialize)]
pub struct EmitRequest {
    pub user_id: String,
    #[serde(default = "default_event")]
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Serialize)]
pub struct EmitResponse {
    pub status: &'static str,
    /// Number of connections the event was addressed to.
    pub sent: usize,
}
