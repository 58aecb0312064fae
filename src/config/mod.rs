mod settings;

pub use settings::{BackendConfig, ServerConfig, Settings, WebSocketConfig};
