//! Control plane for the backend: push events to a user's live connections
//! without holding a transport connection.

mod handlers;
mod models;

pub use handlers::emit_event;
pub use models::{EmitRequest, EmitResponse};
