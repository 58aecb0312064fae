mod connection;
mod identity;
mod usage;

pub use connection::{ConnectionHandle, ConnectionRegistry, RemovedConnection};
pub use identity::IdentityIndex;
pub use usage::UsageTracker;
