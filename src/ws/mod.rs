mod handler;
mod message;
mod subscription;

pub use handler::ws_handler;
pub use message::ClientFrame;
pub use subscription::SubscriptionIndex;
