mod dispatcher;
mod events;
mod router;

pub use dispatcher::{
    DeliveryReport, DispatchError, DispatcherStatsSnapshot, EventDispatcher, RoomMembership,
};
pub use events::{channel_room, ChannelEventPayload, ClientEvent, Credential, ServerEvent};
pub use router::EventRouter;
