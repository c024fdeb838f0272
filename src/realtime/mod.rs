//! Realtime (WebSocket) channel bound to a session credential

pub mod channel;
pub mod events;

pub use channel::{Channel, ChannelManager, ChannelSignal};
pub use events::{ClientCommand, ServerEvent};
