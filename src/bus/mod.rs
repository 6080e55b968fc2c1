//! Bus presence layer: how a crashed remote client cannot leak handles.
//!
//! Clients register their bus name over TCP and keep the connection open;
//! the worker turns `Bye`, EOF, or a dead socket into a
//! [`PresenceEvent::NameVanished`] event. The event-loop owner applies that
//! to each handle repository with `release_all(&name)`, dropping every
//! reference the vanished client indirectly held. The repositories never
//! depend on this module; any bus binding that produces the same events
//! works.
//!
//! Feature-gated: `networking`.

mod protocol;
mod worker;

pub use protocol::{
    decode_name, encode_frame, FrameHeader, FrameKind, PresenceError, PRESENCE_MAGIC,
    PRESENCE_VERSION,
};
pub use worker::{PresenceCommand, PresenceConfig, PresenceEvent, PresenceWorker};
