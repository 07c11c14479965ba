//! # treadlink
//!
//! Client-side link layer for a real-time multiplayer tank game.
//!
//! A [`LinkClient`] owns at most one transport handle to the game server.
//! Outbound [`Packet`]s are framed by the
//! [`FrameCodec`](treadlink_protocol::FrameCodec) and written to the
//! handle; inbound frames are decoded and fanned out to the listeners
//! registered for their kind. Every handle carries a generation token, so
//! a forced reconnect can never be undone by the old handle closing late.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use treadlink::prelude::*;
//!
//! # async fn run() -> Result<(), LinkError> {
//! let link = LinkClient::new(LinkConfig::default());
//! let _points = link
//!     .register_listener(PacketKind::DebugPoint, |packet| {
//!         println!("{packet:?}");
//!     })
//!     .await?;
//! link.connect("ws://localhost:8080/ws", false).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod manager;
mod registry;
mod state;

pub use config::LinkConfig;
pub use error::LinkError;
pub use manager::{LinkClient, LinkClientBuilder};
pub use registry::{DispatchReport, Listener, ListenerHandle, ListenerRegistry};
pub use state::{LinkState, LinkStats, LinkStatus};

pub use treadlink_protocol as protocol;
pub use treadlink_transport as transport;

pub use treadlink_protocol::{Packet, PacketKind};

/// Everything needed to drive a link, in one import.
pub mod prelude {
    pub use crate::{
        LinkClient, LinkConfig, LinkError, LinkState, LinkStats, LinkStatus,
        ListenerHandle,
    };
    pub use treadlink_protocol::{
        BarrelYaw, DebugPoint, EntityId, EntityRecord, MapData, MoveFlags,
        Packet, PacketKind, UserCommand,
    };
}
