//! Wire protocol for treadlink.
//!
//! This crate defines the bytes that game clients and the server agree on:
//!
//! - **Codec table** ([`PacketKind`], [`Packet`]): every registered packet
//!   type and the payload layout it uses.
//! - **Frame codec** ([`FrameCodec`]): the one-byte type header, and which
//!   end of the link may send or receive each kind.
//! - **Values** ([`UserCommand`], [`EntityRecord`], [`BarrelYaw`], ...):
//!   the decoded contents of payloads.
//! - **Maps** ([`MapData`], [`MapDocument`]): the map document format.
//!
//! It knows nothing about connections. Decode failures are values of
//! [`ProtocolError`]; what to do with them is up to the caller.
//!
//! ```text
//! Transport (message) → FrameCodec (Packet) → listeners
//! ```

mod codec;
mod error;
pub mod map;
mod packet;
mod types;

pub use codec::FrameCodec;
pub use error::ProtocolError;
pub use map::{MapData, MapDocument, MapError};
pub use packet::{
    DEBUG_POINT_LEN, ENTITY_RECORD_LEN, MAX_RECORDS, Packet, USER_COMMAND_LEN,
};
pub use types::{
    BarrelYaw, DebugPoint, Direction, EntityId, EntityRecord, EntityStatus,
    MoveFlags, PacketKind, Role, TankType, Team, UserCommand, Vec2,
};
