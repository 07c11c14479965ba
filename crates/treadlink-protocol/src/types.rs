//! Wire value types: packet identifiers and the small fixed-point and
//! bit-packed values that packet payloads are built from.
//!
//! Everything here is a plain value. The byte layouts that carry these
//! values live in [`crate::packet`].

use std::f64::consts::PI;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Role and Direction
// ---------------------------------------------------------------------------

/// Which end of the link a codec is working for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// The game client.
    Client,
    /// The authoritative game server.
    Server,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => write!(f, "client"),
            Self::Server => write!(f, "server"),
        }
    }
}

/// Which way a packet kind is allowed to travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Sent by clients, decoded by the server.
    ClientToServer,
    /// Sent by the server, decoded by clients.
    ServerToClient,
    /// Either side may send and decode.
    Bidirectional,
}

impl Direction {
    /// Returns `true` if `role` may put this kind on the wire.
    pub fn sendable_by(self, role: Role) -> bool {
        match self {
            Self::ClientToServer => role == Role::Client,
            Self::ServerToClient => role == Role::Server,
            Self::Bidirectional => true,
        }
    }

    /// Returns `true` if `role` may decode this kind off the wire.
    pub fn receivable_by(self, role: Role) -> bool {
        match self {
            Self::ClientToServer => role == Role::Server,
            Self::ServerToClient => role == Role::Client,
            Self::Bidirectional => true,
        }
    }
}

// ---------------------------------------------------------------------------
// PacketKind: the codec table index
// ---------------------------------------------------------------------------

/// The 8-bit packet type carried in byte 0 of every frame.
///
/// Every registered type appears here exactly once. Adding a variant
/// forces every `match` over kinds (id mapping, direction, payload
/// codecs) to be updated before the crate compiles again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketKind {
    /// Empty placeholder type; both directions are no-ops.
    Unknown,
    /// A single player's input for this tick.
    UserCommand,
    /// Inputs of every player, relayed by the server.
    UserCommandsBatch,
    /// The current map document.
    MapData,
    /// Request to create a lobby with a given name.
    CreateLobby,
    /// The id of the lobby that was created.
    CreateLobbyResult,
    /// Snapshot of every tank in the world.
    EntityList,
    /// A single drawn point, used while developing netcode.
    DebugPoint,
}

impl PacketKind {
    /// Every registered kind, in wire-id order.
    pub const ALL: [PacketKind; 8] = [
        Self::Unknown,
        Self::UserCommand,
        Self::UserCommandsBatch,
        Self::MapData,
        Self::CreateLobby,
        Self::CreateLobbyResult,
        Self::EntityList,
        Self::DebugPoint,
    ];

    /// Looks up the kind registered under a wire id.
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::Unknown),
            1 => Some(Self::UserCommand),
            2 => Some(Self::UserCommandsBatch),
            3 => Some(Self::MapData),
            4 => Some(Self::CreateLobby),
            5 => Some(Self::CreateLobbyResult),
            6 => Some(Self::EntityList),
            81 => Some(Self::DebugPoint),
            _ => None,
        }
    }

    /// The wire id written as the frame header.
    pub fn id(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::UserCommand => 1,
            Self::UserCommandsBatch => 2,
            Self::MapData => 3,
            Self::CreateLobby => 4,
            Self::CreateLobbyResult => 5,
            Self::EntityList => 6,
            Self::DebugPoint => 81,
        }
    }

    /// The direction this kind travels in.
    pub fn direction(self) -> Direction {
        match self {
            Self::Unknown | Self::DebugPoint => Direction::Bidirectional,
            Self::UserCommand | Self::CreateLobby => {
                Direction::ClientToServer
            }
            Self::UserCommandsBatch
            | Self::MapData
            | Self::CreateLobbyResult
            | Self::EntityList => Direction::ServerToClient,
        }
    }

    /// Human-readable name, used in logs and error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::UserCommand => "UserCommand",
            Self::UserCommandsBatch => "UserCommandsBatch",
            Self::MapData => "MapData",
            Self::CreateLobby => "CreateLobby",
            Self::CreateLobbyResult => "CreateLobbyResult",
            Self::EntityList => "EntityList",
            Self::DebugPoint => "DebugPoint",
        }
    }
}

impl TryFrom<u8> for PacketKind {
    type Error = ProtocolError;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Self::from_id(id).ok_or(ProtocolError::UnknownPacketType(id))
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.id())
    }
}

// ---------------------------------------------------------------------------
// Identity and geometry
// ---------------------------------------------------------------------------

/// Server-assigned entity id.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct EntityId(pub u16);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E-{}", self.0)
    }
}

/// A world-space position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

// ---------------------------------------------------------------------------
// Bit flags
// ---------------------------------------------------------------------------

/// Movement and fire inputs, one bit each on the wire.
///
/// Bit `n` is set iff `(byte & (1 << n)) != 0`: 0 forward, 1 backward,
/// 2 left, 3 right, 4 fire, 5 altfire. Bits 6 and 7 are ignored.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub struct MoveFlags {
    pub forward: bool,
    pub backward: bool,
    pub left: bool,
    pub right: bool,
    pub fire: bool,
    pub altfire: bool,
}

impl MoveFlags {
    pub const FORWARD: u8 = 1 << 0;
    pub const BACKWARD: u8 = 1 << 1;
    pub const LEFT: u8 = 1 << 2;
    pub const RIGHT: u8 = 1 << 3;
    pub const FIRE: u8 = 1 << 4;
    pub const ALTFIRE: u8 = 1 << 5;

    /// Unpacks a wire byte.
    pub fn from_bits(bits: u8) -> Self {
        Self {
            forward: bits & Self::FORWARD != 0,
            backward: bits & Self::BACKWARD != 0,
            left: bits & Self::LEFT != 0,
            right: bits & Self::RIGHT != 0,
            fire: bits & Self::FIRE != 0,
            altfire: bits & Self::ALTFIRE != 0,
        }
    }

    /// Packs into a wire byte.
    pub fn bits(self) -> u8 {
        let mut bits = 0;
        if self.forward {
            bits |= Self::FORWARD;
        }
        if self.backward {
            bits |= Self::BACKWARD;
        }
        if self.left {
            bits |= Self::LEFT;
        }
        if self.right {
            bits |= Self::RIGHT;
        }
        if self.fire {
            bits |= Self::FIRE;
        }
        if self.altfire {
            bits |= Self::ALTFIRE;
        }
        bits
    }
}

/// Entity status bits: 0 alive, 1 invincible.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub struct EntityStatus {
    pub alive: bool,
    pub invincible: bool,
}

impl EntityStatus {
    pub const ALIVE: u8 = 1 << 0;
    pub const INVINCIBLE: u8 = 1 << 1;

    pub fn from_bits(bits: u8) -> Self {
        Self {
            alive: bits & Self::ALIVE != 0,
            invincible: bits & Self::INVINCIBLE != 0,
        }
    }

    pub fn bits(self) -> u8 {
        let mut bits = 0;
        if self.alive {
            bits |= Self::ALIVE;
        }
        if self.invincible {
            bits |= Self::INVINCIBLE;
        }
        bits
    }
}

// ---------------------------------------------------------------------------
// BarrelYaw: fixed-point angle
// ---------------------------------------------------------------------------

/// Turret angle in tenths of a degree, as carried on the wire.
///
/// The wire value is unsigned, so angles are normalised into `[0, 360)`
/// degrees when constructed from floating point. Precision is 0.1°.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct BarrelYaw(u16);

impl BarrelYaw {
    /// Tenths of a degree in a full turn.
    pub const FULL_TURN: u16 = 3600;

    /// Wraps a raw wire value as-is.
    pub const fn from_tenths(tenths: u16) -> Self {
        Self(tenths)
    }

    /// Converts degrees, normalising into `[0, 360)` first.
    pub fn from_degrees(degrees: f64) -> Self {
        let tenths = (degrees.rem_euclid(360.0) * 10.0).round() as u32;
        // 359.96 rounds up to a full turn.
        Self((tenths % u32::from(Self::FULL_TURN)) as u16)
    }

    /// Converts radians: `round(degrees(radians) * 10)`, normalised.
    pub fn from_radians(radians: f64) -> Self {
        Self::from_degrees(radians.to_degrees())
    }

    /// The raw wire value.
    pub const fn tenths(self) -> u16 {
        self.0
    }

    pub fn to_degrees(self) -> f64 {
        f64::from(self.0) / 10.0
    }

    /// `(raw / 10) * (π / 180)`.
    pub fn to_radians(self) -> f64 {
        (f64::from(self.0) / 10.0) * (PI / 180.0)
    }
}

// ---------------------------------------------------------------------------
// Tank type and team
// ---------------------------------------------------------------------------

/// Tank archetype, selected by the low 3 bits of an entity trailer byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TankType {
    Common,
    Fast,
    Rocket,
    Bounce,
    PhFive,
    PhSix,
    PhSeven,
    PhEight,
}

impl TankType {
    /// The fixed 8-entry lexicon, indexed by wire value.
    pub const LEXICON: [TankType; 8] = [
        Self::Common,
        Self::Fast,
        Self::Rocket,
        Self::Bounce,
        Self::PhFive,
        Self::PhSix,
        Self::PhSeven,
        Self::PhEight,
    ];

    /// Looks up a type by its low-3-bit index. Higher bits are masked off.
    pub fn from_index(index: u8) -> Self {
        Self::LEXICON[usize::from(index & 0b111)]
    }

    pub fn index(self) -> u8 {
        match self {
            Self::Common => 0,
            Self::Fast => 1,
            Self::Rocket => 2,
            Self::Bounce => 3,
            Self::PhFive => 4,
            Self::PhSix => 5,
            Self::PhSeven => 6,
            Self::PhEight => 7,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Fast => "fast",
            Self::Rocket => "rocket",
            Self::Bounce => "bounce",
            Self::PhFive => "ph_five",
            Self::PhSix => "ph_six",
            Self::PhSeven => "ph_seven",
            Self::PhEight => "ph_eight",
        }
    }
}

impl fmt::Display for TankType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A 1-indexed team number in `1..=16`.
///
/// The wire carries `team - 1` in the high nibble of the trailer byte.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub struct Team(u8);

impl Team {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 16;

    /// Returns `None` outside `1..=16`.
    pub fn new(team: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&team).then_some(Self(team))
    }

    /// Decodes the high nibble of a trailer byte.
    pub fn from_nibble(nibble: u8) -> Self {
        Self((nibble & 0x0f) + 1)
    }

    pub fn nibble(self) -> u8 {
        self.0 - 1
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Team {
    type Error = String;

    fn try_from(team: u8) -> Result<Self, Self::Error> {
        Self::new(team).ok_or_else(|| format!("team {team} outside 1..=16"))
    }
}

impl From<Team> for u8 {
    fn from(team: Team) -> u8 {
        team.0
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "team {}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Payload records
// ---------------------------------------------------------------------------

/// One player's input for a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCommand {
    pub entity: EntityId,
    pub moves: MoveFlags,
    pub yaw: BarrelYaw,
}

/// One tank in an [`EntityList`](crate::Packet::EntityList) snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity: EntityId,
    pub position: Vec2,
    pub status: EntityStatus,
    pub yaw: BarrelYaw,
    pub tank_type: TankType,
    pub team: Team,
}

impl EntityRecord {
    /// Packs type and team into the record's trailer byte.
    pub fn trailer(&self) -> u8 {
        (self.team.nibble() << 4) | self.tank_type.index()
    }

    /// Unpacks a trailer byte. Bit 3 is unused and ignored.
    pub fn split_trailer(byte: u8) -> (TankType, Team) {
        (TankType::from_index(byte), Team::from_nibble(byte >> 4))
    }
}

/// A single gray point on the shared debug canvas.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
pub struct DebugPoint {
    pub x: u16,
    pub y: u16,
    pub intensity: u8,
}
