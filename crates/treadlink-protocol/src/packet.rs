//! The packet table: one typed value per packet kind, and the payload
//! layout each kind uses on the wire.
//!
//! All multi-byte integers and floats are big-endian. Fixed and counted
//! layouts are strict: a short payload is [`ProtocolError::Truncated`]
//! and a long one is [`ProtocolError::TrailingBytes`].

use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use serde::{Deserialize, Serialize};

use crate::map::MapData;
use crate::{
    BarrelYaw, DebugPoint, EntityId, EntityRecord, EntityStatus, MoveFlags,
    PacketKind, ProtocolError, UserCommand, Vec2,
};

/// Bytes in one encoded [`UserCommand`].
pub const USER_COMMAND_LEN: usize = 5;
/// Bytes in one encoded [`EntityRecord`].
pub const ENTITY_RECORD_LEN: usize = 23;
/// Bytes in one encoded [`DebugPoint`].
pub const DEBUG_POINT_LEN: usize = 5;
/// Largest record count a one-byte count prefix can announce.
pub const MAX_RECORDS: usize = u8::MAX as usize;

/// A decoded packet: the kind and its payload value in one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Packet {
    /// Type 0. No payload.
    Unknown,
    /// Type 1. `u16 id | u8 flags | u16 yaw`.
    UserCommand(UserCommand),
    /// Type 2. `u8 count | count × UserCommand`.
    UserCommandsBatch(Vec<UserCommand>),
    /// Type 3. UTF-8 map document.
    MapData(MapData),
    /// Type 4. ASCII lobby name, length = payload length.
    CreateLobby { name: String },
    /// Type 5. ASCII lobby id; empty when creation failed.
    CreateLobbyResult { lobby_id: String },
    /// Type 6. `u8 count | count × 23-byte entity record`.
    EntityList(Vec<EntityRecord>),
    /// Type 81. `u16 x | u16 y | u8 intensity`.
    DebugPoint(DebugPoint),
}

impl Packet {
    /// The kind this value belongs to.
    pub fn kind(&self) -> PacketKind {
        match self {
            Self::Unknown => PacketKind::Unknown,
            Self::UserCommand(_) => PacketKind::UserCommand,
            Self::UserCommandsBatch(_) => PacketKind::UserCommandsBatch,
            Self::MapData(_) => PacketKind::MapData,
            Self::CreateLobby { .. } => PacketKind::CreateLobby,
            Self::CreateLobbyResult { .. } => PacketKind::CreateLobbyResult,
            Self::EntityList(_) => PacketKind::EntityList,
            Self::DebugPoint(_) => PacketKind::DebugPoint,
        }
    }

    /// Encodes the payload (everything after the type byte).
    pub fn encode_payload(&self) -> Result<Vec<u8>, ProtocolError> {
        let kind = self.kind();
        let mut w = PayloadWriter::default();
        match self {
            Self::Unknown => {}
            Self::UserCommand(cmd) => w.user_command(cmd),
            Self::UserCommandsBatch(cmds) => {
                w.count(kind, cmds.len())?;
                for cmd in cmds {
                    w.user_command(cmd);
                }
            }
            Self::MapData(map) => w.bytes(map.json.as_bytes()),
            Self::CreateLobby { name } => w.ascii(kind, name)?,
            Self::CreateLobbyResult { lobby_id } => w.ascii(kind, lobby_id)?,
            Self::EntityList(records) => {
                w.count(kind, records.len())?;
                for record in records {
                    w.entity_record(record);
                }
            }
            Self::DebugPoint(point) => {
                w.u16(point.x);
                w.u16(point.y);
                w.u8(point.intensity);
            }
        }
        Ok(w.finish())
    }

    /// Decodes a payload of the given kind.
    pub fn decode_payload(
        kind: PacketKind,
        payload: &[u8],
    ) -> Result<Self, ProtocolError> {
        let mut r = PayloadReader::new(kind, payload);
        let packet = match kind {
            PacketKind::Unknown => {
                // Debug payloads ride on type 0 and are discarded.
                r.rest();
                Self::Unknown
            }
            PacketKind::UserCommand => {
                r.require(USER_COMMAND_LEN)?;
                Self::UserCommand(r.user_command()?)
            }
            PacketKind::UserCommandsBatch => {
                let count = r.count(USER_COMMAND_LEN)?;
                let mut cmds = Vec::with_capacity(count);
                for _ in 0..count {
                    cmds.push(r.user_command()?);
                }
                Self::UserCommandsBatch(cmds)
            }
            PacketKind::MapData => {
                let json = std::str::from_utf8(r.rest()).map_err(|e| {
                    ProtocolError::invalid(kind, format!("map is not UTF-8: {e}"))
                })?;
                Self::MapData(MapData::new(json))
            }
            PacketKind::CreateLobby => Self::CreateLobby {
                name: r.ascii()?,
            },
            PacketKind::CreateLobbyResult => Self::CreateLobbyResult {
                lobby_id: r.ascii()?,
            },
            PacketKind::EntityList => {
                let count = r.count(ENTITY_RECORD_LEN)?;
                let mut records = Vec::with_capacity(count);
                for _ in 0..count {
                    records.push(r.entity_record()?);
                }
                Self::EntityList(records)
            }
            PacketKind::DebugPoint => {
                r.require(DEBUG_POINT_LEN)?;
                Self::DebugPoint(DebugPoint {
                    x: r.u16()?,
                    y: r.u16()?,
                    intensity: r.u8()?,
                })
            }
        };
        r.finish()?;
        Ok(packet)
    }
}

// ---------------------------------------------------------------------------
// Payload reader / writer
// ---------------------------------------------------------------------------

/// Cursor over a payload that reports shortfalls in terms of the packet
/// kind being decoded.
struct PayloadReader<'a> {
    kind: PacketKind,
    rest: &'a [u8],
    total: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(kind: PacketKind, payload: &'a [u8]) -> Self {
        Self {
            kind,
            rest: payload,
            total: payload.len(),
        }
    }

    fn consumed(&self) -> usize {
        self.total - self.rest.len()
    }

    fn truncated(&self, wanted: usize) -> ProtocolError {
        ProtocolError::Truncated {
            kind: self.kind,
            needed: self.consumed() + wanted,
            available: self.total,
        }
    }

    /// Fails up front if fewer than `len` bytes remain.
    fn require(&self, len: usize) -> Result<(), ProtocolError> {
        if self.rest.len() < len {
            return Err(self.truncated(len));
        }
        Ok(())
    }

    /// Reads a count byte and checks the records it announces fit.
    fn count(&mut self, record_len: usize) -> Result<usize, ProtocolError> {
        let count = usize::from(self.u8()?);
        self.require(count * record_len)?;
        Ok(count)
    }

    fn u8(&mut self) -> Result<u8, ProtocolError> {
        self.require(1)?;
        self.rest.read_u8().map_err(|_| self.truncated(1))
    }

    fn u16(&mut self) -> Result<u16, ProtocolError> {
        self.require(2)?;
        self.rest
            .read_u16::<BigEndian>()
            .map_err(|_| self.truncated(2))
    }

    fn f64(&mut self) -> Result<f64, ProtocolError> {
        self.require(8)?;
        self.rest
            .read_f64::<BigEndian>()
            .map_err(|_| self.truncated(8))
    }

    fn rest(&mut self) -> &'a [u8] {
        std::mem::take(&mut self.rest)
    }

    fn ascii(&mut self) -> Result<String, ProtocolError> {
        let bytes = self.rest();
        if let Some(pos) = bytes.iter().position(|b| !b.is_ascii()) {
            return Err(ProtocolError::invalid(
                self.kind,
                format!("non-ASCII byte 0x{:02x} at {pos}", bytes[pos]),
            ));
        }
        Ok(bytes.iter().map(|&b| char::from(b)).collect())
    }

    fn user_command(&mut self) -> Result<UserCommand, ProtocolError> {
        Ok(UserCommand {
            entity: EntityId(self.u16()?),
            moves: MoveFlags::from_bits(self.u8()?),
            yaw: BarrelYaw::from_tenths(self.u16()?),
        })
    }

    fn entity_record(&mut self) -> Result<EntityRecord, ProtocolError> {
        let entity = EntityId(self.u16()?);
        let position = Vec2::new(self.f64()?, self.f64()?);
        let status = EntityStatus::from_bits(self.u8()?);
        let yaw = BarrelYaw::from_tenths(self.u16()?);
        let _reserved = self.u8()?;
        let (tank_type, team) = EntityRecord::split_trailer(self.u8()?);
        Ok(EntityRecord {
            entity,
            position,
            status,
            yaw,
            tank_type,
            team,
        })
    }

    fn finish(self) -> Result<(), ProtocolError> {
        if !self.rest.is_empty() {
            return Err(ProtocolError::TrailingBytes {
                kind: self.kind,
                extra: self.rest.len(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
struct PayloadWriter {
    buf: Vec<u8>,
}

impl PayloadWriter {
    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u16(&mut self, v: u16) {
        let mut tmp = [0; 2];
        BigEndian::write_u16(&mut tmp, v);
        self.buf.extend_from_slice(&tmp);
    }

    fn f64(&mut self, v: f64) {
        let mut tmp = [0; 8];
        BigEndian::write_f64(&mut tmp, v);
        self.buf.extend_from_slice(&tmp);
    }

    fn bytes(&mut self, v: &[u8]) {
        self.buf.extend_from_slice(v);
    }

    fn count(
        &mut self,
        kind: PacketKind,
        len: usize,
    ) -> Result<(), ProtocolError> {
        let count = u8::try_from(len).map_err(|_| {
            ProtocolError::invalid(
                kind,
                format!("{len} records exceed the limit of {MAX_RECORDS}"),
            )
        })?;
        self.u8(count);
        Ok(())
    }

    fn ascii(&mut self, kind: PacketKind, text: &str) -> Result<(), ProtocolError> {
        if !text.is_ascii() {
            return Err(ProtocolError::invalid(kind, "text must be ASCII"));
        }
        self.bytes(text.as_bytes());
        Ok(())
    }

    fn user_command(&mut self, cmd: &UserCommand) {
        self.u16(cmd.entity.0);
        self.u8(cmd.moves.bits());
        self.u16(cmd.yaw.tenths());
    }

    fn entity_record(&mut self, record: &EntityRecord) {
        self.u16(record.entity.0);
        self.f64(record.position.x);
        self.f64(record.position.y);
        self.u8(record.status.bits());
        self.u16(record.yaw.tenths());
        self.u8(0); // padding to 23 bytes, ignored on decode
        self.u8(record.trailer());
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TankType, Team};

    fn record(id: u16, trailer: u8) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(ENTITY_RECORD_LEN);
        bytes.extend_from_slice(&id.to_be_bytes());
        bytes.extend_from_slice(&12.5_f64.to_be_bytes());
        bytes.extend_from_slice(&(-3.0_f64).to_be_bytes());
        bytes.push(0b01); // alive
        bytes.extend_from_slice(&900_u16.to_be_bytes());
        bytes.push(0);
        bytes.push(trailer);
        bytes
    }

    #[test]
    fn test_record_helper_matches_layout_size() {
        assert_eq!(record(1, 0).len(), ENTITY_RECORD_LEN);
    }

    #[test]
    fn test_entity_list_two_records() {
        let mut payload = vec![2];
        payload.extend(record(7, 0x11));
        payload.extend(record(8, 0x03));

        let packet =
            Packet::decode_payload(PacketKind::EntityList, &payload).unwrap();
        let Packet::EntityList(records) = packet else {
            panic!("expected EntityList, got {packet:?}");
        };
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].entity, EntityId(7));
        assert_eq!(records[0].tank_type, TankType::Fast);
        assert_eq!(records[0].team, Team::new(2).unwrap());
        assert_eq!(records[0].position, Vec2::new(12.5, -3.0));
        assert!(records[0].status.alive);
        assert_eq!(records[0].yaw.tenths(), 900);

        assert_eq!(records[1].tank_type, TankType::Bounce);
        assert_eq!(records[1].team, Team::new(1).unwrap());
    }

    #[test]
    fn test_entity_record_padding_written_zero_and_ignored() {
        let mut payload = vec![1];
        payload.extend(record(4, 0x22));
        payload[1 + 21] = 0xAB;

        let packet =
            Packet::decode_payload(PacketKind::EntityList, &payload).unwrap();
        let bytes = packet.encode_payload().unwrap();
        assert_eq!(bytes.len(), 1 + ENTITY_RECORD_LEN);
        assert_eq!(bytes[1 + 21], 0);
        assert_eq!(&bytes[..1 + 21], &payload[..1 + 21]);
        assert_eq!(bytes[1 + 22], 0x22);
    }

    #[test]
    fn test_entity_list_short_record_is_truncated() {
        let mut payload = vec![2];
        payload.extend(record(7, 0x11));
        payload.extend(&record(8, 0x11)[..10]);

        let err = Packet::decode_payload(PacketKind::EntityList, &payload)
            .unwrap_err();
        assert_eq!(
            err,
            ProtocolError::Truncated {
                kind: PacketKind::EntityList,
                needed: 1 + 2 * ENTITY_RECORD_LEN,
                available: 1 + ENTITY_RECORD_LEN + 10,
            }
        );
    }

    #[test]
    fn test_empty_payload_for_counted_kind_is_truncated() {
        let err = Packet::decode_payload(PacketKind::UserCommandsBatch, &[])
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Truncated { needed: 1, .. }));
    }

    #[test]
    fn test_user_command_layout() {
        let cmd = UserCommand {
            entity: EntityId(0x0102),
            moves: MoveFlags::from_bits(0b10_0001),
            yaw: BarrelYaw::from_degrees(90.0),
        };
        let bytes = Packet::UserCommand(cmd).encode_payload().unwrap();
        assert_eq!(bytes, vec![0x01, 0x02, 0b10_0001, 0x03, 0x84]);
    }

    #[test]
    fn test_user_command_trailing_bytes_rejected() {
        let err = Packet::decode_payload(
            PacketKind::UserCommand,
            &[0, 1, 0, 0, 0, 9],
        )
        .unwrap_err();
        assert_eq!(
            err,
            ProtocolError::TrailingBytes {
                kind: PacketKind::UserCommand,
                extra: 1,
            }
        );
    }

    #[test]
    fn test_batch_layout_matches_count_prefix() {
        let cmds = vec![
            UserCommand {
                entity: EntityId(1),
                moves: MoveFlags::default(),
                yaw: BarrelYaw::from_tenths(0),
            },
            UserCommand {
                entity: EntityId(2),
                moves: MoveFlags::from_bits(MoveFlags::FIRE),
                yaw: BarrelYaw::from_tenths(3599),
            },
        ];
        let bytes =
            Packet::UserCommandsBatch(cmds.clone()).encode_payload().unwrap();
        assert_eq!(bytes.len(), 1 + 2 * USER_COMMAND_LEN);
        assert_eq!(bytes[0], 2);
        assert_eq!(&bytes[6..11], &[0, 2, 0x10, 0x0e, 0x0f]);

        let decoded =
            Packet::decode_payload(PacketKind::UserCommandsBatch, &bytes)
                .unwrap();
        assert_eq!(decoded, Packet::UserCommandsBatch(cmds));
    }

    #[test]
    fn test_batch_over_255_records_rejected_on_encode() {
        let cmd = UserCommand {
            entity: EntityId(1),
            moves: MoveFlags::default(),
            yaw: BarrelYaw::default(),
        };
        let err = Packet::UserCommandsBatch(vec![cmd; 256])
            .encode_payload()
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidValue { .. }));
    }

    #[test]
    fn test_create_lobby_is_raw_ascii() {
        let bytes = Packet::CreateLobby {
            name: "tanks".into(),
        }
        .encode_payload()
        .unwrap();
        assert_eq!(bytes, b"tanks");
    }

    #[test]
    fn test_create_lobby_rejects_non_ascii_both_ways() {
        let err = Packet::CreateLobby {
            name: "pañuelo".into(),
        }
        .encode_payload()
        .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidValue { .. }));

        let err =
            Packet::decode_payload(PacketKind::CreateLobby, &[b'a', 0xc3])
                .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidValue { .. }));
    }

    #[test]
    fn test_empty_lobby_result_decodes_to_empty_id() {
        let packet =
            Packet::decode_payload(PacketKind::CreateLobbyResult, &[]).unwrap();
        assert_eq!(
            packet,
            Packet::CreateLobbyResult {
                lobby_id: String::new()
            }
        );
    }

    #[test]
    fn test_map_data_must_be_utf8() {
        let ok = Packet::decode_payload(PacketKind::MapData, b"{}").unwrap();
        assert_eq!(ok, Packet::MapData(MapData::new("{}")));

        let err = Packet::decode_payload(PacketKind::MapData, &[0xff, 0xfe])
            .unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidValue { .. }));
    }

    #[test]
    fn test_unknown_encodes_empty_and_ignores_payload() {
        assert!(Packet::Unknown.encode_payload().unwrap().is_empty());
        assert_eq!(
            Packet::decode_payload(PacketKind::Unknown, &[]).unwrap(),
            Packet::Unknown
        );
        assert_eq!(
            Packet::decode_payload(PacketKind::Unknown, &[1, 2, 3]).unwrap(),
            Packet::Unknown
        );
    }

    #[test]
    fn test_debug_point_layout() {
        let point = DebugPoint {
            x: 300,
            y: 2,
            intensity: 0x80,
        };
        let bytes = Packet::DebugPoint(point).encode_payload().unwrap();
        assert_eq!(bytes, vec![0x01, 0x2c, 0x00, 0x02, 0x80]);
    }

    #[test]
    fn test_packet_json_shape_is_adjacently_tagged() {
        let json = serde_json::to_value(Packet::DebugPoint(DebugPoint {
            x: 1,
            y: 2,
            intensity: 3,
        }))
        .unwrap();
        assert_eq!(json["type"], "DebugPoint");
        assert_eq!(json["data"]["intensity"], 3);
    }
}
