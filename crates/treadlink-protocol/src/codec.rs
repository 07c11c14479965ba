//! Frame codec: the one-byte type header around a packet payload.
//!
//! ```text
//! byte 0      bytes 1..N
//! +--------+-------------------------+
//! |  type  |  payload (per-type)     |
//! +--------+-------------------------+
//! ```
//!
//! There is no length prefix. The transport delivers whole messages, so
//! the payload is simply everything after the header.

use crate::{Packet, PacketKind, ProtocolError, Role};

/// Encodes and decodes whole frames for one end of the link.
///
/// The role decides which kinds may be sent and which may be received.
/// A client codec refuses to encode an [`EntityList`](Packet::EntityList)
/// and refuses to decode a [`UserCommand`](Packet::UserCommand); the
/// server codec is the mirror image.
///
/// ## Example
///
/// ```rust
/// use treadlink_protocol::{DebugPoint, FrameCodec, Packet};
///
/// let client = FrameCodec::client();
/// let server = FrameCodec::server();
///
/// let point = Packet::DebugPoint(DebugPoint { x: 10, y: 20, intensity: 255 });
/// let frame = client.encode_frame(&point).unwrap();
/// assert_eq!(frame[0], 81);
/// assert_eq!(server.decode_frame(&frame).unwrap(), point);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    role: Role,
}

impl FrameCodec {
    pub const fn new(role: Role) -> Self {
        Self { role }
    }

    pub const fn client() -> Self {
        Self::new(Role::Client)
    }

    pub const fn server() -> Self {
        Self::new(Role::Server)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    /// Splits a frame into its header and payload and decodes the payload.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::EmptyFrame`] for a zero-length frame.
    /// - [`ProtocolError::UnknownPacketType`] for an unregistered header.
    /// - [`ProtocolError::UnreceivableType`] for a kind this role never
    ///   receives.
    /// - Any payload error from [`Packet::decode_payload`].
    pub fn decode_frame(&self, raw: &[u8]) -> Result<Packet, ProtocolError> {
        let (&type_id, payload) =
            raw.split_first().ok_or(ProtocolError::EmptyFrame)?;
        let kind = PacketKind::try_from(type_id)?;
        if !kind.direction().receivable_by(self.role) {
            return Err(ProtocolError::UnreceivableType {
                kind,
                role: self.role,
            });
        }
        Packet::decode_payload(kind, payload)
    }

    /// Encodes a packet as `[type] ++ payload`.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::UnsendableType`] if this role never sends the
    /// packet's kind, or a payload error such as
    /// [`ProtocolError::InvalidValue`].
    pub fn encode_frame(&self, packet: &Packet) -> Result<Vec<u8>, ProtocolError> {
        let kind = packet.kind();
        self.check_sendable(kind)?;
        let payload = packet.encode_payload()?;
        Ok(frame(kind.id(), &payload))
    }

    /// Frames an already-encoded payload under a raw type id.
    ///
    /// The payload is validated by decoding it, so a frame built here is
    /// always one the peer can parse.
    pub fn encode_raw(
        &self,
        type_id: u8,
        payload: &[u8],
    ) -> Result<Vec<u8>, ProtocolError> {
        let kind = PacketKind::try_from(type_id)?;
        self.check_sendable(kind)?;
        Packet::decode_payload(kind, payload)?;
        Ok(frame(type_id, payload))
    }

    fn check_sendable(&self, kind: PacketKind) -> Result<(), ProtocolError> {
        if !kind.direction().sendable_by(self.role) {
            return Err(ProtocolError::UnsendableType {
                kind,
                role: self.role,
            });
        }
        Ok(())
    }
}

fn frame(type_id: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + payload.len());
    out.push(type_id);
    out.extend_from_slice(payload);
    out
}
