//! Error types for the protocol layer.
//!
//! Every failure the codec can report is a value here; none of them are
//! fatal. Inbound decode failures are logged and the frame is dropped by
//! the caller, outbound encode failures go back to whoever tried to send.

use crate::{PacketKind, Role};

/// Errors that can occur while framing, encoding or decoding packets.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    /// A frame with no bytes at all, not even a type header.
    #[error("empty frame")]
    EmptyFrame,

    /// The type byte has no entry in the packet table.
    #[error("unknown packet type {0}")]
    UnknownPacketType(u8),

    /// This endpoint never sends packets of this kind.
    #[error("{kind} cannot be sent by the {role}")]
    UnsendableType { kind: PacketKind, role: Role },

    /// This endpoint never receives packets of this kind.
    #[error("{kind} is not accepted by the {role}")]
    UnreceivableType { kind: PacketKind, role: Role },

    /// The payload ended before the layout was complete.
    #[error("{kind} payload truncated: need {needed} bytes, have {available}")]
    Truncated {
        kind: PacketKind,
        needed: usize,
        available: usize,
    },

    /// The layout was complete but bytes were left over.
    #[error("{kind} payload has {extra} trailing bytes")]
    TrailingBytes { kind: PacketKind, extra: usize },

    /// A field holds a value its type does not allow (non-ASCII text,
    /// too many records for a count byte, and so on).
    #[error("invalid {kind} payload: {reason}")]
    InvalidValue { kind: PacketKind, reason: String },
}

impl ProtocolError {
    pub(crate) fn invalid(kind: PacketKind, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            kind,
            reason: reason.into(),
        }
    }
}
