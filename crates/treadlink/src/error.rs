//! Unified error type for the link manager.

use treadlink_protocol::ProtocolError;
use treadlink_transport::TransportError;

/// Top-level error returned by [`LinkClient`](crate::LinkClient).
///
/// Transport and protocol errors convert in through `#[from]`, so `?`
/// works across crate boundaries.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// `connect` without `force` while a handle is connecting or live.
    #[error("already connected to {0}")]
    AlreadyConnected(String),

    /// A pending connect was abandoned by a forced reconnect or a
    /// disconnect before its handle opened.
    #[error("connect superseded by a newer request")]
    Superseded,

    /// Offline mode is on; no connection will be opened.
    #[error("offline mode is enabled")]
    Offline,

    /// The manager task has stopped.
    #[error("link manager is closed")]
    ManagerClosed,

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
