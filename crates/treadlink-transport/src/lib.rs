//! Transport abstraction layer for treadlink.
//!
//! Provides the [`Connection`], [`Connector`] and [`Transport`] traits that
//! abstract over the message-oriented link the packet protocol rides on.
//! The transport guarantees ordered, reliable, message-framed delivery;
//! everything above it treats one message as one frame.
//!
//! # Feature Flags
//!
//! - `websocket` (default): WebSocket dialer and listener via
//!   `tokio-tungstenite`

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    ClientConnection, ServerConnection, WebSocketConnection,
    WebSocketConnector, WebSocketTransport,
};

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counter backing [`HandleId::next`].
static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Generation token identifying one transport handle.
///
/// Every handle ever created in the process gets a distinct id, so an
/// event tagged with an old id can always be told apart from events of
/// the handle that replaced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl HandleId {
    /// Creates a `HandleId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates the next process-wide unique id.
    pub fn next() -> Self {
        Self(NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// A single live link that can send and receive whole messages.
///
/// `send` and `recv` may be called concurrently from different tasks:
/// one task typically sits in `recv` for the lifetime of the handle while
/// others write.
pub trait Connection: Send + Sync + 'static {
    /// Sends one message to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Starts closing the connection. A reader blocked in
    /// [`recv`](Self::recv) observes the close afterwards.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the generation token of this handle.
    fn id(&self) -> HandleId;
}

/// Opens outbound connections (the client side of a link).
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced by this connector.
    type Connection: Connection;

    /// Dials `addr` and resolves once the link is open.
    ///
    /// The new handle must report `id` from [`Connection::id`].
    fn connect(
        &self,
        addr: &str,
        id: HandleId,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// Accepts new incoming connections (the server side of a link).
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;

    /// Waits for and accepts the next incoming connection.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}
