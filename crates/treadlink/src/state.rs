//! Observable link state and counters.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;
use treadlink_transport::HandleId;

/// Lifecycle of the link.
///
/// ```text
/// Disconnected ──connect──→ Connecting ──open──→ Connected
///      ↑                        │                    │
///      └──── fail / disconnect ─┴── close / force ───┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Snapshot published by the manager on every transition.
///
/// `generation`, `remote_addr` and `connected_at` describe the most
/// recent handle and are kept after it disconnects.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkStatus {
    pub state: LinkState,
    pub generation: Option<HandleId>,
    pub remote_addr: Option<String>,
    pub connected_at: Option<Instant>,
    pub offline: bool,
}

impl LinkStatus {
    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }
}

/// Counter snapshot returned by [`LinkClient::stats`](crate::LinkClient::stats).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LinkStats {
    /// Inbound frames that decoded and were dispatched.
    pub frames_received: u64,
    /// Inbound frames that failed to decode or came from a stale handle.
    pub frames_dropped: u64,
    /// Frames written to the transport.
    pub frames_sent: u64,
    /// Sends skipped because the link was not connected or offline.
    pub sends_suppressed: u64,
    /// Listener invocations that panicked.
    pub listener_panics: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub frames_received: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub frames_sent: AtomicU64,
    pub sends_suppressed: AtomicU64,
    pub listener_panics: AtomicU64,
}

impl Counters {
    pub fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LinkStats {
        LinkStats {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            sends_suppressed: self.sends_suppressed.load(Ordering::Relaxed),
            listener_panics: self.listener_panics.load(Ordering::Relaxed),
        }
    }
}
