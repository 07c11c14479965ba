//! The relay server: every `DebugPoint` received from any peer is sent to
//! all connected peers, the sender included.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use treadlink_protocol::{FrameCodec, Packet};
use treadlink_transport::{
    Connection, HandleId, ServerConnection, Transport, TransportError,
    WebSocketTransport,
};

/// Frames queued per peer before further points to it are dropped.
const PEER_QUEUE: usize = 64;

#[derive(Default)]
struct Peers {
    queues: Mutex<HashMap<HandleId, mpsc::Sender<Vec<u8>>>>,
}

impl Peers {
    async fn insert(&self, id: HandleId, queue: mpsc::Sender<Vec<u8>>) -> usize {
        let mut queues = self.queues.lock().await;
        queues.insert(id, queue);
        queues.len()
    }

    async fn remove(&self, id: HandleId) -> usize {
        let mut queues = self.queues.lock().await;
        queues.remove(&id);
        queues.len()
    }

    /// Queues `frame` for every peer without waiting on any socket. A peer
    /// whose queue is full misses this frame.
    async fn broadcast(&self, frame: &[u8]) {
        let queues = self.queues.lock().await;
        for (id, queue) in queues.iter() {
            if let Err(e) = queue.try_send(frame.to_vec()) {
                tracing::debug!(peer = %id, error = %e, "peer lagging, point dropped");
            }
        }
    }
}

pub struct PointRelay {
    transport: WebSocketTransport,
    peers: Arc<Peers>,
}

impl PointRelay {
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        Ok(Self {
            transport: WebSocketTransport::bind(addr).await?,
            peers: Arc::default(),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// Accepts peers until the process is terminated.
    pub async fn run(mut self) -> Result<(), TransportError> {
        tracing::info!("point relay running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let conn = Arc::new(conn);
                    let peers = Arc::clone(&self.peers);
                    let (queue, outgoing) = mpsc::channel(PEER_QUEUE);
                    let count = peers.insert(conn.id(), queue).await;
                    tracing::info!(peer = %conn.id(), addr = conn.peer(), count, "peer joined");
                    tokio::spawn(write_peer(Arc::clone(&conn), outgoing));
                    tokio::spawn(serve_peer(conn, peers));
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

async fn serve_peer(conn: Arc<ServerConnection>, peers: Arc<Peers>) {
    let id = conn.id();
    let codec = FrameCodec::server();

    loop {
        let frame = match conn.recv().await {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(peer = %id, error = %e, "read failed");
                break;
            }
        };

        match codec.decode_frame(&frame) {
            Ok(Packet::DebugPoint(point)) => {
                tracing::info!(
                    peer = %id,
                    x = point.x,
                    y = point.y,
                    intensity = point.intensity,
                    "received point"
                );
                match codec.encode_frame(&Packet::DebugPoint(point)) {
                    Ok(out) => peers.broadcast(&out).await,
                    Err(e) => tracing::warn!(error = %e, "cannot re-encode point"),
                }
            }
            Ok(other) => {
                tracing::debug!(peer = %id, kind = %other.kind(), "ignoring packet");
            }
            Err(e) => {
                tracing::warn!(peer = %id, len = frame.len(), error = %e, "dropping frame");
            }
        }
    }

    let count = peers.remove(id).await;
    tracing::info!(peer = %id, count, "peer left");
}

/// Drains one peer's queue onto its socket. Ends when the peer is removed
/// and its queue sender dropped.
async fn write_peer(
    conn: Arc<ServerConnection>,
    mut outgoing: mpsc::Receiver<Vec<u8>>,
) {
    while let Some(frame) = outgoing.recv().await {
        if let Err(e) = conn.send(&frame).await {
            tracing::debug!(peer = %conn.id(), error = %e, "write failed");
            break;
        }
    }
}
