//! Shared helpers: an in-memory connector whose dials and remote ends are
//! driven step by step from the test body.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, Notify, mpsc, oneshot};
use treadlink::{LinkClient, LinkClientBuilder};
use treadlink_protocol::{DebugPoint, FrameCodec, Packet};
use treadlink_transport::{Connection, Connector, HandleId, TransportError};

pub const WAIT: Duration = Duration::from_secs(2);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn point(x: u16) -> Packet {
    Packet::DebugPoint(DebugPoint {
        x,
        y: x,
        intensity: 128,
    })
}

/// Receives from `rx`, failing the test after [`WAIT`].
pub async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for message")
        .expect("channel closed")
}

// ---------------------------------------------------------------------------
// Mock transport
// ---------------------------------------------------------------------------

enum Inbound {
    Frame(Vec<u8>),
    HangUp,
    Fail(String),
}

#[derive(Default)]
struct CloseSignal {
    closed: AtomicBool,
    notify: Notify,
}

pub struct MockConnection {
    id: HandleId,
    inbound: Mutex<mpsc::UnboundedReceiver<Inbound>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    close: Arc<CloseSignal>,
}

impl Connection for MockConnection {
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        self.outbound
            .send(data.to_vec())
            .map_err(|_| TransportError::ConnectionClosed("remote dropped".into()))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        match self.inbound.lock().await.recv().await {
            Some(Inbound::Frame(data)) => Ok(Some(data)),
            Some(Inbound::HangUp) | None => Ok(None),
            Some(Inbound::Fail(reason)) => {
                Err(TransportError::ConnectionClosed(reason))
            }
        }
    }

    /// Records the close but keeps `recv` open until the remote hangs up,
    /// like a socket whose close handshake is still in flight.
    async fn close(&self) -> Result<(), TransportError> {
        self.close.closed.store(true, Ordering::SeqCst);
        self.close.notify.notify_waiters();
        Ok(())
    }

    fn id(&self) -> HandleId {
        self.id
    }
}

/// The far end of a [`MockConnection`].
pub struct MockRemote {
    pub id: HandleId,
    pub addr: String,
    inbound: mpsc::UnboundedSender<Inbound>,
    outbound: mpsc::UnboundedReceiver<Vec<u8>>,
    close: Arc<CloseSignal>,
}

impl MockRemote {
    pub fn push(&self, frame: impl Into<Vec<u8>>) {
        let _ = self.inbound.send(Inbound::Frame(frame.into()));
    }

    /// Encodes with the server codec and delivers it to the client.
    pub fn push_packet(&self, packet: &Packet) {
        self.push(FrameCodec::server().encode_frame(packet).unwrap());
    }

    pub fn hang_up(&self) {
        let _ = self.inbound.send(Inbound::HangUp);
    }

    pub fn fail(&self, reason: &str) {
        let _ = self.inbound.send(Inbound::Fail(reason.to_string()));
    }

    pub async fn next_frame(&mut self) -> Vec<u8> {
        recv(&mut self.outbound).await
    }

    pub fn try_next_frame(&mut self) -> Option<Vec<u8>> {
        self.outbound.try_recv().ok()
    }

    /// Whether the client side asked this handle to close.
    pub fn is_closed(&self) -> bool {
        self.close.closed.load(Ordering::SeqCst)
    }

    /// Whether the client dropped its end of the connection entirely.
    pub fn is_released(&self) -> bool {
        self.inbound.is_closed()
    }

    pub async fn wait_released(&self) {
        tokio::time::timeout(WAIT, async {
            while !self.is_released() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("handle was never dropped");
    }

    pub async fn wait_closed(&self) {
        let notified = self.close.notify.notified();
        if self.is_closed() {
            return;
        }
        tokio::time::timeout(WAIT, notified)
            .await
            .expect("handle was never closed");
    }
}

/// A dial waiting for the test to decide its outcome.
pub struct PendingDial {
    pub addr: String,
    pub id: HandleId,
    respond: oneshot::Sender<Result<MockConnection, TransportError>>,
}

impl PendingDial {
    pub fn accept(self) -> MockRemote {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let close = Arc::new(CloseSignal::default());
        let conn = MockConnection {
            id: self.id,
            inbound: Mutex::new(in_rx),
            outbound: out_tx,
            close: Arc::clone(&close),
        };
        let _ = self.respond.send(Ok(conn));
        MockRemote {
            id: self.id,
            addr: self.addr,
            inbound: in_tx,
            outbound: out_rx,
            close,
        }
    }

    pub fn refuse(self, reason: &str) {
        let err = TransportError::connect_failed(self.addr, reason);
        let _ = self.respond.send(Err(err));
    }
}

pub struct MockConnector {
    dials: mpsc::UnboundedSender<PendingDial>,
}

impl Connector for MockConnector {
    type Connection = MockConnection;

    async fn connect(
        &self,
        addr: &str,
        id: HandleId,
    ) -> Result<MockConnection, TransportError> {
        let (respond, response) = oneshot::channel();
        self.dials
            .send(PendingDial {
                addr: addr.to_string(),
                id,
                respond,
            })
            .map_err(|_| TransportError::connect_failed(addr, "mock network gone"))?;
        response
            .await
            .map_err(|_| TransportError::connect_failed(addr, "dial dropped"))?
    }
}

/// Dials made through a [`MockConnector`], in order.
pub struct Dials(mpsc::UnboundedReceiver<PendingDial>);

impl Dials {
    pub async fn next(&mut self) -> PendingDial {
        recv(&mut self.0).await
    }

    pub fn try_next(&mut self) -> Option<PendingDial> {
        self.0.try_recv().ok()
    }
}

pub fn mock_connector() -> (MockConnector, Dials) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MockConnector { dials: tx }, Dials(rx))
}

pub fn client() -> (LinkClient, Dials) {
    client_with(LinkClient::builder())
}

pub fn client_with(builder: LinkClientBuilder) -> (LinkClient, Dials) {
    init_tracing();
    let (connector, dials) = mock_connector();
    (builder.build_with(connector), dials)
}

/// Connects `link` to `addr` and accepts the dial.
pub async fn connect(
    link: &LinkClient,
    dials: &mut Dials,
    addr: &str,
) -> MockRemote {
    let pending = {
        let link = link.clone();
        let addr = addr.to_string();
        tokio::spawn(async move { link.connect(addr, false).await })
    };
    let remote = dials.next().await.accept();
    pending
        .await
        .expect("connect task panicked")
        .expect("connect should succeed");
    remote
}
