//! The link manager: an actor task that owns the single transport handle.
//!
//! [`LinkClient`] is a cheap handle that sends commands to the actor over
//! an mpsc channel and waits for replies on oneshot channels. Dialing,
//! reading and writing happen in per-handle tasks that report back on a
//! second channel, every event tagged with the handle's generation.
//!
//! The actor processes one message at a time, so the handle slot needs no
//! lock. A new handle is stored the moment it is requested, and any event
//! whose generation does not match the stored one is dropped. An old
//! handle closing late can therefore never tear down its replacement.
//!
//! ```text
//! LinkClient ──Command──→ LinkActor ←──HandleEvent── dial / read tasks
//!                             │
//!                             └──Outgoing──→ write task ──→ Connection
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use treadlink_protocol::{FrameCodec, Packet, PacketKind};
use treadlink_transport::{
    Connection, Connector, HandleId, TransportError, WebSocketConnector,
};

use crate::registry::{Listener, ListenerHandle, ListenerRegistry};
use crate::state::{Counters, LinkState, LinkStats, LinkStatus};
use crate::{LinkConfig, LinkError};

type Reply<T> = oneshot::Sender<T>;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// Requests from [`LinkClient`] to the actor.
enum Command {
    Connect {
        /// `None` reuses the last address, then the configured one.
        addr: Option<String>,
        force: bool,
        reply: Reply<Result<(), LinkError>>,
    },
    Disconnect {
        reply: Reply<()>,
    },
    Send {
        packet: Packet,
        reply: Reply<Result<(), LinkError>>,
    },
    Register {
        kind: PacketKind,
        listener: Listener,
        reply: Reply<ListenerHandle>,
    },
    Deregister {
        handle: ListenerHandle,
        reply: Reply<bool>,
    },
    SetOffline {
        offline: bool,
        reply: Reply<()>,
    },
    Shutdown {
        reply: Reply<()>,
    },
}

/// Reports from per-handle tasks, tagged with the handle's generation.
enum HandleEvent<T> {
    Opened { generation: HandleId, conn: T },
    Failed { generation: HandleId, error: TransportError },
    Message { generation: HandleId, data: Vec<u8> },
    Closed { generation: HandleId, error: Option<TransportError> },
}

/// An encoded frame queued for the write task.
struct Outgoing {
    frame: Vec<u8>,
    reply: Reply<Result<(), LinkError>>,
}

/// The handle slot. At most one handle is ever pending or live.
enum Slot<T> {
    Idle,
    Dialing {
        generation: HandleId,
        addr: String,
        reply: Reply<Result<(), LinkError>>,
    },
    Live {
        generation: HandleId,
        addr: String,
        conn: Arc<T>,
        reader: JoinHandle<()>,
        writer: mpsc::UnboundedSender<Outgoing>,
    },
}

impl<T> Slot<T> {
    fn state(&self) -> LinkState {
        match self {
            Self::Idle => LinkState::Disconnected,
            Self::Dialing { .. } => LinkState::Connecting,
            Self::Live { .. } => LinkState::Connected,
        }
    }

    fn generation(&self) -> Option<HandleId> {
        match self {
            Self::Idle => None,
            Self::Dialing { generation, .. } | Self::Live { generation, .. } => {
                Some(*generation)
            }
        }
    }

    fn live_generation(&self) -> Option<HandleId> {
        match self {
            Self::Live { generation, .. } => Some(*generation),
            _ => None,
        }
    }

    fn addr(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::Dialing { addr, .. } | Self::Live { addr, .. } => Some(addr),
        }
    }
}

// ---------------------------------------------------------------------------
// LinkClient
// ---------------------------------------------------------------------------

/// Handle to a running link manager.
///
/// Cloning is cheap; every clone talks to the same actor. The actor stops
/// when [`shutdown`](Self::shutdown) is called or every clone is dropped.
///
/// ## Example
///
/// ```rust,no_run
/// use treadlink::prelude::*;
///
/// # async fn run() -> Result<(), LinkError> {
/// let link = LinkClient::builder()
///     .server_url("ws://localhost:8080/ws")
///     .build();
///
/// let _entities = link
///     .register_listener(PacketKind::EntityList, |packet| {
///         if let Packet::EntityList(records) = packet {
///             println!("{} tanks", records.len());
///         }
///     })
///     .await?;
///
/// link.force_reconnect().await?;
/// link.send(Packet::CreateLobby { name: "arena".into() }).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LinkClient {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<LinkStatus>,
    counters: Arc<Counters>,
}

impl LinkClient {
    pub fn builder() -> LinkClientBuilder {
        LinkClientBuilder::new()
    }

    /// Starts a manager that dials over WebSocket.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: LinkConfig) -> Self {
        Self::with_connector(config, WebSocketConnector)
    }

    /// Starts a manager that dials through `connector`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn with_connector<C: Connector>(config: LinkConfig, connector: C) -> Self {
        let (commands, command_rx) = mpsc::channel(config.command_buffer.max(1));
        let (events_tx, events) = mpsc::channel(config.event_buffer.max(1));
        let (status_tx, status) = watch::channel(LinkStatus {
            offline: config.offline_mode,
            ..LinkStatus::default()
        });
        let counters = Arc::new(Counters::default());

        let actor = LinkActor {
            connector: Arc::new(connector),
            codec: FrameCodec::client(),
            registry: ListenerRegistry::new(),
            slot: Slot::Idle,
            offline: config.offline_mode,
            last_addr: None,
            config,
            commands: command_rx,
            events,
            events_tx,
            status: status_tx,
            counters: Arc::clone(&counters),
        };
        tokio::spawn(actor.run());

        Self {
            commands,
            status,
            counters,
        }
    }

    /// Opens a handle to `addr` and waits for it to connect.
    ///
    /// # Errors
    ///
    /// - [`LinkError::AlreadyConnected`] if a handle is connecting or live
    ///   and `force` is `false`. The existing handle is left alone.
    /// - [`LinkError::Offline`] while offline mode is on.
    /// - [`LinkError::Superseded`] if a forced reconnect or a disconnect
    ///   replaced this attempt before it opened.
    /// - [`LinkError::Transport`] if the dial failed or timed out.
    pub async fn connect(
        &self,
        addr: impl Into<String>,
        force: bool,
    ) -> Result<(), LinkError> {
        let addr = Some(addr.into());
        self.request(|reply| Command::Connect { addr, force, reply })
            .await?
    }

    /// Replaces the current handle, if any, with a fresh one to the last
    /// address used (or the configured `server_url`).
    pub async fn force_reconnect(&self) -> Result<(), LinkError> {
        self.request(|reply| Command::Connect {
            addr: None,
            force: true,
            reply,
        })
        .await?
    }

    /// Closes the current handle. A pending connect fails with
    /// [`LinkError::Superseded`].
    pub async fn disconnect(&self) -> Result<(), LinkError> {
        self.request(|reply| Command::Disconnect { reply }).await
    }

    /// Encodes and writes one packet.
    ///
    /// When the link is not connected (or offline mode is on) this is a
    /// no-op that returns `Ok`: the packet is dropped, a warning is
    /// logged and [`LinkStats::sends_suppressed`] goes up. Encode and write
    /// errors are returned here and leave the connection up.
    pub async fn send(&self, packet: Packet) -> Result<(), LinkError> {
        self.request(|reply| Command::Send { packet, reply }).await?
    }

    /// Appends a callback for packets of `kind`.
    ///
    /// Callbacks run on the manager task, in registration order, and must
    /// not block. A panicking callback is caught and counted.
    pub async fn register_listener<F>(
        &self,
        kind: PacketKind,
        listener: F,
    ) -> Result<ListenerHandle, LinkError>
    where
        F: FnMut(&Packet) + Send + 'static,
    {
        let listener: Listener = Box::new(listener);
        self.request(|reply| Command::Register {
            kind,
            listener,
            reply,
        })
        .await
    }

    /// Removes one registration. `Ok(false)` if it was already gone.
    pub async fn deregister_listener(
        &self,
        handle: ListenerHandle,
    ) -> Result<bool, LinkError> {
        self.request(|reply| Command::Deregister { handle, reply })
            .await
    }

    /// Turns offline mode on or off. Turning it on closes any handle.
    pub async fn set_offline_mode(&self, offline: bool) -> Result<(), LinkError> {
        self.request(|reply| Command::SetOffline { offline, reply })
            .await
    }

    /// Closes the handle and stops the manager. Every later call fails
    /// with [`LinkError::ManagerClosed`].
    pub async fn shutdown(&self) -> Result<(), LinkError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    pub fn state(&self) -> LinkState {
        self.status.borrow().state
    }

    pub fn is_connected(&self) -> bool {
        self.status.borrow().is_connected()
    }

    /// The latest published status.
    pub fn status(&self) -> LinkStatus {
        self.status.borrow().clone()
    }

    /// A receiver that observes every status change.
    pub fn subscribe(&self) -> watch::Receiver<LinkStatus> {
        self.status.clone()
    }

    /// Resolves once the link reaches `state`.
    pub async fn wait_for_state(
        &self,
        state: LinkState,
    ) -> Result<LinkStatus, LinkError> {
        let mut status = self.status.clone();
        let reached = status
            .wait_for(|s| s.state == state)
            .await
            .map_err(|_| LinkError::ManagerClosed)?;
        Ok(reached.clone())
    }

    pub fn stats(&self) -> LinkStats {
        self.counters.snapshot()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, LinkError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(command(reply_tx))
            .await
            .map_err(|_| LinkError::ManagerClosed)?;
        reply_rx.await.map_err(|_| LinkError::ManagerClosed)
    }
}

impl std::fmt::Debug for LinkClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkClient")
            .field("status", &*self.status.borrow())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`LinkClient`].
#[derive(Debug, Clone, Default)]
pub struct LinkClientBuilder {
    config: LinkConfig,
}

impl LinkClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: LinkConfig) -> Self {
        self.config = config;
        self
    }

    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.config.server_url = url.into();
        self
    }

    pub fn offline_mode(mut self, offline: bool) -> Self {
        self.config.offline_mode = offline;
        self
    }

    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.config.close_timeout = timeout;
        self
    }

    pub fn command_buffer(mut self, capacity: usize) -> Self {
        self.config.command_buffer = capacity;
        self
    }

    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.config.event_buffer = capacity;
        self
    }

    /// Starts the manager with the WebSocket connector.
    pub fn build(self) -> LinkClient {
        LinkClient::new(self.config)
    }

    /// Starts the manager with a custom connector.
    pub fn build_with<C: Connector>(self, connector: C) -> LinkClient {
        LinkClient::with_connector(self.config, connector)
    }
}

// ---------------------------------------------------------------------------
// LinkActor
// ---------------------------------------------------------------------------

struct LinkActor<C: Connector> {
    connector: Arc<C>,
    config: LinkConfig,
    codec: FrameCodec,
    registry: ListenerRegistry,
    slot: Slot<C::Connection>,
    offline: bool,
    last_addr: Option<String>,
    commands: mpsc::Receiver<Command>,
    events: mpsc::Receiver<HandleEvent<C::Connection>>,
    /// Cloned into every per-handle task.
    events_tx: mpsc::Sender<HandleEvent<C::Connection>>,
    status: watch::Sender<LinkStatus>,
    counters: Arc<Counters>,
}

impl<C: Connector> LinkActor<C> {
    async fn run(mut self) {
        tracing::debug!("link manager started");

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    // `None` means every LinkClient was dropped.
                    let Some(command) = command else { break };
                    if !self.handle_command(command) {
                        break;
                    }
                }
                Some(event) = self.events.recv() => self.handle_event(event),
            }
        }

        self.release("manager stopped");
        self.publish();
        tracing::debug!("link manager stopped");
    }

    /// Returns `false` when the actor should stop.
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Connect { addr, force, reply } => {
                self.connect(addr, force, reply);
            }
            Command::Disconnect { reply } => {
                self.release("disconnect requested");
                self.publish();
                let _ = reply.send(());
            }
            Command::Send { packet, reply } => self.send(packet, reply),
            Command::Register {
                kind,
                listener,
                reply,
            } => {
                let handle = self.registry.register_boxed(kind, listener);
                tracing::debug!(%kind, "listener registered");
                let _ = reply.send(handle);
            }
            Command::Deregister { handle, reply } => {
                let removed = self.registry.deregister(handle);
                let _ = reply.send(removed);
            }
            Command::SetOffline { offline, reply } => {
                self.offline = offline;
                if offline {
                    self.release("offline mode enabled");
                }
                tracing::info!(offline, "offline mode changed");
                self.publish();
                let _ = reply.send(());
            }
            Command::Shutdown { reply } => {
                self.release("shutdown requested");
                self.publish();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn connect(
        &mut self,
        addr: Option<String>,
        force: bool,
        reply: Reply<Result<(), LinkError>>,
    ) {
        if self.offline {
            let _ = reply.send(Err(LinkError::Offline));
            return;
        }
        if let Some(current) = self.slot.addr() {
            if !force {
                let _ = reply
                    .send(Err(LinkError::AlreadyConnected(current.to_string())));
                return;
            }
            self.release("forced reconnect");
        }

        let addr = addr
            .or_else(|| self.last_addr.clone())
            .unwrap_or_else(|| self.config.server_url.clone());
        let generation = HandleId::next();
        tracing::info!(%generation, addr = %addr, force, "connecting");

        self.spawn_dial(generation, addr.clone());
        self.last_addr = Some(addr.clone());
        self.slot = Slot::Dialing {
            generation,
            addr,
            reply,
        };
        self.publish();
    }

    fn spawn_dial(&self, generation: HandleId, addr: String) {
        let connector = Arc::clone(&self.connector);
        let events = self.events_tx.clone();
        let limit = self.config.connect_timeout;

        tokio::spawn(async move {
            let dial = connector.connect(&addr, generation);
            let result = match limit {
                Some(limit) => tokio::time::timeout(limit, dial)
                    .await
                    .unwrap_or_else(|_| {
                        Err(TransportError::connect_failed(
                            &addr,
                            format!("timed out after {limit:?}"),
                        ))
                    }),
                None => dial.await,
            };
            let event = match result {
                Ok(conn) => HandleEvent::Opened { generation, conn },
                Err(error) => HandleEvent::Failed { generation, error },
            };
            // A closed channel means the actor is gone; the handle drops.
            let _ = events.send(event).await;
        });
    }

    fn send(&self, packet: Packet, reply: Reply<Result<(), LinkError>>) {
        let writer = match &self.slot {
            Slot::Live { writer, .. } if !self.offline => writer,
            _ => {
                Counters::bump(&self.counters.sends_suppressed, 1);
                tracing::warn!(
                    kind = %packet.kind(),
                    state = %self.slot.state(),
                    offline = self.offline,
                    "link not connected, packet not sent"
                );
                let _ = reply.send(Ok(()));
                return;
            }
        };

        match self.codec.encode_frame(&packet) {
            Ok(frame) => {
                if let Err(mpsc::error::SendError(out)) =
                    writer.send(Outgoing { frame, reply })
                {
                    let closed =
                        TransportError::ConnectionClosed("writer stopped".into());
                    let _ = out.reply.send(Err(closed.into()));
                }
            }
            Err(error) => {
                tracing::debug!(kind = %packet.kind(), error = %error, "encode failed");
                let _ = reply.send(Err(error.into()));
            }
        }
    }

    fn handle_event(&mut self, event: HandleEvent<C::Connection>) {
        match event {
            HandleEvent::Opened { generation, conn } => {
                self.on_opened(generation, conn);
            }
            HandleEvent::Failed { generation, error } => {
                self.on_failed(generation, error);
            }
            HandleEvent::Message { generation, data } => {
                self.on_message(generation, &data);
            }
            HandleEvent::Closed { generation, error } => {
                self.on_closed(generation, error);
            }
        }
    }

    fn on_opened(&mut self, generation: HandleId, conn: C::Connection) {
        let conn = Arc::new(conn);
        match std::mem::replace(&mut self.slot, Slot::Idle) {
            Slot::Dialing {
                generation: current,
                addr,
                reply,
            } if current == generation => {
                let (writer, outgoing) = mpsc::unbounded_channel();
                let reader =
                    tokio::spawn(read_loop(Arc::clone(&conn), self.events_tx.clone()));
                tokio::spawn(write_loop(
                    Arc::clone(&conn),
                    outgoing,
                    Arc::clone(&self.counters),
                ));
                tracing::info!(%generation, addr = %addr, "link connected");

                self.slot = Slot::Live {
                    generation,
                    addr,
                    conn,
                    reader,
                    writer,
                };
                self.publish();
                let _ = reply.send(Ok(()));
            }
            other => {
                self.slot = other;
                tracing::debug!(%generation, "replaced handle opened late, closing it");
                close_in_background(conn, None, self.config.close_timeout);
            }
        }
    }

    fn on_failed(&mut self, generation: HandleId, error: TransportError) {
        match std::mem::replace(&mut self.slot, Slot::Idle) {
            Slot::Dialing {
                generation: current,
                addr,
                reply,
            } if current == generation => {
                tracing::warn!(%generation, addr = %addr, error = %error, "connect failed");
                self.publish();
                let _ = reply.send(Err(error.into()));
            }
            other => {
                self.slot = other;
                tracing::debug!(%generation, error = %error, "ignoring failure of replaced dial");
            }
        }
    }

    fn on_message(&mut self, generation: HandleId, data: &[u8]) {
        if self.slot.live_generation() != Some(generation) {
            Counters::bump(&self.counters.frames_dropped, 1);
            tracing::debug!(%generation, len = data.len(), "dropping frame from replaced handle");
            return;
        }

        match self.codec.decode_frame(data) {
            Ok(packet) => {
                Counters::bump(&self.counters.frames_received, 1);
                tracing::trace!(%generation, kind = %packet.kind(), "frame received");
                let report = self.registry.dispatch(&packet);
                if report.panicked > 0 {
                    Counters::bump(
                        &self.counters.listener_panics,
                        report.panicked as u64,
                    );
                }
            }
            Err(error) => {
                Counters::bump(&self.counters.frames_dropped, 1);
                tracing::warn!(
                    %generation,
                    len = data.len(),
                    error = %error,
                    "dropping undecodable frame"
                );
            }
        }
    }

    fn on_closed(&mut self, generation: HandleId, error: Option<TransportError>) {
        if self.slot.live_generation() != Some(generation) {
            tracing::debug!(%generation, "ignoring close of replaced handle");
            return;
        }

        match error {
            Some(error) => {
                tracing::warn!(%generation, error = %error, "link lost");
            }
            None => tracing::info!(%generation, "link closed by peer"),
        }
        self.slot = Slot::Idle;
        self.publish();
    }

    /// Empties the slot: a pending connect is rejected, a live handle is
    /// told to close.
    fn release(&mut self, reason: &'static str) {
        match std::mem::replace(&mut self.slot, Slot::Idle) {
            Slot::Idle => {}
            Slot::Dialing {
                generation, reply, ..
            } => {
                tracing::debug!(%generation, reason, "abandoning pending connect");
                let _ = reply.send(Err(LinkError::Superseded));
            }
            Slot::Live {
                generation,
                conn,
                reader,
                ..
            } => {
                tracing::info!(%generation, reason, "closing link");
                close_in_background(conn, Some(reader), self.config.close_timeout);
            }
        }
    }

    fn publish(&self) {
        let state = self.slot.state();
        let generation = self.slot.generation();
        let addr = self.slot.addr().map(str::to_string);
        let offline = self.offline;

        self.status.send_modify(|status| {
            // Stamped once per handle; republishing a live link keeps it.
            let opened = state == LinkState::Connected
                && (status.state != LinkState::Connected
                    || status.generation != generation);
            if opened {
                status.connected_at = Some(std::time::Instant::now());
            }
            status.state = state;
            status.offline = offline;
            if generation.is_some() {
                status.generation = generation;
            }
            if addr.is_some() {
                status.remote_addr = addr;
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Per-handle tasks
// ---------------------------------------------------------------------------

async fn read_loop<T: Connection>(
    conn: Arc<T>,
    events: mpsc::Sender<HandleEvent<T>>,
) {
    let generation = conn.id();
    let error = loop {
        match conn.recv().await {
            Ok(Some(data)) => {
                let event = HandleEvent::Message { generation, data };
                if events.send(event).await.is_err() {
                    return;
                }
            }
            Ok(None) => break None,
            Err(error) => break Some(error),
        }
    };
    let _ = events.send(HandleEvent::Closed { generation, error }).await;
}

async fn write_loop<T: Connection>(
    conn: Arc<T>,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    counters: Arc<Counters>,
) {
    let generation = conn.id();
    while let Some(Outgoing { frame, reply }) = outgoing.recv().await {
        let result = conn.send(&frame).await;
        match &result {
            Ok(()) => Counters::bump(&counters.frames_sent, 1),
            Err(error) => {
                tracing::warn!(%generation, error = %error, "write failed");
            }
        }
        let _ = reply.send(result.map_err(LinkError::from));
    }
}

/// Closes a replaced handle. The read task gets `limit` to see the close
/// complete; a peer that never answers is cut off and the handle dropped.
fn close_in_background<T: Connection>(
    conn: Arc<T>,
    reader: Option<JoinHandle<()>>,
    limit: Duration,
) {
    tokio::spawn(async move {
        let generation = conn.id();
        match tokio::time::timeout(limit, conn.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::debug!(%generation, error = %error, "close failed");
            }
            Err(_) => tracing::debug!(%generation, "close handshake timed out"),
        }
        drop(conn);

        let Some(mut reader) = reader else { return };
        if tokio::time::timeout(limit, &mut reader).await.is_err() {
            tracing::debug!(%generation, "peer never finished closing, dropping handle");
            reader.abort();
        }
    });
}
