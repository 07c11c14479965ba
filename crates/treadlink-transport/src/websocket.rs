//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! The stream is split into sink and stream halves behind separate locks,
//! so a task parked in `recv` never blocks writers.

use std::net::SocketAddr;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::{Connection, Connector, HandleId, Transport, TransportError};

/// Connection produced by [`WebSocketConnector`] (outbound, maybe TLS).
pub type ClientConnection = WebSocketConnection<MaybeTlsStream<TcpStream>>;

/// Connection produced by [`WebSocketTransport`] (inbound, plain TCP).
pub type ServerConnection = WebSocketConnection<TcpStream>;

/// A single WebSocket connection, in either direction.
pub struct WebSocketConnection<S> {
    id: HandleId,
    peer: String,
    sink: Mutex<SplitSink<WebSocketStream<S>, Message>>,
    stream: Mutex<SplitStream<WebSocketStream<S>>>,
}

impl<S> WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn new(id: HandleId, peer: String, ws: WebSocketStream<S>) -> Self {
        let (sink, stream) = ws.split();
        Self {
            id,
            peer,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        }
    }

    /// Returns the remote address (URL for dialed handles, socket address
    /// for accepted ones).
    pub fn peer(&self) -> &str {
        &self.peer
    }
}

impl<S> Connection for WebSocketConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let msg = Message::Binary(data.to_vec().into());
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.into()));
                }
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // skip ping/pong/frame
                Some(Err(
                    tungstenite::Error::ConnectionClosed
                    | tungstenite::Error::AlreadyClosed,
                )) => return Ok(None),
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> HandleId {
        self.id
    }
}

/// Dials `ws://` / `wss://` URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl Connector for WebSocketConnector {
    type Connection = ClientConnection;

    async fn connect(
        &self,
        addr: &str,
        id: HandleId,
    ) -> Result<Self::Connection, TransportError> {
        let (ws, _response) = tokio_tungstenite::connect_async(addr)
            .await
            .map_err(|e| TransportError::connect_failed(addr, e))?;
        tracing::debug!(%id, addr, "WebSocket handle opened");
        Ok(WebSocketConnection::new(id, addr.to_string(), ws))
    }
}

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }

    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Connection = ServerConnection;

    async fn accept(&mut self) -> Result<Self::Connection, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .map_err(|e| {
                TransportError::AcceptFailed(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    e,
                ))
            })?;

        let id = HandleId::next();
        tracing::debug!(%id, %addr, "accepted WebSocket connection");

        Ok(WebSocketConnection::new(id, addr.to_string(), ws))
    }
}
