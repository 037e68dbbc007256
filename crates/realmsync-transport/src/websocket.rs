//! WebSocket transport over `tokio-tungstenite`.
//!
//! A background acceptor task owns the listener. Every accepted socket is
//! upgraded on its own task under [`TransportConfig::upgrade_timeout`], so
//! a client that stalls mid-upgrade never holds up anyone else. Finished
//! connections queue up for [`Transport::accept`].
//!
//! Each connection is split into sink and stream halves, each behind its
//! own lock: a read parked on the stream never holds up a broadcast
//! written to the sink.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::{Connection, ConnectionId, Transport, TransportConfig, TransportError};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<TcpStream>;

/// Upgraded connections waiting to be picked up.
const READY_BACKLOG: usize = 128;

/// A WebSocket [`Transport`].
pub struct WebSocketTransport {
    local_addr: SocketAddr,
    ready: mpsc::Receiver<Result<WebSocketConnection, TransportError>>,
    acceptor: JoinHandle<()>,
}

impl WebSocketTransport {
    /// Binds with the default [`TransportConfig`].
    ///
    /// Bind to port 0 to let the OS pick a free port, then read it back
    /// with [`Transport::local_addr`].
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        Self::bind_with(addr, TransportConfig::default()).await
    }

    pub async fn bind_with(
        addr: &str,
        config: TransportConfig,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        let local_addr = listener.local_addr().map_err(TransportError::AcceptFailed)?;
        tracing::info!(%local_addr, "WebSocket transport listening");

        let (tx, ready) = mpsc::channel(READY_BACKLOG);
        let acceptor = tokio::spawn(run_acceptor(listener, config, tx));

        Ok(Self {
            local_addr,
            ready,
            acceptor,
        })
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.acceptor.abort();
    }
}

async fn run_acceptor(
    listener: TcpListener,
    config: TransportConfig,
    ready: mpsc::Sender<Result<WebSocketConnection, TransportError>>,
) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                // Usually fd exhaustion. Report it and keep listening.
                if ready.send(Err(TransportError::AcceptFailed(e))).await.is_err() {
                    return;
                }
                continue;
            }
        };

        let ready = ready.clone();
        tokio::spawn(async move {
            match upgrade(stream, peer, config).await {
                Ok(conn) => {
                    // The transport is gone; the socket closes on drop.
                    let _ = ready.send(Ok(conn)).await;
                }
                Err(e) => tracing::debug!(%peer, error = %e, "upgrade rejected"),
            }
        });
    }
}

async fn upgrade(
    stream: TcpStream,
    peer: SocketAddr,
    config: TransportConfig,
) -> Result<WebSocketConnection, TransportError> {
    let ws = tokio::time::timeout(config.upgrade_timeout, tokio_tungstenite::accept_async(stream))
        .await
        .map_err(|_| TransportError::UpgradeFailed("timed out".into()))?
        .map_err(|e| TransportError::UpgradeFailed(e.to_string()))?;

    let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
    tracing::debug!(%id, %peer, "accepted WebSocket connection");

    let (sink, stream) = ws.split();
    Ok(WebSocketConnection {
        id,
        peer,
        max_frame_bytes: config.max_frame_bytes,
        sink: Mutex::new(sink),
        stream: Mutex::new(stream),
    })
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        self.ready.recv().await.unwrap_or(Err(TransportError::Shutdown))
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        Ok(self.local_addr)
    }
}

/// One upgraded WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    peer: SocketAddr,
    max_frame_bytes: usize,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

fn broken(kind: std::io::ErrorKind, e: tungstenite::Error) -> std::io::Error {
    std::io::Error::new(kind, e)
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    /// Valid UTF-8 goes out as a text frame (browser clients parse JSON
    /// from text), anything else as a binary frame.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::Text(text.to_owned().into()),
            Err(_) => Message::Binary(data.to_vec().into()),
        };
        self.sink
            .lock()
            .await
            .send(msg)
            .await
            .map_err(|e| TransportError::SendFailed(broken(std::io::ErrorKind::BrokenPipe, e)))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            let data: Vec<u8> = match stream.next().await {
                Some(Ok(Message::Text(text))) => text.as_bytes().to_vec(),
                Some(Ok(Message::Binary(data))) => data.into(),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                // tungstenite answers pings itself.
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(broken(
                        std::io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            };
            if data.len() > self.max_frame_bytes {
                return Err(TransportError::FrameTooLarge {
                    size: data.len(),
                    limit: self.max_frame_bytes,
                });
            }
            return Ok(Some(data));
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        match self.sink.lock().await.close().await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(TransportError::SendFailed(broken(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))),
        }
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        Some(self.peer)
    }
}
