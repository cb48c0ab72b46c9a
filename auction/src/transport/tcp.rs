//! TCP transport: length-prefixed JSON frames over tokio sockets.
//!
//! Each frame is a big-endian `u32` byte length followed by a JSON-encoded
//! [`Frame`]. A connection opens with `Hello` from the dialler and `Welcome`
//! from the listener, so both sides learn each other's key. After that the
//! dialler sends `Request` frames and the listener answers each with a
//! `Response`, strictly in order.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{
    BOOTSTRAP_INITIAL_DELAY_MS, BOOTSTRAP_MAX_RETRIES, HANDSHAKE_TIMEOUT_SECS, MAX_FRAME_SIZE,
};
use crate::error::{AuctionError, AuctionResult};
use crate::identity::PeerKey;
use crate::rpc::RpcMethod;
use crate::traits::{RequestHandler, RpcTransport};
use crate::util::{json_from_limited_slice, to_json_bytes};

/// Everything that travels over a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    /// First frame from the dialling side.
    Hello { peer: PeerKey, listen_addr: String },
    /// Listener's reply to `Hello`.
    Welcome { peer: PeerKey },
    Request {
        id: u64,
        method: String,
        payload: String,
    },
    Response { id: u64, payload: String },
}

pub async fn write_frame<W>(writer: &mut W, frame: &Frame) -> AuctionResult<()>
where
    W: AsyncWrite + Unpin,
{
    let bytes = to_json_bytes(frame)?;
    if bytes.len() > MAX_FRAME_SIZE {
        return Err(AuctionError::Validation(format!(
            "Frame too large: {} bytes (max {MAX_FRAME_SIZE})",
            bytes.len()
        )));
    }
    let len = u32::try_from(bytes.len())
        .map_err(|_| AuctionError::Validation("Frame length overflows u32".into()))?;
    writer.write_u32(len).await?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one frame. `Ok(None)` means the peer closed the connection cleanly.
pub async fn read_frame<R>(reader: &mut R) -> AuctionResult<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => usize::try_from(len).unwrap_or(usize::MAX),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if len > MAX_FRAME_SIZE {
        return Err(AuctionError::Validation(format!(
            "Frame too large: {len} bytes (max {MAX_FRAME_SIZE})"
        )));
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    json_from_limited_slice(&buf, MAX_FRAME_SIZE).map(Some)
}

type ConnectionSlot = Arc<tokio::sync::Mutex<Option<TcpStream>>>;

struct TcpInner {
    local: PeerKey,
    listen_addr: SocketAddr,
    /// Learned peers in discovery order.
    peers: parking_lot::RwLock<Vec<PeerKey>>,
    addresses: parking_lot::RwLock<HashMap<PeerKey, SocketAddr>>,
    /// One outbound connection per peer, reused across requests.
    connections: parking_lot::Mutex<HashMap<PeerKey, ConnectionSlot>>,
    next_request_id: AtomicU64,
}

/// Outbound side of the TCP transport; also the address book that the
/// listener fills in as peers say hello.
#[derive(Clone)]
pub struct TcpTransport {
    inner: Arc<TcpInner>,
}

/// Listening side, returned by [`TcpTransport::bind`].
pub struct TcpServer {
    listener: TcpListener,
    transport: TcpTransport,
}

impl TcpTransport {
    /// Bind a listener for `local` on `addr` (port 0 picks a free port).
    pub async fn bind(local: PeerKey, addr: SocketAddr) -> AuctionResult<(Self, TcpServer)> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AuctionError::Transport(format!("Failed to bind {addr}: {e}")))?;
        let listen_addr = listener.local_addr()?;
        info!("[{}] Listening on {}", local.short(), listen_addr);

        let transport = Self {
            inner: Arc::new(TcpInner {
                local,
                listen_addr,
                peers: parking_lot::RwLock::new(Vec::new()),
                addresses: parking_lot::RwLock::new(HashMap::new()),
                connections: parking_lot::Mutex::new(HashMap::new()),
                next_request_id: AtomicU64::new(1),
            }),
        };
        let server = TcpServer {
            listener,
            transport: transport.clone(),
        };
        Ok((transport, server))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.inner.listen_addr
    }

    pub fn address_of(&self, peer: &PeerKey) -> Option<SocketAddr> {
        self.inner.addresses.read().get(peer).copied()
    }

    /// Record `peer` as reachable at `addr`. Returns `true` if it is new.
    fn learn(&self, peer: PeerKey, addr: SocketAddr) -> bool {
        if peer == self.inner.local {
            return false;
        }
        let previous = self.inner.addresses.write().insert(peer, addr);
        if previous.is_none() {
            self.inner.peers.write().push(peer);
            info!(
                "[{}] Learned peer {} at {}",
                self.inner.local.short(),
                peer.short(),
                addr
            );
        }
        previous.is_none()
    }

    fn connection_slot(&self, peer: &PeerKey) -> ConnectionSlot {
        self.inner
            .connections
            .lock()
            .entry(*peer)
            .or_default()
            .clone()
    }

    /// Dial `addr` and run the handshake, returning the remote key.
    async fn dial(&self, addr: SocketAddr) -> AuctionResult<(PeerKey, TcpStream)> {
        let mut stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;

        let remote = tokio::time::timeout(
            Duration::from_secs(HANDSHAKE_TIMEOUT_SECS),
            self.handshake(&mut stream, addr),
        )
        .await
        .map_err(|_| AuctionError::Transport(format!("Handshake with {addr} timed out")))??;
        Ok((remote, stream))
    }

    async fn handshake(&self, stream: &mut TcpStream, addr: SocketAddr) -> AuctionResult<PeerKey> {
        write_frame(
            stream,
            &Frame::Hello {
                peer: self.inner.local,
                listen_addr: self.inner.listen_addr.to_string(),
            },
        )
        .await?;
        match read_frame(stream).await? {
            Some(Frame::Welcome { peer }) => Ok(peer),
            Some(other) => Err(AuctionError::Transport(format!(
                "Expected Welcome from {addr}, got {other:?}"
            ))),
            None => Err(AuctionError::Transport(format!(
                "{addr} closed the connection during handshake"
            ))),
        }
    }

    /// Handshake with one bootstrap contact, retrying with backoff.
    pub async fn connect_bootstrap(&self, addr: SocketAddr) -> AuctionResult<PeerKey> {
        let mut delay = Duration::from_millis(BOOTSTRAP_INITIAL_DELAY_MS);
        let mut attempt = 1;
        loop {
            match self.dial(addr).await {
                Ok((peer, stream)) => {
                    self.learn(peer, addr);
                    *self.connection_slot(&peer).lock().await = Some(stream);
                    return Ok(peer);
                }
                Err(e) if attempt < BOOTSTRAP_MAX_RETRIES => {
                    debug!(
                        "Bootstrap contact {} attempt {}/{} failed: {}",
                        addr, attempt, BOOTSTRAP_MAX_RETRIES, e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(AuctionError::Transport(format!(
                        "Bootstrap contact {addr} unreachable after {attempt} attempts: {e}"
                    )))
                }
            }
        }
    }

    /// Contact every bootstrap address. Unreachable contacts are logged and
    /// skipped; the keys of the reachable ones are returned.
    pub async fn bootstrap(&self, contacts: &[SocketAddr]) -> Vec<PeerKey> {
        let mut joined = Vec::with_capacity(contacts.len());
        for addr in contacts {
            match self.connect_bootstrap(*addr).await {
                Ok(peer) => joined.push(peer),
                Err(e) => warn!("{}", e),
            }
        }
        info!(
            "[{}] Bootstrap finished: {} of {} contacts reachable",
            self.inner.local.short(),
            joined.len(),
            contacts.len()
        );
        joined
    }

    async fn exchange(
        stream: &mut TcpStream,
        id: u64,
        method: RpcMethod,
        payload: String,
    ) -> AuctionResult<String> {
        write_frame(
            stream,
            &Frame::Request {
                id,
                method: method.as_str().to_string(),
                payload,
            },
        )
        .await?;
        loop {
            match read_frame(stream).await? {
                Some(Frame::Response { id: got, payload }) if got == id => return Ok(payload),
                // Answer to a request whose caller gave up waiting.
                Some(Frame::Response { id: got, .. }) if got < id => continue,
                Some(other) => {
                    return Err(AuctionError::Transport(format!(
                        "Unexpected frame while waiting for response {id}: {other:?}"
                    )))
                }
                None => return Err(AuctionError::Transport("Connection closed".into())),
            }
        }
    }
}

#[async_trait]
impl RpcTransport for TcpTransport {
    async fn request(
        &self,
        peer: &PeerKey,
        method: RpcMethod,
        payload: Vec<u8>,
    ) -> AuctionResult<Vec<u8>> {
        let addr = self
            .address_of(peer)
            .ok_or_else(|| AuctionError::PeerUnreachable {
                peer: *peer,
                reason: "no known address".into(),
            })?;
        let payload = String::from_utf8(payload)
            .map_err(|e| AuctionError::Serialization(format!("Payload is not UTF-8: {e}")))?;

        let slot = self.connection_slot(peer);
        let mut conn = slot.lock().await;
        if conn.is_none() {
            let (remote, stream) =
                self.dial(addr).await.map_err(|e| AuctionError::PeerUnreachable {
                    peer: *peer,
                    reason: e.to_string(),
                })?;
            if remote != *peer {
                return Err(AuctionError::Identity(format!(
                    "{addr} answered as {} instead of {}",
                    remote.short(),
                    peer.short()
                )));
            }
            *conn = Some(stream);
        }
        let Some(stream) = conn.as_mut() else {
            return Err(AuctionError::PeerUnreachable {
                peer: *peer,
                reason: "no connection".into(),
            });
        };

        let id = self.inner.next_request_id.fetch_add(1, Ordering::Relaxed);
        match Self::exchange(stream, id, method, payload).await {
            Ok(response) => Ok(response.into_bytes()),
            Err(e) => {
                *conn = None;
                Err(AuctionError::PeerUnreachable {
                    peer: *peer,
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn known_peers(&self) -> AuctionResult<Vec<PeerKey>> {
        Ok(self.inner.peers.read().clone())
    }
}

impl TcpServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// Accept connections until `shutdown` is cancelled.
    pub async fn run(
        self,
        handler: Arc<dyn RequestHandler>,
        shutdown: CancellationToken,
    ) -> AuctionResult<()> {
        let local = self.transport.inner.local;
        loop {
            let (socket, remote) = tokio::select! {
                result = self.listener.accept() => result?,
                () = shutdown.cancelled() => {
                    info!("[{}] Listener shutting down", local.short());
                    break Ok(());
                }
            };
            debug!("[{}] Accepted connection from {}", local.short(), remote);

            let transport = self.transport.clone();
            let handler = handler.clone();
            let cancel = shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_connection(socket, transport, handler, cancel).await {
                    warn!("Connection from {} ended: {}", remote, e);
                }
            });
        }
    }
}

async fn serve_connection(
    mut socket: TcpStream,
    transport: TcpTransport,
    handler: Arc<dyn RequestHandler>,
    shutdown: CancellationToken,
) -> AuctionResult<()> {
    let local = transport.inner.local;
    let hello = tokio::time::timeout(
        Duration::from_secs(HANDSHAKE_TIMEOUT_SECS),
        read_frame(&mut socket),
    )
    .await
    .map_err(|_| AuctionError::Transport("Handshake timed out".into()))??;

    let peer = match hello {
        Some(Frame::Hello { peer, listen_addr }) => {
            let mut addr: SocketAddr = listen_addr.parse().map_err(|e| {
                AuctionError::Transport(format!("Bad listen address '{listen_addr}': {e}"))
            })?;
            // A wildcard bind advertises 0.0.0.0; dial back on the address it connected from.
            if addr.ip().is_unspecified() {
                addr.set_ip(socket.peer_addr()?.ip());
            }
            transport.learn(peer, addr);
            peer
        }
        Some(other) => {
            return Err(AuctionError::Transport(format!(
                "Expected Hello, got {other:?}"
            )))
        }
        None => return Ok(()),
    };
    write_frame(&mut socket, &Frame::Welcome { peer: local }).await?;

    loop {
        let frame = tokio::select! {
            frame = read_frame(&mut socket) => frame?,
            () = shutdown.cancelled() => return Ok(()),
        };
        match frame {
            Some(Frame::Request {
                id,
                method,
                payload,
            }) => {
                debug!(
                    "[{}] {} request {} from {}",
                    local.short(),
                    method,
                    id,
                    peer.short()
                );
                let response = handler.handle(&method, payload.as_bytes()).await;
                let payload = String::from_utf8_lossy(&response).into_owned();
                write_frame(&mut socket, &Frame::Response { id, payload }).await?;
            }
            Some(other) => {
                return Err(AuctionError::Transport(format!(
                    "Unexpected frame from {}: {other:?}",
                    peer.short()
                )))
            }
            None => {
                debug!("[{}] Peer {} disconnected", local.short(), peer.short());
                return Ok(());
            }
        }
    }
}
