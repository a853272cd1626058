// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # TCP Transport
//!
//! Real-socket transport on tokio.
//!
//! ## Design
//!
//! - Frames are a big-endian `u32` length followed by the payload
//!   (`LengthDelimitedCodec`). Frames over [`MAX_FRAME_BYTES`] kill the
//!   connection.
//! - Every connection gets two tasks. The read task forwards frames to the
//!   shared inbound queue. The write task drains a per-peer outbound queue, so
//!   `send_message` never waits on a slow socket.
//! - Peers are keyed by the address we know them by: the dialed address for
//!   outbound connections, the remote socket address for inbound ones.
//!   Replies to an [`Rpc`] always go back over the connection it arrived on.
//! - A new connection under an existing key replaces the old one. Each table
//!   entry carries its connection id, and a closing connection only removes
//!   the entry if it is still its own.
//! - When either task ends the peer is dropped from the table and a
//!   [`PeerEvent::Disconnected`] is emitted. Nothing is retried.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};
use tracing::{debug, info, warn};

use super::{NetAddr, PeerEvent, Rpc, Transport, TransportError};
use crate::config::{MAX_FRAME_BYTES, PEER_CONNECT_TIMEOUT, RPC_CHANNEL_CAPACITY};

fn codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_BYTES)
        .new_codec()
}

/// Outbound queue of one live connection.
struct Link {
    id: u64,
    tx: mpsc::UnboundedSender<Bytes>,
}

struct Shared {
    local_addr: SocketAddr,
    next_id: AtomicU64,
    peers: DashMap<NetAddr, Link>,
    rpc_tx: mpsc::Sender<Rpc>,
    peer_tx: mpsc::UnboundedSender<PeerEvent>,
}

impl Shared {
    /// Splits `stream`, starts its read and write tasks, and announces the
    /// peer.
    fn attach(self: &Arc<Self>, stream: TcpStream, addr: NetAddr) {
        let (read_half, write_half) = stream.into_split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Bytes>();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        if self.peers.insert(addr.clone(), Link { id, tx: out_tx }).is_some() {
            debug!(peer = %addr, "replacing existing connection");
        }

        let writer_shared = Arc::clone(self);
        let writer_addr = addr.clone();
        tokio::spawn(async move {
            let mut sink = FramedWrite::new(write_half, codec());
            while let Some(frame) = out_rx.recv().await {
                if let Err(err) = sink.send(frame).await {
                    warn!(peer = %writer_addr, %err, "write failed, dropping peer");
                    break;
                }
            }
            writer_shared.detach(&writer_addr, id);
        });

        let reader_shared = Arc::clone(self);
        let reader_addr = addr.clone();
        tokio::spawn(async move {
            let mut frames = FramedRead::new(read_half, codec());
            loop {
                match frames.next().await {
                    Some(Ok(frame)) => {
                        let rpc = Rpc {
                            from: reader_addr.clone(),
                            payload: frame.freeze(),
                        };
                        if reader_shared.rpc_tx.send(rpc).await.is_err() {
                            debug!(peer = %reader_addr, "inbound queue closed");
                            break;
                        }
                    }
                    Some(Err(err)) => {
                        warn!(peer = %reader_addr, %err, "read failed");
                        break;
                    }
                    None => {
                        info!(peer = %reader_addr, "connection closed");
                        break;
                    }
                }
            }
            reader_shared.detach(&reader_addr, id);
        });

        let _ = self.peer_tx.send(PeerEvent::Connected(addr));
    }

    /// Drops connection `id` of `addr` if it is still the live one.
    fn detach(&self, addr: &NetAddr, id: u64) {
        if self.peers.remove_if(addr, |_, link| link.id == id).is_some() {
            debug!(peer = %addr, id, "peer detached");
            let _ = self.peer_tx.send(PeerEvent::Disconnected(addr.clone()));
        }
    }
}

/// TCP transport bound to a local listener.
pub struct TcpTransport {
    shared: Arc<Shared>,
    rpc_rx: Mutex<Option<mpsc::Receiver<Rpc>>>,
    peer_rx: Mutex<Option<mpsc::UnboundedReceiver<PeerEvent>>>,
    accept_task: JoinHandle<()>,
}

impl TcpTransport {
    /// Binds `listen_addr` and starts accepting. Bind failure is returned to
    /// the caller, which treats it as fatal.
    pub async fn bind(listen_addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(listen_addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: listen_addr.to_string(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let (rpc_tx, rpc_rx) = mpsc::channel(RPC_CHANNEL_CAPACITY);
        let (peer_tx, peer_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            local_addr,
            next_id: AtomicU64::new(0),
            peers: DashMap::new(),
            rpc_tx,
            peer_tx,
        });

        let accept_shared = Arc::clone(&shared);
        let accept_task = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, remote)) => {
                        debug!(%remote, "inbound connection");
                        accept_shared.attach(stream, NetAddr::new(remote.to_string()));
                    }
                    Err(err) => {
                        warn!(%err, "accept failed");
                    }
                }
            }
        });

        info!(addr = %local_addr, "tcp transport listening");
        Ok(Self {
            shared,
            rpc_rx: Mutex::new(Some(rpc_rx)),
            peer_rx: Mutex::new(Some(peer_rx)),
            accept_task,
        })
    }

    /// The bound socket address. Differs from the requested one when
    /// binding port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.shared.local_addr
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn addr(&self) -> NetAddr {
        NetAddr::new(self.shared.local_addr.to_string())
    }

    async fn connect(&self, addr: &NetAddr) -> Result<(), TransportError> {
        let dial = TcpStream::connect(addr.as_str());
        let stream = tokio::time::timeout(PEER_CONNECT_TIMEOUT, dial)
            .await
            .map_err(|_| TransportError::ConnectFailure {
                addr: addr.clone(),
                reason: "timed out".into(),
            })?
            .map_err(|err| TransportError::ConnectFailure {
                addr: addr.clone(),
                reason: err.to_string(),
            })?;
        debug!(peer = %addr, "outbound connection");
        self.shared.attach(stream, addr.clone());
        Ok(())
    }

    async fn send_message(&self, to: &NetAddr, payload: Bytes) -> Result<(), TransportError> {
        if payload.len() > MAX_FRAME_BYTES {
            return Err(TransportError::FrameTooLarge {
                len: payload.len(),
                max: MAX_FRAME_BYTES,
            });
        }
        let sender = self
            .shared
            .peers
            .get(to)
            .map(|entry| entry.value().tx.clone())
            .ok_or_else(|| TransportError::PeerUnreachable(to.clone()))?;
        sender
            .send(payload)
            .map_err(|_| TransportError::PeerUnreachable(to.clone()))
    }

    async fn broadcast(&self, payload: Bytes) -> Result<(), TransportError> {
        for peer in self.peers() {
            if let Err(err) = self.send_message(&peer, payload.clone()).await {
                warn!(to = %peer, %err, "broadcast send failed");
            }
        }
        Ok(())
    }

    fn consume(&self) -> Result<mpsc::Receiver<Rpc>, TransportError> {
        self.rpc_rx.lock().take().ok_or(TransportError::AlreadyConsumed)
    }

    fn peer_events(&self) -> Result<mpsc::UnboundedReceiver<PeerEvent>, TransportError> {
        self.peer_rx.lock().take().ok_or(TransportError::AlreadyConsumed)
    }

    fn peers(&self) -> Vec<NetAddr> {
        let mut peers: Vec<NetAddr> = self.shared.peers.iter().map(|e| e.key().clone()).collect();
        peers.sort();
        peers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn frames_travel_both_ways() {
        let server = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let client = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let mut server_in = server.consume().unwrap();
        let mut server_peers = server.peer_events().unwrap();
        let mut client_in = client.consume().unwrap();

        client.connect(&server.addr()).await.unwrap();
        client
            .send_message(&server.addr(), Bytes::from_static(b"ping"))
            .await
            .unwrap();

        let rpc = tokio::time::timeout(Duration::from_secs(5), server_in.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&rpc.payload[..], b"ping");

        // The inbound peer was announced under the address the reply goes to.
        let announced = server_peers.recv().await.unwrap();
        assert_eq!(announced, PeerEvent::Connected(rpc.from.clone()));

        server
            .send_message(&rpc.from, Bytes::from_static(b"pong"))
            .await
            .unwrap();
        let reply = tokio::time::timeout(Duration::from_secs(5), client_in.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&reply.payload[..], b"pong");
        assert_eq!(reply.from, server.addr());
    }

    #[tokio::test]
    async fn redial_keeps_the_new_connection() {
        let server = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let client = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let mut server_in = server.consume().unwrap();

        client.connect(&server.addr()).await.unwrap();
        client.connect(&server.addr()).await.unwrap();
        // Let the replaced connection's tasks wind down.
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(client.peers(), vec![server.addr()]);
        client
            .send_message(&server.addr(), Bytes::from_static(b"still here"))
            .await
            .unwrap();
        let rpc = tokio::time::timeout(Duration::from_secs(5), server_in.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&rpc.payload[..], b"still here");
    }

    #[tokio::test]
    async fn closed_connection_is_reported_once() {
        let server = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let mut events = server.peer_events().unwrap();

        let stream = TcpStream::connect(server.local_addr()).await.unwrap();
        let connected = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        let PeerEvent::Connected(peer) = connected else {
            panic!("expected a connect event, got {connected:?}");
        };
        assert_eq!(server.peers(), vec![peer.clone()]);

        drop(stream);
        let gone = tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(gone, PeerEvent::Disconnected(peer));
        assert!(server.peers().is_empty());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let first = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let taken = first.local_addr().to_string();
        let err = TcpTransport::bind(&taken).await.err().unwrap();
        assert!(matches!(err, TransportError::Bind { .. }));
    }

    #[tokio::test]
    async fn dialing_nothing_fails() {
        let t = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        // Grab a free port, then release it so nothing listens there.
        let spare = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead = spare.local_addr().unwrap().to_string();
        drop(spare);

        let err = t.connect(&NetAddr::new(dead)).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectFailure { .. }));
        assert!(t.peers().is_empty());
    }

    #[tokio::test]
    async fn unknown_peer_is_unreachable() {
        let t = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let err = t
            .send_message(&NetAddr::from("10.0.0.1:1"), Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::PeerUnreachable(_)));
    }
}
