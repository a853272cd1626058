// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! In-process transport.
//!
//! A [`LocalNetwork`] is a registry of endpoints. Every [`LocalTransport`]
//! created from it registers its inbound queue there, and `connect` links two
//! registered endpoints in both directions. Delivery is a channel send, so
//! multi-node scenarios run deterministically inside one test process.
//! [`LocalTransport::disconnect`] undoes a link and reports it to both sides.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{NetAddr, PeerEvent, Rpc, Transport, TransportError};
use crate::config::RPC_CHANNEL_CAPACITY;

/// What the network knows about one endpoint.
#[derive(Clone)]
struct Endpoint {
    rpc_tx: mpsc::Sender<Rpc>,
    peer_tx: mpsc::UnboundedSender<PeerEvent>,
    peers: Arc<RwLock<BTreeSet<NetAddr>>>,
}

/// Shared registry of in-process endpoints. Clones share one registry.
#[derive(Clone, Default)]
pub struct LocalNetwork {
    endpoints: Arc<DashMap<NetAddr, Endpoint>>,
}

impl LocalNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new endpoint at `addr`. Re-using an address replaces the
    /// previous endpoint.
    pub fn transport(&self, addr: impl Into<NetAddr>) -> LocalTransport {
        let addr = addr.into();
        let (rpc_tx, rpc_rx) = mpsc::channel(RPC_CHANNEL_CAPACITY);
        let (peer_tx, peer_rx) = mpsc::unbounded_channel();
        let peers = Arc::new(RwLock::new(BTreeSet::new()));

        self.endpoints.insert(
            addr.clone(),
            Endpoint {
                rpc_tx,
                peer_tx,
                peers: peers.clone(),
            },
        );

        LocalTransport {
            addr,
            network: self.clone(),
            peers,
            rpc_rx: Mutex::new(Some(rpc_rx)),
            peer_rx: Mutex::new(Some(peer_rx)),
        }
    }

    fn endpoint(&self, addr: &NetAddr) -> Option<Endpoint> {
        self.endpoints.get(addr).map(|e| e.value().clone())
    }
}

pub struct LocalTransport {
    addr: NetAddr,
    network: LocalNetwork,
    peers: Arc<RwLock<BTreeSet<NetAddr>>>,
    rpc_rx: Mutex<Option<mpsc::Receiver<Rpc>>>,
    peer_rx: Mutex<Option<mpsc::UnboundedReceiver<PeerEvent>>>,
}

impl std::fmt::Debug for LocalTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTransport")
            .field("addr", &self.addr)
            .field("peers", &self.peers.read().len())
            .finish()
    }
}

impl LocalTransport {
    /// Unlinks `addr` in both directions. Each side that still held the link
    /// gets a `Disconnected` event.
    pub fn disconnect(&self, addr: &NetAddr) {
        if self.peers.write().remove(addr) {
            if let Some(local) = self.network.endpoint(&self.addr) {
                let _ = local.peer_tx.send(PeerEvent::Disconnected(addr.clone()));
            }
        }
        if let Some(remote) = self.network.endpoint(addr) {
            if remote.peers.write().remove(&self.addr) {
                let _ = remote.peer_tx.send(PeerEvent::Disconnected(self.addr.clone()));
            }
        }
        debug!(from = %self.addr, to = %addr, "local peers unlinked");
    }
}

#[async_trait]
impl Transport for LocalTransport {
    fn addr(&self) -> NetAddr {
        self.addr.clone()
    }

    async fn connect(&self, addr: &NetAddr) -> Result<(), TransportError> {
        if *addr == self.addr {
            return Err(TransportError::ConnectFailure {
                addr: addr.clone(),
                reason: "cannot connect to self".into(),
            });
        }
        let remote = self
            .network
            .endpoint(addr)
            .ok_or_else(|| TransportError::ConnectFailure {
                addr: addr.clone(),
                reason: "no such endpoint".into(),
            })?;
        let local = self
            .network
            .endpoint(&self.addr)
            .ok_or_else(|| TransportError::ConnectFailure {
                addr: self.addr.clone(),
                reason: "local endpoint not registered".into(),
            })?;

        let new_here = self.peers.write().insert(addr.clone());
        let new_there = remote.peers.write().insert(self.addr.clone());

        // A closed event queue only means nobody is listening for handshakes.
        if new_here {
            let _ = local.peer_tx.send(PeerEvent::Connected(addr.clone()));
        }
        if new_there {
            let _ = remote.peer_tx.send(PeerEvent::Connected(self.addr.clone()));
        }
        debug!(from = %self.addr, to = %addr, "local peers linked");
        Ok(())
    }

    async fn send_message(&self, to: &NetAddr, payload: Bytes) -> Result<(), TransportError> {
        if !self.peers.read().contains(to) {
            return Err(TransportError::PeerUnreachable(to.clone()));
        }
        let remote = self
            .network
            .endpoint(to)
            .ok_or_else(|| TransportError::PeerUnreachable(to.clone()))?;
        remote
            .rpc_tx
            .send(Rpc {
                from: self.addr.clone(),
                payload,
            })
            .await
            .map_err(|_| TransportError::PeerUnreachable(to.clone()))
    }

    async fn broadcast(&self, payload: Bytes) -> Result<(), TransportError> {
        for peer in self.peers() {
            if let Err(err) = self.send_message(&peer, payload.clone()).await {
                warn!(from = %self.addr, to = %peer, %err, "broadcast send failed");
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
        self.peers.read().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_links_both_sides() {
        let net = LocalNetwork::new();
        let a = net.transport("A");
        let b = net.transport("B");
        let mut a_events = a.peer_events().unwrap();
        let mut b_events = b.peer_events().unwrap();

        a.connect(&NetAddr::from("B")).await.unwrap();

        assert_eq!(a.peers(), vec![NetAddr::from("B")]);
        assert_eq!(b.peers(), vec![NetAddr::from("A")]);
        assert_eq!(a_events.recv().await, Some(PeerEvent::Connected(NetAddr::from("B"))));
        assert_eq!(b_events.recv().await, Some(PeerEvent::Connected(NetAddr::from("A"))));
    }

    #[tokio::test]
    async fn disconnect_unlinks_and_reports_both_sides() {
        let net = LocalNetwork::new();
        let a = net.transport("A");
        let b = net.transport("B");
        let mut a_events = a.peer_events().unwrap();
        let mut b_events = b.peer_events().unwrap();
        a.connect(&b.addr()).await.unwrap();
        a_events.recv().await;
        b_events.recv().await;

        a.disconnect(&b.addr());
        assert!(a.peers().is_empty());
        assert!(b.peers().is_empty());
        assert_eq!(a_events.recv().await, Some(PeerEvent::Disconnected(b.addr())));
        assert_eq!(b_events.recv().await, Some(PeerEvent::Disconnected(a.addr())));

        // A second disconnect has nothing to report.
        a.disconnect(&b.addr());
        assert!(a_events.try_recv().is_err());

        let err = a.send_message(&b.addr(), Bytes::new()).await.unwrap_err();
        assert!(matches!(err, TransportError::PeerUnreachable(_)));
    }

    #[tokio::test]
    async fn send_message_delivers_with_sender() {
        let net = LocalNetwork::new();
        let a = net.transport("A");
        let b = net.transport("B");
        a.connect(&b.addr()).await.unwrap();

        let mut inbox = b.consume().unwrap();
        a.send_message(&b.addr(), Bytes::from_static(b"hi")).await.unwrap();

        let rpc = inbox.recv().await.unwrap();
        assert_eq!(rpc.from, a.addr());
        assert_eq!(&rpc.payload[..], b"hi");
    }

    #[tokio::test]
    async fn unconnected_peer_is_unreachable() {
        let net = LocalNetwork::new();
        let a = net.transport("A");
        let _b = net.transport("B");
        let err = a
            .send_message(&NetAddr::from("B"), Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::PeerUnreachable(_)));

        let err = a.connect(&NetAddr::from("Z")).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectFailure { .. }));
    }

    #[tokio::test]
    async fn broadcast_reaches_every_peer() {
        let net = LocalNetwork::new();
        let a = net.transport("A");
        let b = net.transport("B");
        let c = net.transport("C");
        a.connect(&b.addr()).await.unwrap();
        a.connect(&c.addr()).await.unwrap();

        let mut b_in = b.consume().unwrap();
        let mut c_in = c.consume().unwrap();
        a.broadcast(Bytes::from_static(b"x")).await.unwrap();

        assert_eq!(&b_in.recv().await.unwrap().payload[..], b"x");
        assert_eq!(&c_in.recv().await.unwrap().payload[..], b"x");
    }

    #[test]
    fn consume_is_take_once() {
        let net = LocalNetwork::new();
        let a = net.transport("A");
        assert!(a.consume().is_ok());
        assert!(matches!(a.consume(), Err(TransportError::AlreadyConsumed)));
    }
}
