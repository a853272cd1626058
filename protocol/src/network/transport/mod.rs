// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Transports
//!
//! Point-to-point delivery of opaque payloads between nodes. The server
//! never looks below this trait, so the same node logic runs over real
//! sockets and over the in-process simulation used by the tests.
//!
//! ```text
//! local.rs - LocalTransport over a shared in-process LocalNetwork
//! tcp.rs   - TcpTransport: tokio sockets, u32 length-prefixed frames
//! ```
//!
//! ## Contract
//!
//! - `consume()` hands out the inbound [`Rpc`] queue exactly once.
//! - `peer_events()` hands out, exactly once, a queue of [`PeerEvent`]s: one
//!   `Connected` for every newly connected peer on either side of a
//!   connection, and one `Disconnected` when that peer goes away. The server
//!   starts the status handshake on the first and drops the peer's sync state
//!   on the second.
//! - `send_message` fails with [`TransportError::PeerUnreachable`] for an
//!   address that is not connected.
//! - `broadcast` sends to every connected peer. A failed send to one peer is
//!   logged and does not stop delivery to the others.

pub mod local;
pub mod tcp;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

pub use local::{LocalNetwork, LocalTransport};
pub use tcp::TcpTransport;

// ---------------------------------------------------------------------------
// Addresses and RPCs
// ---------------------------------------------------------------------------

/// Opaque peer address. A socket address for TCP, any name for local.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NetAddr(String);

impl NetAddr {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for NetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NetAddr({})", self.0)
    }
}

impl From<&str> for NetAddr {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NetAddr {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One inbound payload and the peer it came from.
#[derive(Debug, Clone)]
pub struct Rpc {
    pub from: NetAddr,
    pub payload: Bytes,
}

/// A change in the set of connected peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    Connected(NetAddr),
    Disconnected(NetAddr),
}

impl PeerEvent {
    pub fn addr(&self) -> &NetAddr {
        match self {
            Self::Connected(addr) | Self::Disconnected(addr) => addr,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("peer {0} is not connected")]
    PeerUnreachable(NetAddr),

    #[error("failed to connect to {addr}: {reason}")]
    ConnectFailure { addr: NetAddr, reason: String },

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame of {len} bytes exceeds limit of {max}")]
    FrameTooLarge { len: usize, max: usize },

    #[error("inbound queue already taken")]
    AlreadyConsumed,
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Transport: Send + Sync {
    /// This transport's own address.
    fn addr(&self) -> NetAddr;

    /// Opens a connection to `addr`.
    async fn connect(&self, addr: &NetAddr) -> Result<(), TransportError>;

    /// Delivers `payload` to the connected peer `to`.
    async fn send_message(&self, to: &NetAddr, payload: Bytes) -> Result<(), TransportError>;

    /// Delivers `payload` to every connected peer.
    async fn broadcast(&self, payload: Bytes) -> Result<(), TransportError>;

    /// Takes the inbound RPC queue.
    fn consume(&self) -> Result<mpsc::Receiver<Rpc>, TransportError>;

    /// Takes the peer connect/disconnect queue.
    fn peer_events(&self) -> Result<mpsc::UnboundedReceiver<PeerEvent>, TransportError>;

    /// Currently connected peers.
    fn peers(&self) -> Vec<NetAddr>;
}
