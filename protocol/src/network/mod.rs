// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Network Module
//!
//! Everything between the ledger and the wire: the pending-transaction pool,
//! the message envelope, transports, catch-up sync, block production and the
//! server loop that ties them together.
//!
//! ## Architecture
//!
//! ```text
//! mempool.rs    - Pending transactions, drained whole into the next block
//! message.rs    - Envelope {kind, body} and the closed Message enum
//! transport/    - Transport trait, in-process and TCP implementations
//! sync.rs       - Per-peer status / get-blocks state machine
//! producer.rs   - Validator block production on a fixed interval
//! server.rs     - Dispatcher, handlers, NodeHandle
//! ```
//!
//! ## Design Decisions
//!
//! - All ledger and mempool mutation happens under one `parking_lot::Mutex`
//!   held by the dispatcher or the producer, never across an `.await`.
//! - Decoded messages are a closed enum dispatched by one exhaustive `match`.
//! - Transports are trait objects so the same server runs over TCP in the
//!   binary and over in-process channels in the tests.

pub mod mempool;
pub mod message;
pub mod producer;
pub mod server;
pub mod sync;
pub mod transport;

pub use mempool::Mempool;
pub use message::{Envelope, Message, MessageKind, ProtocolError, StatusMessage};
pub use producer::{BlockProducer, ProductionError};
pub use server::{BlockOutcome, ChainState, NodeHandle, Server, ServerConfig, ServerError, SharedChain};
pub use sync::{apply_sync_blocks, SyncAction, SyncOutcome, SyncState, SyncTable};
pub use transport::{
    LocalNetwork, LocalTransport, NetAddr, PeerEvent, Rpc, TcpTransport, Transport, TransportError,
};
