// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Server
//!
//! The node runtime: one dispatcher task per node that owns the sync table
//! and drives the ledger and mempool from inbound messages.
//!
//! ## Architecture
//!
//! ```text
//!  transport 0 ──rpc/peer──┐
//!  transport 1 ──rpc/peer──┼──> inbound queue ──> dispatcher ──> ChainState
//!  ...                     ┘                          │           (Mutex)
//!                                                     └──> spawned sends
//!  BlockProducer (validator only) ─────────────────────────────> ChainState
//! ```
//!
//! - Every transport's RPC and peer-event queues are forwarded into one
//!   inbound queue, tagged with the transport index so replies leave through
//!   the transport the request came in on.
//! - [`ChainState`] (ledger + mempool) sits behind one `parking_lot::Mutex`
//!   shared by the dispatcher, the producer and [`NodeHandle`]. The lock is
//!   never held across an `.await`.
//! - Outbound sends are spawned tasks. A slow or dead peer never stalls the
//!   dispatcher, and a failed send is logged and forgotten.
//! - A rejected transaction or block is logged and dropped. Nothing a peer
//!   sends can stop the loop; only the shutdown signal does.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::mempool::Mempool;
use super::message::{Message, ProtocolError, StatusMessage};
use super::producer::BlockProducer;
use super::sync::{apply_sync_blocks, SyncAction, SyncTable};
use super::transport::{NetAddr, PeerEvent, Rpc, Transport, TransportError};
use crate::config::{ConfigError, NodeConfig, DEFAULT_BLOCK_TIME, PROTOCOL_VERSION, RPC_CHANNEL_CAPACITY};
use crate::crypto::hash::Hash;
use crate::crypto::keys::PrivateKey;
use crate::storage::block::Block;
use crate::storage::chain::{Ledger, LedgerError};
use crate::storage::validator::ValidationError;
use crate::transaction::{Transaction, TransactionError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server needs at least one transport")]
    NoTransports,

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("transaction rejected: {0}")]
    Transaction(#[from] TransactionError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// The node's mutable state. Always accessed through [`SharedChain`].
#[derive(Debug)]
pub struct ChainState {
    pub ledger: Ledger,
    pub mempool: Mempool,
}

impl ChainState {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger,
            mempool: Mempool::new(),
        }
    }
}

pub type SharedChain = Arc<Mutex<ChainState>>;

pub type Transports = Arc<[Arc<dyn Transport>]>;

/// Encodes `message` once and sends it to every peer on every transport
/// except `except`, from a spawned task.
pub(crate) fn spawn_relay(transports: &Transports, except: Option<NetAddr>, message: &Message) {
    let payload = match message.encode() {
        Ok(bytes) => Bytes::from(bytes),
        Err(err) => {
            warn!(kind = message.kind().name(), %err, "failed to encode relay");
            return;
        }
    };
    let kind = message.kind().name();
    let transports = Arc::clone(transports);
    tokio::spawn(async move {
        for transport in transports.iter() {
            for peer in transport.peers() {
                if except.as_ref() == Some(&peer) {
                    continue;
                }
                if let Err(err) = transport.send_message(&peer, payload.clone()).await {
                    warn!(to = %peer, kind, %err, "relay failed");
                }
            }
        }
    });
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ServerConfig {
    pub node_id: String,
    /// Present only on the validator.
    pub validator: Option<PrivateKey>,
    pub block_time: Duration,
    pub evict_mined_transactions: bool,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("node_id", &self.node_id)
            .field("validator", &self.validator.as_ref().map(|k| k.public_key().short()))
            .field("block_time", &self.block_time)
            .field("evict_mined_transactions", &self.evict_mined_transactions)
            .finish()
    }
}

impl ServerConfig {
    /// A non-validating node with default timing.
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            validator: None,
            block_time: DEFAULT_BLOCK_TIME,
            evict_mined_transactions: false,
        }
    }

    pub fn with_validator(mut self, key: PrivateKey) -> Self {
        self.validator = Some(key);
        self
    }

    pub fn with_block_time(mut self, block_time: Duration) -> Self {
        self.block_time = block_time;
        self
    }

    pub fn with_eviction(mut self, evict: bool) -> Self {
        self.evict_mined_transactions = evict;
        self
    }

    pub fn from_node_config(config: &NodeConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            node_id: config.node_id(),
            validator: config.validator()?,
            block_time: config.block_time(),
            evict_mined_transactions: config.evict_mined_transactions,
        })
    }
}

// ---------------------------------------------------------------------------
// Node core
// ---------------------------------------------------------------------------

/// How a received block was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    Accepted,
    AlreadyKnown,
    /// The block is beyond `height() + 1`; the sender is ahead of us.
    Ahead,
}

/// State and handlers shared by the dispatcher and every [`NodeHandle`].
struct Core {
    config: ServerConfig,
    chain: SharedChain,
    transports: Transports,
    shutdown: watch::Sender<bool>,
}

impl Core {
    /// Admits a transaction to the mempool and relays it. Returns `false` for
    /// one already pending.
    ///
    /// Signature checks run outside the lock; the final membership test and
    /// the insert happen under one lock, so concurrent submissions of the
    /// same transaction admit and relay it once.
    fn process_transaction(&self, from: Option<NetAddr>, mut tx: Transaction) -> Result<bool, ServerError> {
        let hash = tx.hash();
        if self.chain.lock().mempool.has(&hash) {
            debug!(tx = %hash, "transaction already pending");
            return Ok(false);
        }
        tx.verify()?;
        tx.mark_seen_now();

        {
            let mut chain = self.chain.lock();
            if chain.mempool.has(&hash) {
                debug!(tx = %hash, "transaction already pending");
                return Ok(false);
            }
            chain.mempool.add(tx.clone());
        }
        debug!(tx = %hash, "transaction admitted");
        spawn_relay(&self.transports, from, &Message::Tx(tx));
        Ok(true)
    }

    /// Adds a block through the ledger and relays it on success.
    fn process_block(&self, from: Option<NetAddr>, block: Block) -> Result<BlockOutcome, ServerError> {
        let added = {
            let mut chain = self.chain.lock();
            let added = chain.ledger.add_block(&block);
            if added.is_ok() && from.is_some() && self.config.evict_mined_transactions {
                let evicted = chain.mempool.remove_included(&block.transactions);
                if evicted > 0 {
                    debug!(evicted, height = block.height(), "evicted mined transactions");
                }
            }
            added
        };

        match added {
            Ok(()) => {
                spawn_relay(&self.transports, from, &Message::Block(block));
                Ok(BlockOutcome::Accepted)
            }
            Err(LedgerError::Validation(ValidationError::BlockAlreadyKnown { .. })) => {
                Ok(BlockOutcome::AlreadyKnown)
            }
            Err(LedgerError::Validation(ValidationError::InvalidHeight { got, expected })) if got > expected => {
                Ok(BlockOutcome::Ahead)
            }
            Err(err) => Err(err.into()),
        }
    }

    fn status(&self) -> StatusMessage {
        StatusMessage {
            node_id: self.config.node_id.clone(),
            version: PROTOCOL_VERSION.to_string(),
            height: self.chain.lock().ledger.height(),
        }
    }

    fn send(&self, transport: usize, to: NetAddr, message: Message) {
        let Some(transport) = self.transports.get(transport).cloned() else {
            return;
        };
        let kind = message.kind().name();
        let payload = match message.encode() {
            Ok(bytes) => Bytes::from(bytes),
            Err(err) => {
                warn!(kind, %err, "failed to encode message");
                return;
            }
        };
        tokio::spawn(async move {
            if let Err(err) = transport.send_message(&to, payload).await {
                warn!(%to, kind, %err, "send failed");
            }
        });
    }
}

// ---------------------------------------------------------------------------
// NodeHandle
// ---------------------------------------------------------------------------

/// Cheap, cloneable access to a running node from outside the dispatcher.
#[derive(Clone)]
pub struct NodeHandle {
    core: Arc<Core>,
}

impl NodeHandle {
    pub fn node_id(&self) -> &str {
        &self.core.config.node_id
    }

    pub fn height(&self) -> u32 {
        self.core.chain.lock().ledger.height()
    }

    pub fn head_hash(&self) -> Hash {
        self.core.chain.lock().ledger.head_hash()
    }

    pub fn mempool_len(&self) -> usize {
        self.core.chain.lock().mempool.len()
    }

    pub fn peers(&self) -> Vec<NetAddr> {
        self.core.transports.iter().flat_map(|t| t.peers()).collect()
    }

    pub fn peer_count(&self) -> usize {
        self.core.transports.iter().map(|t| t.peers().len()).sum()
    }

    pub fn status(&self) -> StatusMessage {
        self.core.status()
    }

    /// Header and block read-back for callers outside the dispatcher.
    pub fn block(&self, height: u32) -> Result<Block, ServerError> {
        Ok(self.core.chain.lock().ledger.get_block(height)?)
    }

    /// Submits a locally originated transaction, as if a peer had sent it.
    pub fn submit_transaction(&self, tx: Transaction) -> Result<bool, ServerError> {
        self.core.process_transaction(None, tx)
    }

    /// Asks the dispatcher and the producer to stop.
    pub fn shutdown(&self) {
        self.core.shutdown.send_replace(true);
    }
}

impl std::fmt::Debug for NodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeHandle")
            .field("node_id", &self.core.config.node_id)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

enum Inbound {
    Rpc(usize, Rpc),
    Peer(usize, PeerEvent),
}

type Receivers = (mpsc::Receiver<Rpc>, mpsc::UnboundedReceiver<PeerEvent>);

pub struct Server {
    core: Arc<Core>,
    receivers: Vec<Receivers>,
    sync: SyncTable,
    shutdown: watch::Receiver<bool>,
}

impl Server {
    /// Takes the inbound queues of every transport. Fails if any of them was
    /// already consumed.
    pub fn new(
        config: ServerConfig,
        transports: Vec<Arc<dyn Transport>>,
        ledger: Ledger,
    ) -> Result<Self, ServerError> {
        if transports.is_empty() {
            return Err(ServerError::NoTransports);
        }
        let receivers = transports
            .iter()
            .map(|t| Ok((t.consume()?, t.peer_events()?)))
            .collect::<Result<Vec<_>, TransportError>>()?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let core = Core {
            config,
            chain: Arc::new(Mutex::new(ChainState::new(ledger))),
            transports: transports.into(),
            shutdown,
        };
        Ok(Self {
            core: Arc::new(core),
            receivers,
            sync: SyncTable::new(),
            shutdown: shutdown_rx,
        })
    }

    pub fn handle(&self) -> NodeHandle {
        NodeHandle {
            core: Arc::clone(&self.core),
        }
    }

    pub fn chain(&self) -> SharedChain {
        Arc::clone(&self.core.chain)
    }

    /// Runs the dispatcher until [`NodeHandle::shutdown`] is called.
    pub async fn run(mut self) -> Result<(), ServerError> {
        let core = Arc::clone(&self.core);
        info!(
            node_id = %core.config.node_id,
            transports = core.transports.len(),
            validator = core.config.validator.is_some(),
            height = core.chain.lock().ledger.height(),
            "server starting"
        );

        let (inbound_tx, mut inbound) = mpsc::channel(RPC_CHANNEL_CAPACITY);
        for (index, (mut rpcs, mut peers)) in std::mem::take(&mut self.receivers).into_iter().enumerate() {
            let tx = inbound_tx.clone();
            tokio::spawn(async move {
                while let Some(rpc) = rpcs.recv().await {
                    if tx.send(Inbound::Rpc(index, rpc)).await.is_err() {
                        break;
                    }
                }
            });
            let tx = inbound_tx.clone();
            tokio::spawn(async move {
                while let Some(event) = peers.recv().await {
                    if tx.send(Inbound::Peer(index, event)).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(inbound_tx);

        let mut shutdown = self.shutdown.clone();
        let producer = core.config.validator.clone().map(|key| {
            let producer = BlockProducer::new(key, core.config.block_time);
            tokio::spawn(producer.run(
                Arc::clone(&core.chain),
                Arc::clone(&core.transports),
                core.shutdown.subscribe(),
            ))
        });

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                event = inbound.recv() => match event {
                    Some(Inbound::Peer(index, event)) => self.on_peer(index, event),
                    Some(Inbound::Rpc(index, rpc)) => self.on_rpc(index, rpc),
                    None => {
                        info!("all inbound queues closed");
                        break;
                    }
                },
            }
        }

        core.shutdown.send_replace(true);
        if let Some(producer) = producer {
            if let Err(err) = producer.await {
                warn!(%err, "block producer task failed");
            }
        }
        info!(node_id = %core.config.node_id, "server stopped");
        Ok(())
    }

    fn on_peer(&mut self, transport: usize, event: PeerEvent) {
        match event {
            PeerEvent::Connected(peer) => {
                info!(%peer, "peer connected");
                let action = self.sync.on_connect(&peer);
                self.perform(transport, peer, action);
            }
            PeerEvent::Disconnected(peer) => {
                info!(%peer, "peer disconnected");
                self.sync.remove(&peer);
            }
        }
    }

    fn on_rpc(&mut self, transport: usize, rpc: Rpc) {
        let message = match Message::decode(&rpc.payload) {
            Ok(message) => message,
            Err(err) => {
                warn!(from = %rpc.from, %err, "dropping undecodable message");
                return;
            }
        };
        debug!(from = %rpc.from, kind = message.kind().name(), "message received");
        self.handle_message(transport, rpc.from, message);
    }

    fn handle_message(&mut self, transport: usize, from: NetAddr, message: Message) {
        match message {
            Message::Tx(tx) => {
                if let Err(err) = self.core.process_transaction(Some(from.clone()), tx) {
                    warn!(%from, %err, "transaction rejected");
                }
            }
            Message::Block(block) => {
                let height = block.height();
                match self.core.process_block(Some(from.clone()), block) {
                    Ok(BlockOutcome::Accepted) => {}
                    Ok(BlockOutcome::AlreadyKnown) => debug!(%from, height, "block already known"),
                    Ok(BlockOutcome::Ahead) => {
                        info!(%from, height, "block from ahead of tip, resyncing");
                        let action = self.sync.request_status(&from);
                        self.perform(transport, from, action);
                    }
                    Err(err) => warn!(%from, height, %err, "block rejected"),
                }
            }
            Message::GetStatus => {
                let status = self.core.status();
                self.core.send(transport, from, Message::Status(status));
            }
            Message::Status(status) => {
                let local = self.core.chain.lock().ledger.height();
                debug!(%from, node_id = %status.node_id, version = %status.version, height = status.height, "status");
                let action = self.sync.on_status(&from, status.height, local);
                self.perform(transport, from, action);
            }
            Message::GetBlocks => {
                let blocks = self.core.chain.lock().ledger.blocks_from(1);
                match blocks {
                    Ok(blocks) => self.core.send(transport, from, Message::SyncBlocks(blocks)),
                    Err(err) => warn!(%from, %err, "cannot serve blocks"),
                }
            }
            Message::SyncBlocks(blocks) => {
                if self.sync.on_sync_blocks(&from) != SyncAction::ApplyBlocks {
                    return;
                }
                let applied = apply_sync_blocks(&mut self.core.chain.lock().ledger, &blocks);
                match applied {
                    Ok(outcome) => info!(
                        %from,
                        applied = outcome.applied,
                        skipped = outcome.skipped,
                        gap = outcome.gap,
                        "sync batch applied"
                    ),
                    Err(err) => warn!(%from, %err, "sync batch failed"),
                }
            }
        }
    }

    fn perform(&self, transport: usize, peer: NetAddr, action: SyncAction) {
        match action {
            SyncAction::SendGetStatus => self.core.send(transport, peer, Message::GetStatus),
            SyncAction::SendGetBlocks => self.core.send(transport, peer, Message::GetBlocks),
            SyncAction::ApplyBlocks | SyncAction::Nothing => {}
        }
    }
}
