// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Block Production
//!
//! Only a node started with a validator key runs this. Every `block_time` it
//! turns the whole mempool into the next block:
//!
//! ```text
//! 1. DRAIN  - Mempool::pending(), oldest first
//! 2. BUILD  - Block::from_parent(head): height + 1, parent hash, data hash
//! 3. SIGN   - validator key over the header bytes
//! 4. ADD    - Ledger::add_block, the same path received blocks take
//! 5. RELAY  - broadcast on every transport
//! ```
//!
//! Steps 1 to 4 run under the chain lock. A failed production drops the
//! drained transactions; nothing is put back.
//!
//! ## Shutdown
//!
//! The loop watches the server's `tokio::sync::watch` channel and exits as
//! soon as it flips to `true` or its sender is dropped.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::message::Message;
use super::server::{spawn_relay, ChainState, SharedChain, Transports};
use crate::codec::CodecError;
use crate::crypto::keys::{PrivateKey, PublicKey};
use crate::storage::block::Block;
use crate::storage::chain::LedgerError;

#[derive(Debug, Error)]
pub enum ProductionError {
    #[error("failed to build block: {0}")]
    Build(#[from] CodecError),

    #[error("ledger rejected produced block: {0}")]
    Ledger(#[from] LedgerError),
}

pub struct BlockProducer {
    key: PrivateKey,
    block_time: Duration,
}

impl BlockProducer {
    pub fn new(key: PrivateKey, block_time: Duration) -> Self {
        Self { key, block_time }
    }

    pub fn validator(&self) -> PublicKey {
        self.key.public_key()
    }

    pub fn block_time(&self) -> Duration {
        self.block_time
    }

    /// Drains the mempool into a signed block on top of the current head and
    /// adds it to the ledger.
    pub fn produce_block(&self, chain: &mut ChainState) -> Result<Block, ProductionError> {
        let transactions = chain.mempool.pending();
        let mut block = Block::from_parent(chain.ledger.head(), transactions)?;
        block.sign(&self.key);
        chain.ledger.add_block(&block)?;
        Ok(block)
    }

    /// Produces a block every `block_time` until shutdown. The first block
    /// comes one full interval after start.
    pub async fn run(self, chain: SharedChain, transports: Transports, mut shutdown: watch::Receiver<bool>) {
        info!(validator = %self.validator().short(), block_time = ?self.block_time, "block producer starting");
        let mut ticker = interval_at(Instant::now() + self.block_time, self.block_time);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let produced = {
                        let mut chain = chain.lock();
                        self.produce_block(&mut chain)
                    };
                    match produced {
                        Ok(block) => {
                            debug!(height = block.height(), txs = block.transactions.len(), "produced block");
                            spawn_relay(&transports, None, &Message::Block(block));
                        }
                        Err(err) => warn!(%err, "block production failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("block producer stopping");
                        break;
                    }
                }
            }
        }
    }
}
