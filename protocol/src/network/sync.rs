// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Catch-up Sync
//!
//! Per-peer state machine for the status / get-blocks exchange that brings a
//! lagging node up to its peers' height.
//!
//! ```text
//! Node                               Peer
//! ────                               ────
//!   │  GetStatus                      │   (on connect, or on a block
//!   │──────────────────────────────>  │    from too far ahead)
//!   │  Status { height }              │
//!   │<──────────────────────────────  │
//!   │  GetBlocks          (if ahead)  │
//!   │──────────────────────────────>  │
//!   │  SyncBlocks [1..=height]        │
//!   │<──────────────────────────────  │
//! ```
//!
//! ## Design
//!
//! - The table is owned by the server dispatcher and never shared. It only
//!   decides what to send next; the dispatcher does the sending.
//! - A `Status` is evaluated in any state. Peers answer `GetStatus` whenever
//!   it is asked, and a fresh height is always worth comparing.
//! - `SyncBlocks` is only applied when this node asked for it. Unsolicited
//!   batches are dropped, since they bypass block validation.
//! - Synced blocks go through [`Ledger::append_without_validation`]. Heights
//!   already held are skipped and the batch stops at the first gap.
//! - An entry lives from the peer's connect event to its disconnect event.

use std::collections::HashMap;

use tracing::{debug, info};

use super::transport::NetAddr;
use crate::storage::block::Block;
use crate::storage::chain::{Ledger, LedgerError};

/// Where a peer is in the catch-up exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    New,
    AwaitStatus,
    AwaitBlocks,
    Steady,
}

/// What the dispatcher should send in response to a sync event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    SendGetStatus,
    SendGetBlocks,
    ApplyBlocks,
    Nothing,
}

/// Result of applying one `SyncBlocks` batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    pub applied: usize,
    pub skipped: usize,
    /// True when the batch stopped early at a height gap.
    pub gap: bool,
}

#[derive(Debug, Default)]
pub struct SyncTable {
    peers: HashMap<NetAddr, SyncState>,
}

impl SyncTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, peer: &NetAddr) -> SyncState {
        self.peers.get(peer).copied().unwrap_or(SyncState::New)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// A connection to `peer` was established.
    pub fn on_connect(&mut self, peer: &NetAddr) -> SyncAction {
        self.request_status(peer)
    }

    /// Re-runs the exchange with `peer`, e.g. after it sent a block from
    /// beyond our tip.
    pub fn request_status(&mut self, peer: &NetAddr) -> SyncAction {
        self.peers.insert(peer.clone(), SyncState::AwaitStatus);
        SyncAction::SendGetStatus
    }

    /// `peer` reported `remote_height`.
    pub fn on_status(&mut self, peer: &NetAddr, remote_height: u32, local_height: u32) -> SyncAction {
        if remote_height <= local_height {
            debug!(%peer, remote_height, local_height, "peer not ahead");
            self.peers.insert(peer.clone(), SyncState::Steady);
            return SyncAction::Nothing;
        }
        info!(%peer, remote_height, local_height, "peer is ahead, requesting blocks");
        self.peers.insert(peer.clone(), SyncState::AwaitBlocks);
        SyncAction::SendGetBlocks
    }

    /// `peer` delivered a `SyncBlocks` batch. Returns [`SyncAction::ApplyBlocks`]
    /// only when the batch was requested.
    pub fn on_sync_blocks(&mut self, peer: &NetAddr) -> SyncAction {
        if self.state(peer) != SyncState::AwaitBlocks {
            debug!(%peer, state = ?self.state(peer), "unsolicited sync blocks");
            return SyncAction::Nothing;
        }
        self.peers.insert(peer.clone(), SyncState::Steady);
        SyncAction::ApplyBlocks
    }

    /// Forgets a disconnected peer.
    pub fn remove(&mut self, peer: &NetAddr) {
        self.peers.remove(peer);
    }
}

/// Appends every block of `blocks` that extends the ledger, in order.
pub fn apply_sync_blocks(ledger: &mut Ledger, blocks: &[Block]) -> Result<SyncOutcome, LedgerError> {
    let mut outcome = SyncOutcome::default();
    for block in blocks {
        let next = ledger.height() + 1;
        if block.height() < next {
            outcome.skipped += 1;
            continue;
        }
        if block.height() > next {
            debug!(got = block.height(), expected = next, "gap in sync batch");
            outcome.gap = true;
            break;
        }
        ledger.append_without_validation(block)?;
        outcome.applied += 1;
    }
    Ok(outcome)
}
