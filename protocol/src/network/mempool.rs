// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! Pending-transaction pool.
//!
//! Holds verified transactions that have not been put in a block yet, keyed by
//! content hash. Block production drains the whole pool at once with
//! [`Mempool::pending`]; there is no size or fee selection.
//!
//! ## Design
//!
//! - Plain `HashMap` with `&mut self` mutators. The pool lives inside the
//!   node's shared chain state and is only ever touched under that lock, so
//!   it needs no locking of its own.
//! - Inserting an existing hash overwrites the entry. Callers that care about
//!   first-seen order check [`Mempool::has`] first.
//! - Drain order is oldest `first_seen` first, ties broken by hash so the
//!   order is the same on every run.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::crypto::hash::Hash;
use crate::transaction::Transaction;

#[derive(Default)]
pub struct Mempool {
    transactions: HashMap<Hash, Transaction>,
}

impl fmt::Debug for Mempool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mempool")
            .field("size", &self.transactions.len())
            .finish()
    }
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `tx` under its hash. A duplicate hash overwrites.
    pub fn add(&mut self, tx: Transaction) {
        let hash = tx.hash();
        if self.transactions.insert(hash, tx).is_some() {
            debug!(tx = %hash, "mempool entry overwritten");
        }
    }

    pub fn has(&self, hash: &Hash) -> bool {
        self.transactions.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Removes and returns every transaction, oldest `first_seen` first.
    pub fn pending(&mut self) -> Vec<Transaction> {
        let mut drained: Vec<(Hash, Transaction)> = self.transactions.drain().collect();
        drained.sort_by(|(ha, a), (hb, b)| a.first_seen.cmp(&b.first_seen).then_with(|| ha.cmp(hb)));
        drained.into_iter().map(|(_, tx)| tx).collect()
    }

    /// Drops every transaction whose hash appears in `included`. Returns how
    /// many were removed.
    pub fn remove_included(&mut self, included: &[Transaction]) -> usize {
        included
            .iter()
            .filter(|tx| self.transactions.remove(&tx.hash()).is_some())
            .count()
    }
}
