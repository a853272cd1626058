// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Prometheus Metrics
//!
//! Node gauges, scraped at `/metrics`. Values are read from the running node
//! at scrape time, so no background task keeps them fresh.
//!
//! All metrics live in a dedicated [`prometheus::Registry`] with the
//! `minichain` prefix.

use std::sync::Arc;

use prometheus::{Encoder, IntGauge, Registry, TextEncoder};

use minichain_protocol::network::NodeHandle;

#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Current ledger height.
    pub block_height: IntGauge,
    /// Transactions waiting in the mempool.
    pub transactions_in_mempool: IntGauge,
    /// Peers connected over every transport.
    pub connected_peers: IntGauge,
}

pub type SharedMetrics = Arc<NodeMetrics>;

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("minichain".into()), None)?;

        let block_height = IntGauge::new("block_height", "Height of the ledger tip")?;
        registry.register(Box::new(block_height.clone()))?;

        let transactions_in_mempool = IntGauge::new(
            "transactions_in_mempool",
            "Current number of pending transactions in the mempool",
        )?;
        registry.register(Box::new(transactions_in_mempool.clone()))?;

        let connected_peers = IntGauge::new("connected_peers", "Number of connected peers")?;
        registry.register(Box::new(connected_peers.clone()))?;

        Ok(Self {
            registry,
            block_height,
            transactions_in_mempool,
            connected_peers,
        })
    }

    /// Copies the node's current numbers into the gauges.
    pub fn observe(&self, node: &NodeHandle) {
        self.block_height.set(i64::from(node.height()));
        self.transactions_in_mempool.set(node.mempool_len() as i64);
        self.connected_peers.set(node.peer_count() as i64);
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
