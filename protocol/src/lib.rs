// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # minichain protocol
//!
//! A single-validator blockchain node: an append-only ledger of signed
//! blocks, a pool of pending transactions, and a small peer protocol that
//! spreads transactions and blocks and lets lagging nodes catch up.
//!
//! ## Architecture
//!
//! - **crypto** - SHA-256 hashes with a memo cell, Ed25519 keys and signatures.
//! - **codec** - The binary encoding shared by ledger entities and messages.
//! - **transaction** - Transactions: hashing, signing, verification.
//! - **storage** - Headers and blocks, validation rules, the ledger, block stores.
//! - **network** - Mempool, wire messages, transports, sync, producer, server.
//! - **config** - Protocol constants and the node configuration.
//!
//! ## Flow
//!
//! 1. A transaction arrives (from a peer or locally), is verified, stamped and
//!    pooled, then relayed.
//! 2. Every block interval the validator drains the pool into a signed block,
//!    adds it to its own ledger and broadcasts it.
//! 3. Other nodes validate and append the block, then relay it on. A node that
//!    falls behind asks a peer for its status and pulls the missing blocks.

pub mod codec;
pub mod config;
pub mod crypto;
pub mod network;
pub mod storage;
pub mod transaction;
