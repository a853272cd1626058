// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Storage Module
//!
//! Blocks, the rules they must satisfy, and the ledger that chains them.
//!
//! ## Architecture
//!
//! ```text
//! block.rs     - Header, Block, genesis, header/data hashes, block signing
//! validator.rs - Validator trait and the ordered BlockValidator checks
//! chain.rs     - Ledger: in-memory header chain gated by the validator
//! db.rs        - BlockStore sink: MemoryStore, SledStore
//! ```
//!
//! ## Data Flow
//!
//! ```text
//! Block ─→ Validator ─→ Ledger.headers
//!                         │
//!                         └─→ BlockStore.put(block)
//! ```
//!
//! Only the header survives in memory. The body goes to the store and is
//! read back solely to serve catch-up sync to other peers.

pub mod block;
pub mod chain;
pub mod db;
pub mod validator;

pub use block::{data_hash, Block, ForgedBlockHash, Header};
pub use chain::{Ledger, LedgerError};
pub use db::{BlockStore, MemoryStore, SledStore, StorageError};
pub use validator::{BlockValidator, ChainView, ValidationError, Validator};
