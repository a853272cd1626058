// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Transaction Module
//!
//! Construction, signing and verification of [`Transaction`]s.
//!
//! ## Architecture
//!
//! ```text
//! types.rs        - the Transaction record, content hash, wire encoding
//! signing.rs      - Transaction::sign with an Ed25519 key
//! verification.rs - Transaction::verify and TransactionError
//! ```
//!
//! ## Lifecycle
//!
//! 1. **Build** with [`Transaction::new`] and the `with_*` setters.
//! 2. **Sign** with [`Transaction::sign`]; this fixes the content hash.
//! 3. **Submit** to a node, which verifies it, stamps `first_seen` and puts it
//!    in the mempool.
//! 4. **Commit** when the validator drains the mempool into a block.

pub mod signing;
pub mod types;
pub mod verification;

pub use types::Transaction;
pub use verification::TransactionError;
