// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Cryptographic Primitives
//!
//! SHA-256 for every digest and Ed25519 for every signature. Both are thin
//! wrappers around audited crates; nothing here is hand-rolled.

pub mod hash;
pub mod keys;

pub use hash::{sha256, Hash, HashCache};
pub use keys::{KeyError, PrivateKey, PublicKey, Signature};
