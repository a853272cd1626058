// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Block Validation
//!
//! The rules every block must pass before the ledger appends it. The same
//! rules apply to blocks produced locally and to blocks received from peers.
//!
//! ## Check order
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. not already known (height at or below the tip)
//! 2. height is exactly tip + 1
//! 3. `prev_block_hash` equals the recomputed hash of the parent header
//! 4. validator signature over the header bytes
//! 5. every transaction signature, reporting the first offender
//! 6. `data_hash` equals the recomputed hash over the transactions
//!
//! The order matters for which error a caller sees when a block is wrong in
//! more than one way; tests rely on it.

use thiserror::Error;
use tracing::trace;

use super::block::{Block, Header};
use crate::crypto::hash::Hash;

/// Why a block was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("block {height} ({hash}) already known")]
    BlockAlreadyKnown { height: u32, hash: Hash },

    #[error("invalid height {got}, expected {expected}")]
    InvalidHeight { got: u32, expected: u32 },

    #[error("parent hash mismatch at height {height}: block says {declared}, parent is {actual}")]
    InvalidParentHash {
        height: u32,
        declared: Hash,
        actual: Hash,
    },

    #[error("invalid block signature on block {height}")]
    InvalidBlockSignature { height: u32 },

    #[error("invalid signature on transaction {tx_hash} in block {height}")]
    InvalidTransactionSignature { height: u32, tx_hash: Hash },

    #[error("data hash mismatch at height {height}: header says {declared}, body hashes to {actual}")]
    DataHashMismatch {
        height: u32,
        declared: Hash,
        actual: Hash,
    },
}

/// The view of the chain a validator needs.
pub trait ChainView {
    /// Current tip height.
    fn height(&self) -> u32;

    /// Header at `height`, if held.
    fn header_at(&self, height: u32) -> Option<&Header>;
}

/// Pluggable block validation. The ledger holds one behind a `Box<dyn _>`.
pub trait Validator: Send + Sync {
    fn validate_block(&self, chain: &dyn ChainView, block: &Block) -> Result<(), ValidationError>;
}

/// The standard rule set.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockValidator;

impl BlockValidator {
    pub fn new() -> Self {
        Self
    }
}

impl Validator for BlockValidator {
    fn validate_block(&self, chain: &dyn ChainView, block: &Block) -> Result<(), ValidationError> {
        let tip = chain.height();
        let height = block.height();

        if height <= tip {
            return Err(ValidationError::BlockAlreadyKnown {
                height,
                hash: block.hash(),
            });
        }

        let expected = tip + 1;
        if height != expected {
            return Err(ValidationError::InvalidHeight {
                got: height,
                expected,
            });
        }

        // height == tip + 1 >= 1, so the parent is the tip and must exist.
        let actual = chain
            .header_at(height - 1)
            .map(Header::hash)
            .unwrap_or(Hash::ZERO);
        if actual != block.header.prev_block_hash {
            return Err(ValidationError::InvalidParentHash {
                height,
                declared: block.header.prev_block_hash,
                actual,
            });
        }

        if !block.verify_signature() {
            return Err(ValidationError::InvalidBlockSignature { height });
        }

        for tx in &block.transactions {
            if let Err(err) = tx.verify() {
                trace!(height, tx = %tx.hash(), %err, "transaction failed verification");
                return Err(ValidationError::InvalidTransactionSignature {
                    height,
                    tx_hash: tx.hash(),
                });
            }
        }

        // An unencodable body cannot match any declared hash.
        let actual = block.compute_data_hash().unwrap_or(Hash::ZERO);
        if actual != block.header.data_hash {
            return Err(ValidationError::DataHashMismatch {
                height,
                declared: block.header.data_hash,
                actual,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::PrivateKey;
    use crate::transaction::Transaction;

    struct Headers(Vec<Header>);

    impl ChainView for Headers {
        fn height(&self) -> u32 {
            (self.0.len() - 1) as u32
        }
        fn header_at(&self, height: u32) -> Option<&Header> {
            self.0.get(height as usize)
        }
    }

    fn chain() -> Headers {
        Headers(vec![Header::genesis()])
    }

    fn next_block(chain: &Headers, key: &PrivateKey, txs: Vec<Transaction>) -> Block {
        let parent = chain.0.last().unwrap();
        let mut block = Block::from_parent(parent, txs).unwrap();
        block.sign(key);
        block
    }

    #[test]
    fn valid_block_passes() {
        let chain = chain();
        let key = PrivateKey::generate();
        let tx = Transaction::new(b"t".to_vec()).signed(&PrivateKey::generate());
        let block = next_block(&chain, &key, vec![tx]);
        assert_eq!(BlockValidator.validate_block(&chain, &block), Ok(()));
    }

    #[test]
    fn genesis_is_already_known() {
        let chain = chain();
        let err = BlockValidator
            .validate_block(&chain, &Block::genesis())
            .unwrap_err();
        assert!(matches!(err, ValidationError::BlockAlreadyKnown { height: 0, .. }));
    }

    #[test]
    fn gap_is_invalid_height() {
        let chain = chain();
        let key = PrivateKey::generate();
        let mut block = next_block(&chain, &key, Vec::new());
        block.header.height = 5;
        block.sign(&key);
        assert_eq!(
            BlockValidator.validate_block(&chain, &block),
            Err(ValidationError::InvalidHeight { got: 5, expected: 1 })
        );
    }

    #[test]
    fn wrong_parent_hash() {
        let chain = chain();
        let key = PrivateKey::generate();
        let mut block = next_block(&chain, &key, Vec::new());
        block.header.prev_block_hash = Hash::from_bytes([7u8; 32]);
        block.sign(&key);
        assert!(matches!(
            BlockValidator.validate_block(&chain, &block),
            Err(ValidationError::InvalidParentHash { height: 1, .. })
        ));
    }

    #[test]
    fn unsigned_block_fails_signature() {
        let chain = chain();
        let block = Block::from_parent(&chain.0[0], Vec::new()).unwrap();
        assert_eq!(
            BlockValidator.validate_block(&chain, &block),
            Err(ValidationError::InvalidBlockSignature { height: 1 })
        );
    }

    #[test]
    fn bad_transaction_is_named() {
        let chain = chain();
        let good = Transaction::new(b"good".to_vec()).signed(&PrivateKey::generate());
        let bad = Transaction::new(b"bad".to_vec());
        let bad_hash = bad.compute_hash();
        let block = next_block(&chain, &PrivateKey::generate(), vec![good, bad]);
        assert_eq!(
            BlockValidator.validate_block(&chain, &block),
            Err(ValidationError::InvalidTransactionSignature {
                height: 1,
                tx_hash: bad_hash,
            })
        );
    }

    #[test]
    fn extra_transaction_breaks_data_hash() {
        let chain = chain();
        let key = PrivateKey::generate();
        let mut block = next_block(&chain, &key, Vec::new());
        block
            .transactions
            .push(Transaction::new(b"smuggled".to_vec()).signed(&PrivateKey::generate()));
        assert!(matches!(
            BlockValidator.validate_block(&chain, &block),
            Err(ValidationError::DataHashMismatch { height: 1, .. })
        ));
    }
}
