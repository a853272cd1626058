// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Block Structure
//!
//! A block is a signed [`Header`] plus the ordered transactions it commits to.
//!
//! ## Block Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │  Header                                      │
//! │  ├── version: u32                            │
//! │  ├── prev_block_hash: Hash  (parent header)  │
//! │  ├── data_hash: Hash        (tx commitment)  │
//! │  ├── timestamp: i64         (unix nanos)     │
//! │  ├── nonce: u32                              │
//! │  └── height: u32                             │
//! ├──────────────────────────────────────────────┤
//! │  transactions: Vec<Transaction>              │
//! │  validator: PublicKey                        │
//! │  signature: Signature   (over header bytes)  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Hash Computation
//!
//! The header hash is SHA-256 over [`Header::to_bytes`], a fixed 56-byte
//! little-endian layout. The validator signs those same bytes, so the
//! signature covers the transactions only indirectly through `data_hash`.
//!
//! `data_hash` is SHA-256 over the concatenated wire encodings of the
//! transactions, in block order.
//!
//! The cached block hash travels with the encoding. Decoding refuses a record
//! whose cached hash is set and differs from the hash of its header.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{self, CodecError};
use crate::crypto::hash::{sha256, Hash, HashCache};
use crate::crypto::keys::{PrivateKey, PublicKey, Signature};
use crate::transaction::Transaction;

/// Header version written by this implementation.
pub const BLOCK_VERSION: u32 = 1;

/// Serialized size of a header.
pub const HEADER_BYTES: usize = 4 + 32 + 32 + 8 + 4 + 4;

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Block metadata. This is what the ledger keeps in memory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub version: u32,
    pub prev_block_hash: Hash,
    pub data_hash: Hash,
    /// Unix nanoseconds at production time. Zero for genesis.
    pub timestamp: i64,
    pub nonce: u32,
    pub height: u32,
}

impl Header {
    /// The genesis header: version 1, height 0, zero hashes, zero timestamp.
    pub fn genesis() -> Self {
        Self {
            version: BLOCK_VERSION,
            prev_block_hash: Hash::ZERO,
            data_hash: Hash::ZERO,
            timestamp: 0,
            nonce: 0,
            height: 0,
        }
    }

    /// Canonical bytes that are hashed and signed.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_BYTES);
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(self.prev_block_hash.as_bytes());
        buf.extend_from_slice(self.data_hash.as_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        buf.extend_from_slice(&self.height.to_le_bytes());
        buf
    }

    /// SHA-256 of [`Header::to_bytes`]. Always recomputed.
    pub fn hash(&self) -> Hash {
        sha256(&self.to_bytes())
    }
}

/// Commitment over a transaction list: SHA-256 of the concatenated encodings.
pub fn data_hash(transactions: &[Transaction]) -> Result<Hash, CodecError> {
    let mut buf = Vec::new();
    for tx in transactions {
        buf.extend_from_slice(&tx.encode()?);
    }
    Ok(sha256(&buf))
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// A decoded block whose cached hash is not its header's hash.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("block {height} carries hash {declared}, header hashes to {actual}")]
pub struct ForgedBlockHash {
    pub height: u32,
    pub declared: Hash,
    pub actual: Hash,
}

/// Wire shape of [`Block`], checked before it becomes one.
#[derive(Deserialize)]
struct BlockRecord {
    header: Header,
    transactions: Vec<Transaction>,
    validator: Option<PublicKey>,
    signature: Option<Signature>,
    hash: HashCache,
}

impl TryFrom<BlockRecord> for Block {
    type Error = ForgedBlockHash;

    fn try_from(record: BlockRecord) -> Result<Self, Self::Error> {
        if let Some(declared) = record.hash.get() {
            let actual = record.header.hash();
            if declared != actual {
                return Err(ForgedBlockHash {
                    height: record.header.height,
                    declared,
                    actual,
                });
            }
        }
        Ok(Self {
            header: record.header,
            transactions: record.transactions,
            validator: record.validator,
            signature: record.signature,
            hash: record.hash,
        })
    }
}

/// A full block: header, transactions, and the validator's signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BlockRecord")]
pub struct Block {
    pub header: Header,
    pub transactions: Vec<Transaction>,
    /// Producer's public key. `None` only for genesis.
    pub validator: Option<PublicKey>,
    /// Signature over the header bytes. `None` only for genesis.
    pub signature: Option<Signature>,
    hash: HashCache,
}

impl Block {
    pub fn new(header: Header, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
            validator: None,
            signature: None,
            hash: HashCache::new(),
        }
    }

    /// The unsigned, empty genesis block.
    pub fn genesis() -> Self {
        Self::new(Header::genesis(), Vec::new())
    }

    /// Builds an unsigned block extending `parent`: height + 1, parent hash
    /// linked, current timestamp, data hash over `transactions`.
    pub fn from_parent(parent: &Header, transactions: Vec<Transaction>) -> Result<Self, CodecError> {
        let header = Header {
            version: BLOCK_VERSION,
            prev_block_hash: parent.hash(),
            data_hash: data_hash(&transactions)?,
            timestamp: Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX),
            nonce: 0,
            height: parent.height + 1,
        };
        Ok(Self::new(header, transactions))
    }

    pub fn height(&self) -> u32 {
        self.header.height
    }

    /// Memoized header hash.
    pub fn hash(&self) -> Hash {
        self.hash.get_or_compute(|| self.header.hash())
    }

    pub fn cached_hash(&self) -> Option<Hash> {
        self.hash.get()
    }

    /// Signs the header bytes with `key` and records the validator.
    pub fn sign(&mut self, key: &PrivateKey) {
        self.signature = Some(key.sign(&self.header.to_bytes()));
        self.validator = Some(key.public_key());
    }

    /// True iff both validator and signature are present and the signature
    /// verifies over the header bytes.
    pub fn verify_signature(&self) -> bool {
        match (&self.validator, &self.signature) {
            (Some(validator), Some(signature)) => {
                validator.verify(&self.header.to_bytes(), signature)
            }
            _ => false,
        }
    }

    /// Recomputes the data hash over the carried transactions.
    pub fn compute_data_hash(&self) -> Result<Hash, CodecError> {
        data_hash(&self.transactions)
    }

    /// Wire encoding. Fills the block and transaction hash caches first so
    /// every cached value travels with the record.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        self.hash();
        for tx in &self.transactions {
            tx.hash();
        }
        codec::encode(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        codec::decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signed_tx(payload: &[u8]) -> Transaction {
        Transaction::new(payload.to_vec()).signed(&PrivateKey::generate())
    }

    #[test]
    fn genesis_is_deterministic() {
        let a = Block::genesis();
        let b = Block::genesis();
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.height(), 0);
        assert!(a.header.prev_block_hash.is_zero());
        assert!(a.validator.is_none());
    }

    #[test]
    fn header_bytes_have_fixed_size() {
        assert_eq!(Header::genesis().to_bytes().len(), HEADER_BYTES);
    }

    #[test]
    fn from_parent_links_to_parent() {
        let genesis = Header::genesis();
        let block = Block::from_parent(&genesis, vec![signed_tx(b"a")]).unwrap();
        assert_eq!(block.height(), 1);
        assert_eq!(block.header.prev_block_hash, genesis.hash());
        assert_eq!(block.header.data_hash, block.compute_data_hash().unwrap());
        assert!(block.header.timestamp > 0);
    }

    #[test]
    fn signature_covers_header() {
        let key = PrivateKey::generate();
        let mut block = Block::from_parent(&Header::genesis(), Vec::new()).unwrap();
        assert!(!block.verify_signature());

        block.sign(&key);
        assert!(block.verify_signature());
        // Idempotent.
        assert!(block.verify_signature());

        block.header.nonce += 1;
        assert!(!block.verify_signature());
    }

    #[test]
    fn foreign_validator_field_fails() {
        let mut block = Block::from_parent(&Header::genesis(), Vec::new()).unwrap();
        block.sign(&PrivateKey::generate());
        block.validator = Some(PrivateKey::generate().public_key());
        assert!(!block.verify_signature());
    }

    #[test]
    fn block_hash_is_memoized() {
        let mut block = Block::from_parent(&Header::genesis(), Vec::new()).unwrap();
        let first = block.hash();
        block.header.nonce = 99;
        assert_eq!(block.hash(), first);
        assert_ne!(block.header.hash(), first);
    }

    #[test]
    fn data_hash_depends_on_order() {
        let a = signed_tx(b"a");
        let b = signed_tx(b"b");
        let ab = data_hash(&[a.clone(), b.clone()]).unwrap();
        let ba = data_hash(&[b, a]).unwrap();
        assert_ne!(ab, ba);
    }

    #[test]
    fn encode_decode_preserves_every_field() {
        let key = PrivateKey::generate();
        let mut block =
            Block::from_parent(&Header::genesis(), vec![signed_tx(b"x"), signed_tx(b"y")]).unwrap();
        block.sign(&key);

        let decoded = Block::decode(&block.encode().unwrap()).unwrap();
        assert_eq!(decoded, block);
        assert_eq!(decoded.cached_hash(), Some(block.hash()));
        assert!(decoded.verify_signature());
    }

    fn overwrite_trailing_hash(bytes: &mut [u8]) {
        let len = bytes.len();
        bytes[len - 32..].fill(0xab);
    }

    #[test]
    fn decode_refuses_foreign_cached_hash() {
        let mut block = Block::from_parent(&Header::genesis(), vec![signed_tx(b"x")]).unwrap();
        block.sign(&PrivateKey::generate());
        let mut bytes = block.encode().unwrap();
        overwrite_trailing_hash(&mut bytes);

        let err = Block::decode(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }

    #[test]
    fn forged_block_inside_batch_fails_the_batch() {
        let key = PrivateKey::generate();
        let mut first = Block::from_parent(&Header::genesis(), Vec::new()).unwrap();
        first.sign(&key);
        let mut second = Block::from_parent(&first.header, Vec::new()).unwrap();
        second.sign(&key);
        first.hash();
        second.hash();

        let mut bytes = codec::encode(&vec![first, second]).unwrap();
        overwrite_trailing_hash(&mut bytes);
        assert!(codec::decode::<Vec<Block>>(&bytes).is_err());
    }

    #[test]
    fn unset_cached_hash_decodes() {
        let block = Block::from_parent(&Header::genesis(), Vec::new()).unwrap();
        let bytes = codec::encode(&block).unwrap();
        let decoded = Block::decode(&bytes).unwrap();
        assert_eq!(decoded.cached_hash(), None);
        assert_eq!(decoded.hash(), block.header.hash());
    }
}
