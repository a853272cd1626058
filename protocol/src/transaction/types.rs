// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! The [`Transaction`] record and its content hash.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::codec::{self, CodecError};
use crate::crypto::hash::{sha256, Hash, HashCache};
use crate::crypto::keys::{PublicKey, Signature};

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A signed request to move `value` from `from` to `to`, optionally carrying
/// a contract program in `payload`.
///
/// The identity of a transaction is [`Transaction::hash`], a SHA-256 over
/// [`Transaction::content_bytes`]. Neither the signature, `first_seen` nor the
/// cached hash itself take part in it, so re-stamping or re-signing never
/// changes which transaction this is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Opaque side-data, run through the contract engine once committed.
    pub payload: Vec<u8>,

    /// Recipient. `None` for payload-only transactions.
    pub to: Option<PublicKey>,

    /// Sender. Filled in by [`Transaction::sign`].
    pub from: Option<PublicKey>,

    pub value: u64,

    pub nonce: u64,

    /// Ed25519 signature over the hash bytes.
    pub signature: Option<Signature>,

    /// Unix nanoseconds of the first local observation. Used to order the
    /// mempool drain; zero until stamped.
    pub first_seen: i64,

    hash: HashCache,
}

impl Transaction {
    /// An unsigned transaction carrying only `payload`.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            to: None,
            from: None,
            value: 0,
            nonce: 0,
            signature: None,
            first_seen: 0,
            hash: HashCache::new(),
        }
    }

    pub fn with_transfer(mut self, to: PublicKey, value: u64) -> Self {
        self.to = Some(to);
        self.value = value;
        self
    }

    pub fn with_nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    /// Canonical bytes covered by the hash: length-prefixed payload, optional
    /// recipient, optional sender, then value and nonce as little-endian u64.
    pub fn content_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.payload.len() + 96);

        buf.extend_from_slice(&(self.payload.len() as u64).to_le_bytes());
        buf.extend_from_slice(&self.payload);

        for key in [&self.to, &self.from] {
            match key {
                Some(pk) => {
                    buf.push(0x01);
                    buf.extend_from_slice(pk.as_bytes());
                }
                None => buf.push(0x00),
            }
        }

        buf.extend_from_slice(&self.value.to_le_bytes());
        buf.extend_from_slice(&self.nonce.to_le_bytes());
        buf
    }

    /// Hash of the current field values, ignoring the cache.
    pub fn compute_hash(&self) -> Hash {
        sha256(&self.content_bytes())
    }

    /// Memoized content hash. The first call fixes the value for the lifetime
    /// of this instance.
    pub fn hash(&self) -> Hash {
        self.hash.get_or_compute(|| self.compute_hash())
    }

    /// The cached hash without computing it.
    pub fn cached_hash(&self) -> Option<Hash> {
        self.hash.get()
    }

    pub fn set_first_seen(&mut self, unix_nanos: i64) {
        self.first_seen = unix_nanos;
    }

    /// Stamps `first_seen` with the current wall clock.
    pub fn mark_seen_now(&mut self) {
        self.first_seen = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Wire encoding. Takes the hash first so it travels with the record.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        self.hash();
        codec::encode(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        codec::decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::PrivateKey;

    #[test]
    fn hash_covers_content_fields_only() {
        let to = PrivateKey::from_seed(&[1u8; 32]).public_key();
        let a = Transaction::new(b"data".to_vec()).with_transfer(to, 10).with_nonce(1);
        let mut b = a.clone();
        b.first_seen = 1234;
        assert_eq!(a.compute_hash(), b.compute_hash());

        let c = a.clone().with_nonce(2);
        assert_ne!(a.compute_hash(), c.compute_hash());
    }

    #[test]
    fn hash_is_memoized_across_mutation() {
        let mut tx = Transaction::new(b"one".to_vec());
        let first = tx.hash();
        tx.payload = b"two".to_vec();
        assert_eq!(tx.hash(), first);
        assert_ne!(tx.compute_hash(), first);
    }

    #[test]
    fn encode_carries_cached_hash() {
        let tx = Transaction::new(b"x".to_vec()).with_nonce(9);
        assert!(tx.cached_hash().is_none());

        let decoded = Transaction::decode(&tx.encode().unwrap()).unwrap();
        assert_eq!(decoded.cached_hash(), Some(tx.compute_hash()));
        assert_eq!(decoded, tx);
    }

    #[test]
    fn mark_seen_sets_a_positive_timestamp() {
        let mut tx = Transaction::new(Vec::new());
        assert_eq!(tx.first_seen, 0);
        tx.mark_seen_now();
        assert!(tx.first_seen > 0);
    }
}
