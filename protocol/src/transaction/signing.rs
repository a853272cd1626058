// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! Transaction signing.
//!
//! Signing sets `from` to the signer's public key, fixes the content hash and
//! signs the 32 hash bytes. Because `from` is part of the hash it is set
//! *before* the hash is taken.

use super::types::Transaction;
use crate::crypto::keys::PrivateKey;

impl Transaction {
    /// Signs in place with `key`.
    ///
    /// Calling it on an already hashed transaction whose `from` differs from
    /// `key` yields a signature that will not verify: the cached hash predates
    /// the new sender.
    pub fn sign(&mut self, key: &PrivateKey) {
        self.from = Some(key.public_key());
        let hash = self.hash();
        self.signature = Some(key.sign(hash.as_bytes()));
    }

    /// Builder-style variant of [`Transaction::sign`].
    pub fn signed(mut self, key: &PrivateKey) -> Self {
        self.sign(key);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_sets_sender_and_signature() {
        let key = PrivateKey::generate();
        let mut tx = Transaction::new(b"payload".to_vec());
        assert!(!tx.is_signed());

        tx.sign(&key);
        assert!(tx.is_signed());
        assert_eq!(tx.from, Some(key.public_key()));
        assert_eq!(tx.hash(), tx.compute_hash());
    }

    #[test]
    fn signature_is_over_hash_bytes() {
        let key = PrivateKey::from_seed(&[3u8; 32]);
        let tx = Transaction::new(b"p".to_vec()).signed(&key);
        let sig = tx.signature.clone().unwrap();
        assert!(key.public_key().verify(tx.hash().as_bytes(), &sig));
    }
}
