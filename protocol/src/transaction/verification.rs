// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! Transaction verification.
//!
//! The hash is recomputed from the current fields rather than read from the
//! cache. A payload edited after signing therefore no longer matches either
//! the cached hash or the signature.

use thiserror::Error;

use super::types::Transaction;
use crate::crypto::hash::Hash;

/// Reasons a transaction fails [`Transaction::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("transaction is unsigned")]
    MissingSignature,

    #[error("transaction has no sender")]
    MissingSender,

    #[error("content hash {actual} does not match cached hash {cached}")]
    HashMismatch { cached: Hash, actual: Hash },

    #[error("signature does not verify against sender")]
    InvalidSignature,
}

impl Transaction {
    /// Checks the signature against the content hash using `from`.
    pub fn verify(&self) -> Result<(), TransactionError> {
        let signature = self
            .signature
            .as_ref()
            .ok_or(TransactionError::MissingSignature)?;
        let from = self.from.as_ref().ok_or(TransactionError::MissingSender)?;

        let actual = self.compute_hash();
        if let Some(cached) = self.cached_hash() {
            if cached != actual {
                return Err(TransactionError::HashMismatch { cached, actual });
            }
        }

        if !from.verify(actual.as_bytes(), signature) {
            return Err(TransactionError::InvalidSignature);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::PrivateKey;

    fn signed() -> Transaction {
        Transaction::new(b"foo".to_vec())
            .with_nonce(1)
            .signed(&PrivateKey::generate())
    }

    #[test]
    fn unmutated_transaction_verifies() {
        let tx = signed();
        assert_eq!(tx.verify(), Ok(()));
        // Idempotent.
        assert_eq!(tx.verify(), Ok(()));
    }

    #[test]
    fn unsigned_transaction_fails() {
        let tx = Transaction::new(b"foo".to_vec());
        assert_eq!(tx.verify(), Err(TransactionError::MissingSignature));
    }

    #[test]
    fn payload_mutated_after_signing_fails() {
        let mut tx = signed();
        tx.payload = b"bar".to_vec();
        assert!(matches!(tx.verify(), Err(TransactionError::HashMismatch { .. })));
    }

    #[test]
    fn mutation_on_decoded_copy_fails() {
        let tx = signed();
        let mut copy = Transaction::decode(&tx.encode().unwrap()).unwrap();
        assert_eq!(copy.verify(), Ok(()));
        copy.value = 1_000;
        assert!(copy.verify().is_err());
    }

    #[test]
    fn swapped_sender_fails_signature() {
        let mut tx = Transaction::new(b"foo".to_vec());
        tx.sign(&PrivateKey::generate());
        let other = PrivateKey::generate().public_key();

        // Fresh instance so no cached hash masks the change.
        let mut forged = Transaction::new(tx.payload.clone());
        forged.from = Some(other);
        forged.signature = tx.signature.clone();
        assert_eq!(forged.verify(), Err(TransactionError::InvalidSignature));
    }
}
