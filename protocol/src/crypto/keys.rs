// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Key Management
//!
//! Ed25519 keys for the validator and for transaction senders.
//!
//! Three types cover the whole contract the ledger needs from the curve:
//!
//! - [`PrivateKey`]: generate, sign, derive the public half.
//! - [`PublicKey`]: 32-byte compressed point. Identifies a validator or an
//!   account, and verifies signatures.
//! - [`Signature`]: 64 opaque bytes on the wire.
//!
//! ## Security considerations
//!
//! - Generation uses `OsRng`.
//! - `PrivateKey` has no `Serialize` impl and its `Debug` prints only the
//!   public half. Export goes through [`PrivateKey::to_hex`] on purpose.

use std::fmt;

use ed25519_dalek::{
    Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH,
    SIGNATURE_LENGTH,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Byte length of a compressed public key.
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Errors raised while parsing key material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("invalid secret key: expected 32 hex-encoded bytes")]
    InvalidSecretKey,

    #[error("invalid public key bytes: not a valid Ed25519 point")]
    InvalidPublicKey,

    #[error("invalid signature encoding")]
    InvalidSignature,
}

// ---------------------------------------------------------------------------
// PrivateKey
// ---------------------------------------------------------------------------

/// An Ed25519 signing key.
pub struct PrivateKey {
    signing_key: SigningKey,
}

impl PrivateKey {
    /// Fresh key from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic key from a 32-byte seed. Handy in tests.
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Parses a hex-encoded 32-byte secret, the format used in config files.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s.trim()).map_err(|_| KeyError::InvalidSecretKey)?;
        let seed: [u8; SECRET_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidSecretKey)?;
        Ok(Self::from_seed(&seed))
    }

    /// Hex-encoded secret. Do not log the result.
    pub fn to_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Signs arbitrary bytes. Ed25519 signatures are deterministic.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes().to_vec())
    }
}

impl Clone for PrivateKey {
    fn clone(&self) -> Self {
        Self::from_seed(&self.signing_key.to_bytes())
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey(pub={})", self.public_key().short())
    }
}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

/// Compressed Ed25519 public key.
///
/// Stored as raw bytes; whether they form a valid curve point is only checked
/// at verification time, so a garbage key simply never verifies.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PublicKey([u8; PUBLIC_KEY_LENGTH]);

impl PublicKey {
    pub const fn from_bytes(bytes: [u8; PUBLIC_KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Parses a slice, rejecting wrong lengths and non-points.
    pub fn try_from_slice(slice: &[u8]) -> Result<Self, KeyError> {
        let bytes: [u8; PUBLIC_KEY_LENGTH] =
            slice.try_into().map_err(|_| KeyError::InvalidPublicKey)?;
        VerifyingKey::from_bytes(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self(bytes))
    }

    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s.trim()).map_err(|_| KeyError::InvalidPublicKey)?;
        Self::try_from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }

    /// True iff `signature` is a valid signature of `message` under this key.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        let Ok(key) = VerifyingKey::from_bytes(&self.0) else {
            return false;
        };
        let Some(sig) = signature.to_dalek() else {
            return false;
        };
        key.verify(message, &sig).is_ok()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.short())
    }
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// Ed25519 signature. Always 64 bytes when produced locally; anything
/// else arriving from the wire just fails verification.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(Vec<u8>);

impl Signature {
    pub fn from_bytes(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Self(bytes.to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|_| KeyError::InvalidSignature)?;
        if bytes.len() != SIGNATURE_LENGTH {
            return Err(KeyError::InvalidSignature);
        }
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Verifies against `public_key`. Mirror of [`PublicKey::verify`].
    pub fn verify(&self, message: &[u8], public_key: &PublicKey) -> bool {
        public_key.verify(message, self)
    }

    fn to_dalek(&self) -> Option<DalekSignature> {
        let bytes: [u8; SIGNATURE_LENGTH] = self.0.as_slice().try_into().ok()?;
        Some(DalekSignature::from_bytes(&bytes))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = self.to_hex();
        if hex_str.len() > 16 {
            write!(f, "Signature({}..)", &hex_str[..16])
        } else {
            write!(f, "Signature({hex_str})")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let key = PrivateKey::generate();
        let sig = key.sign(b"hello");
        assert!(sig.verify(b"hello", &key.public_key()));
        assert!(!sig.verify(b"hellO", &key.public_key()));
    }

    #[test]
    fn other_key_does_not_verify() {
        let a = PrivateKey::generate();
        let b = PrivateKey::generate();
        let sig = a.sign(b"msg");
        assert!(!b.public_key().verify(b"msg", &sig));
    }

    #[test]
    fn hex_round_trip_keeps_identity() {
        let key = PrivateKey::generate();
        let restored = PrivateKey::from_hex(&key.to_hex()).unwrap();
        assert_eq!(key.public_key(), restored.public_key());

        let pk = PublicKey::from_hex(&key.public_key().to_hex()).unwrap();
        assert_eq!(pk, key.public_key());
    }

    #[test]
    fn from_hex_rejects_bad_input() {
        assert_eq!(PrivateKey::from_hex("abcd").unwrap_err(), KeyError::InvalidSecretKey);
        assert!(PrivateKey::from_hex("zz").is_err());
        assert_eq!(PublicKey::try_from_slice(&[1u8; 5]), Err(KeyError::InvalidPublicKey));
    }

    #[test]
    fn truncated_signature_fails_cleanly() {
        let key = PrivateKey::from_seed(&[7u8; 32]);
        let sig = key.sign(b"m");
        let short = Signature(sig.as_bytes()[..10].to_vec());
        assert!(!key.public_key().verify(b"m", &short));
    }

    #[test]
    fn debug_hides_secret() {
        let key = PrivateKey::from_seed(&[9u8; 32]);
        let dbg = format!("{key:?}");
        assert!(!dbg.contains(&key.to_hex()));
        assert!(dbg.starts_with("PrivateKey(pub="));
    }
}
