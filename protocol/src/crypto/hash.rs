// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Hashing Utilities
//!
//! Every digest in minichain is SHA-256: header hashes, transaction hashes and
//! the block data hash. This module provides the fixed-size [`Hash`] type and
//! the memoization cell entities use to compute their digest at most once.
//!
//! ## The zero sentinel
//!
//! The all-zero hash means "not computed yet". It is what an unhashed entity
//! carries on the wire and what [`HashCache`] treats as empty. A real SHA-256
//! output equal to the zero vector is not a case we plan for.

use std::fmt;
use std::sync::OnceLock;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Length of every digest in bytes.
pub const HASH_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Hash
// ---------------------------------------------------------------------------

/// A 32-byte SHA-256 digest. Equality is byte-wise.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Hash([u8; HASH_LENGTH]);

impl Hash {
    /// The distinguished "unset" value.
    pub const ZERO: Hash = Hash([0u8; HASH_LENGTH]);

    /// Wraps raw digest bytes.
    pub const fn from_bytes(bytes: [u8; HASH_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Builds a hash from a slice, failing unless it is exactly 32 bytes.
    pub fn try_from_slice(slice: &[u8]) -> Option<Self> {
        let bytes: [u8; HASH_LENGTH] = slice.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        &self.0
    }

    /// True for the all-zero sentinel.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_LENGTH]
    }

    /// Lowercase hex, 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Abbreviated hex for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..6])
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.short())
    }
}

// ---------------------------------------------------------------------------
// Hash functions
// ---------------------------------------------------------------------------

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> Hash {
    let digest = Sha256::digest(data);
    let mut out = [0u8; HASH_LENGTH];
    out.copy_from_slice(&digest);
    Hash(out)
}

/// SHA-256 over several slices fed in order, without concatenating them first.
pub fn sha256_multi(parts: &[&[u8]]) -> Hash {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; HASH_LENGTH];
    out.copy_from_slice(&digest);
    Hash(out)
}

// ---------------------------------------------------------------------------
// HashCache
// ---------------------------------------------------------------------------

/// Write-once memo for an entity's digest.
///
/// The first [`get_or_compute`](Self::get_or_compute) stores the result and
/// every later call returns it unchanged, even if the owning entity has been
/// mutated in between. Serialized as a plain [`Hash`], with [`Hash::ZERO`]
/// standing for "not computed".
#[derive(Clone, Default, PartialEq, Eq)]
pub struct HashCache(OnceLock<Hash>);

impl HashCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached digest, computing and storing it on first use.
    pub fn get_or_compute(&self, compute: impl FnOnce() -> Hash) -> Hash {
        *self.0.get_or_init(compute)
    }

    /// The cached digest, if one has been taken.
    pub fn get(&self) -> Option<Hash> {
        self.0.get().copied()
    }
}

impl fmt::Debug for HashCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(h) => write!(f, "HashCache({})", h.short()),
            None => f.write_str("HashCache(unset)"),
        }
    }
}

impl Serialize for HashCache {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.get().unwrap_or(Hash::ZERO).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for HashCache {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hash = Hash::deserialize(deserializer)?;
        let cache = HashCache::new();
        if !hash.is_zero() {
            let _ = cache.0.set(hash);
        }
        Ok(cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        // SHA-256("abc")
        assert_eq!(
            sha256(b"abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn multi_matches_concatenation() {
        assert_eq!(sha256_multi(&[b"ab".as_slice(), b"c".as_slice()]), sha256(b"abc"));
    }

    #[test]
    fn zero_is_default_and_sentinel() {
        assert!(Hash::default().is_zero());
        assert!(!sha256(b"").is_zero());
    }

    #[test]
    fn cache_computes_once() {
        let cache = HashCache::new();
        assert_eq!(cache.get(), None);

        let first = cache.get_or_compute(|| sha256(b"one"));
        let second = cache.get_or_compute(|| sha256(b"two"));
        assert_eq!(first, second);
        assert_eq!(first, sha256(b"one"));
    }

    #[test]
    fn cache_wire_form_uses_zero_sentinel() {
        let unset = HashCache::new();
        let bytes = bincode::serialize(&unset).unwrap();
        assert_eq!(bytes, vec![0u8; HASH_LENGTH]);

        let decoded: HashCache = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded.get(), None);

        let set = HashCache::new();
        set.get_or_compute(|| sha256(b"x"));
        let decoded: HashCache = bincode::deserialize(&bincode::serialize(&set).unwrap()).unwrap();
        assert_eq!(decoded, set);
    }

    #[test]
    fn try_from_slice_checks_length() {
        assert!(Hash::try_from_slice(&[1u8; 31]).is_none());
        assert_eq!(Hash::try_from_slice(&[1u8; 32]), Some(Hash::from_bytes([1u8; 32])));
    }
}
