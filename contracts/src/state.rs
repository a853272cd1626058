// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Contract State
//!
//! Flat key/value store that contract programs write into with the `store`
//! opcode and read back with `get`. Keys are arbitrary byte strings (usually
//! short ASCII names packed on the operand stack), values are raw bytes.
//!
//! The store is owned by the ledger and lives as long as the node process.
//! It has no influence on block validation.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

/// Errors raised by [`ContractState`] lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("contract state key not found: {0}")]
    KeyNotFound(String),
}

/// In-memory contract key/value state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractState {
    data: HashMap<Vec<u8>, Vec<u8>>,
}

impl ContractState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or overwrites `key`.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        debug!(key = %String::from_utf8_lossy(&key), len = value.len(), "contract state put");
        self.data.insert(key, value);
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &[u8]) -> Result<&[u8], StateError> {
        self.data
            .get(key)
            .map(Vec::as_slice)
            .ok_or_else(|| StateError::KeyNotFound(String::from_utf8_lossy(key).into_owned()))
    }

    /// Removes `key`, returning the previous value if there was one.
    pub fn delete(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        let removed = self.data.remove(key);
        if removed.is_none() {
            debug!(key = %String::from_utf8_lossy(key), "delete of missing contract key");
        }
        removed
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True if nothing has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
