// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Block Storage
//!
//! The ledger keeps only headers in memory. Full blocks are handed to a
//! [`BlockStore`] as they are appended. Two stores ship:
//!
//! - [`MemoryStore`]: a map behind a lock, for tests and throwaway nodes.
//! - [`SledStore`]: an embedded sled database for nodes with a data directory.
//!
//! ## Tree Layout (sled)
//!
//! | Tree     | Key               | Value           |
//! |----------|-------------------|-----------------|
//! | `blocks` | `height` (4B BE)  | encoded `Block` |
//!
//! Heights are big-endian so sled's lexicographic order matches numeric
//! order.
//!
//! ## Read path
//!
//! Only [`BlockStore::get`] reads anything back: to answer a peer's
//! `GetBlocks` during catch-up sync, and to rebuild the ledger on restart.
//! Validation never touches the store.

use std::collections::HashMap;
use std::path::Path;

use parking_lot::RwLock;
use sled::{Db, Tree};
use thiserror::Error;
use tracing::debug;

use super::block::Block;
use crate::codec::CodecError;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

pub type StorageResult<T> = Result<T, StorageError>;

// ---------------------------------------------------------------------------
// BlockStore
// ---------------------------------------------------------------------------

/// Sink for appended blocks.
pub trait BlockStore: Send + Sync {
    /// Persists `block`, replacing whatever was stored at its height.
    fn put(&self, block: &Block) -> StorageResult<()>;

    /// Reads back the block at `height`.
    fn get(&self, height: u32) -> StorageResult<Option<Block>>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MemoryStore {
    blocks: RwLock<HashMap<u32, Block>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }
}

impl BlockStore for MemoryStore {
    fn put(&self, block: &Block) -> StorageResult<()> {
        self.blocks.write().insert(block.height(), block.clone());
        Ok(())
    }

    fn get(&self, height: u32) -> StorageResult<Option<Block>> {
        Ok(self.blocks.read().get(&height).cloned())
    }
}

// ---------------------------------------------------------------------------
// SledStore
// ---------------------------------------------------------------------------

/// sled-backed block store. Cheap to clone; all clones share one database.
#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
    blocks: Tree,
}

impl SledStore {
    /// Opens or creates a database under `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        Self::from_db(sled::open(path)?)
    }

    /// A database removed on drop. For tests.
    pub fn open_temporary() -> StorageResult<Self> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: Db) -> StorageResult<Self> {
        let blocks = db.open_tree("blocks")?;
        Ok(Self { db, blocks })
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn flush(&self) -> StorageResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl BlockStore for SledStore {
    fn put(&self, block: &Block) -> StorageResult<()> {
        let key = block.height().to_be_bytes();
        let bytes = block.encode()?;
        self.blocks.insert(key, bytes)?;
        debug!(height = block.height(), hash = %block.hash(), "block persisted");
        Ok(())
    }

    fn get(&self, height: u32) -> StorageResult<Option<Block>> {
        match self.blocks.get(height.to_be_bytes())? {
            Some(bytes) => Ok(Some(Block::decode(&bytes)?)),
            None => Ok(None),
        }
    }
}
