// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Ledger
//!
//! The canonical header chain. Index `i` of the header vector is the header
//! at height `i`; index 0 is genesis and is always present.
//!
//! ## Append paths
//!
//! - [`Ledger::add_block`] validates, persists and appends, then runs the
//!   committed payloads through the contract engine. Both self-produced and
//!   network-received blocks come through here.
//! - [`Ledger::append_without_validation`] persists and appends. Used for
//!   genesis and for bulk catch-up sync.
//!
//! Both paths refuse to append out of sequence, so the height-equals-index
//! invariant holds no matter who calls them.

use std::sync::Arc;

use minichain_contracts::{execute, ContractState};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::block::{Block, Header};
use super::db::{BlockStore, MemoryStore, StorageError};
use super::validator::{BlockValidator, ChainView, ValidationError, Validator};
use crate::crypto::hash::Hash;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("block validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("header not found at height {0}")]
    HeaderNotFound(u32),

    #[error("out-of-sequence append: got height {got}, expected {expected}")]
    OutOfSequence { got: u32, expected: u32 },

    #[error("genesis block must have height 0, got {0}")]
    InvalidGenesis(u32),

    #[error("stored genesis {stored} does not match expected genesis {expected}")]
    GenesisMismatch { stored: Hash, expected: Hash },

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

pub struct Ledger {
    headers: Vec<Header>,
    store: Arc<dyn BlockStore>,
    validator: Box<dyn Validator>,
    contract_state: ContractState,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("height", &self.height())
            .field("contract_keys", &self.contract_state.len())
            .finish()
    }
}

impl Ledger {
    /// Creates a ledger holding `genesis`, persisting it to `store`.
    pub fn new(genesis: Block, store: Arc<dyn BlockStore>) -> LedgerResult<Self> {
        if genesis.height() != 0 {
            return Err(LedgerError::InvalidGenesis(genesis.height()));
        }
        let mut ledger = Self {
            headers: Vec::new(),
            store,
            validator: Box::new(BlockValidator::new()),
            contract_state: ContractState::new(),
        };
        ledger.append_without_validation(&genesis)?;
        Ok(ledger)
    }

    /// Rebuilds a ledger from the blocks already in `store`.
    ///
    /// An empty store yields a fresh ledger. A stored genesis that differs
    /// from [`Block::genesis`] is refused. Headers are reloaded in height
    /// order up to the first missing height and committed payloads are
    /// replayed into the contract state.
    pub fn restore(store: Arc<dyn BlockStore>) -> LedgerResult<Self> {
        let genesis = Block::genesis();
        if let Some(stored) = store.get(0)? {
            if stored.header != genesis.header {
                return Err(LedgerError::GenesisMismatch {
                    stored: stored.hash(),
                    expected: genesis.hash(),
                });
            }
        }

        let mut ledger = Self::new(genesis, Arc::clone(&store))?;
        let mut height = 1;
        while let Some(block) = store.get(height)? {
            ledger.execute_payloads(&block);
            ledger.headers.push(block.header.clone());
            height += 1;
        }
        if ledger.height() > 0 {
            info!(height = ledger.height(), head = %ledger.head_hash(), "ledger restored");
        }
        Ok(ledger)
    }

    /// Standard genesis over an in-memory store.
    pub fn in_memory() -> LedgerResult<Self> {
        Self::new(Block::genesis(), Arc::new(MemoryStore::new()))
    }

    /// Replaces the validation rules.
    pub fn set_validator(&mut self, validator: Box<dyn Validator>) {
        self.validator = validator;
    }

    /// Tip height. Genesis is always present, so this never underflows.
    pub fn height(&self) -> u32 {
        (self.headers.len() - 1) as u32
    }

    /// The tip header.
    pub fn head(&self) -> &Header {
        &self.headers[self.headers.len() - 1]
    }

    pub fn head_hash(&self) -> Hash {
        self.head().hash()
    }

    pub fn get_header(&self, height: u32) -> LedgerResult<&Header> {
        self.headers
            .get(height as usize)
            .ok_or(LedgerError::HeaderNotFound(height))
    }

    /// True iff a block at this height is already held.
    pub fn has_block(&self, block: &Block) -> bool {
        block.height() <= self.height()
    }

    /// Validates and appends `block`, then runs its payloads.
    ///
    /// Payloads execute only once the block is stored and appended, so a
    /// failed append leaves the contract state untouched. Contract faults are
    /// logged and never reject the block.
    pub fn add_block(&mut self, block: &Block) -> LedgerResult<()> {
        self.validator.validate_block(&*self, block)?;
        self.append_without_validation(block)?;
        self.execute_payloads(block);
        Ok(())
    }

    fn execute_payloads(&mut self, block: &Block) {
        for tx in &block.transactions {
            if let Err(fault) = execute(&tx.payload, &mut self.contract_state) {
                warn!(tx = %tx.hash(), %fault, "contract execution fault");
            }
        }
        debug!(keys = self.contract_state.len(), "contract state after block");
    }

    /// Persists and appends `block` with no validation.
    pub fn append_without_validation(&mut self, block: &Block) -> LedgerResult<()> {
        let expected = self.headers.len() as u32;
        if block.height() != expected {
            return Err(LedgerError::OutOfSequence {
                got: block.height(),
                expected,
            });
        }

        self.store.put(block)?;
        self.headers.push(block.header.clone());

        info!(
            height = block.height(),
            hash = %block.hash(),
            txs = block.transactions.len(),
            "block appended"
        );
        Ok(())
    }

    /// Reads a full block back from the store. Only catch-up sync needs this.
    pub fn get_block(&self, height: u32) -> LedgerResult<Block> {
        if height > self.height() {
            return Err(LedgerError::HeaderNotFound(height));
        }
        self.store
            .get(height)?
            .ok_or(LedgerError::HeaderNotFound(height))
    }

    /// Blocks `from..=height()` in order, as sent in a `SyncBlocks` reply.
    pub fn blocks_from(&self, from: u32) -> LedgerResult<Vec<Block>> {
        (from..=self.height()).map(|h| self.get_block(h)).collect()
    }

    pub fn contract_state(&self) -> &ContractState {
        &self.contract_state
    }
}

impl ChainView for Ledger {
    fn height(&self) -> u32 {
        Ledger::height(self)
    }

    fn header_at(&self, height: u32) -> Option<&Header> {
        self.headers.get(height as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::PrivateKey;
    use crate::transaction::Transaction;

    fn produce(ledger: &Ledger, key: &PrivateKey, txs: Vec<Transaction>) -> Block {
        let mut block = Block::from_parent(ledger.head(), txs).unwrap();
        block.sign(key);
        block
    }

    #[test]
    fn new_ledger_holds_genesis() {
        let ledger = Ledger::in_memory().unwrap();
        assert_eq!(ledger.height(), 0);
        assert_eq!(ledger.get_header(0).unwrap(), &Header::genesis());
        assert!(matches!(ledger.get_header(1), Err(LedgerError::HeaderNotFound(1))));
    }

    #[test]
    fn non_zero_genesis_is_rejected() {
        let mut block = Block::genesis();
        block.header.height = 3;
        let err = Ledger::new(block, Arc::new(MemoryStore::new())).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidGenesis(3)));
    }

    #[test]
    fn add_block_grows_height_by_one() {
        let mut ledger = Ledger::in_memory().unwrap();
        let key = PrivateKey::generate();
        for expected in 1..=5u32 {
            let block = produce(&ledger, &key, Vec::new());
            ledger.add_block(&block).unwrap();
            assert_eq!(ledger.height(), expected);
            assert_eq!(ledger.get_header(expected).unwrap(), &block.header);
        }
    }

    #[test]
    fn duplicate_block_is_already_known() {
        let mut ledger = Ledger::in_memory().unwrap();
        let block = produce(&ledger, &PrivateKey::generate(), Vec::new());
        ledger.add_block(&block).unwrap();
        let err = ledger.add_block(&block).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Validation(ValidationError::BlockAlreadyKnown { height: 1, .. })
        ));
        assert_eq!(ledger.height(), 1);
    }

    #[test]
    fn blocks_are_persisted_and_served() {
        let store = Arc::new(MemoryStore::new());
        let mut ledger = Ledger::new(Block::genesis(), store.clone()).unwrap();
        let key = PrivateKey::generate();
        let b1 = produce(&ledger, &key, Vec::new());
        ledger.add_block(&b1).unwrap();
        let b2 = produce(&ledger, &key, Vec::new());
        ledger.add_block(&b2).unwrap();

        assert_eq!(store.len(), 3);
        let served = ledger.blocks_from(1).unwrap();
        assert_eq!(served, vec![b1, b2]);
        assert!(ledger.get_block(9).is_err());
    }

    #[test]
    fn unvalidated_append_still_checks_sequence() {
        let mut ledger = Ledger::in_memory().unwrap();
        let mut block = Block::from_parent(ledger.head(), Vec::new()).unwrap();
        block.header.height = 2;
        assert!(matches!(
            ledger.append_without_validation(&block),
            Err(LedgerError::OutOfSequence { got: 2, expected: 1 })
        ));

        // Unsigned but in sequence: accepted on this path.
        let block = Block::from_parent(ledger.head(), Vec::new()).unwrap();
        ledger.append_without_validation(&block).unwrap();
        assert_eq!(ledger.height(), 1);
    }

    #[test]
    fn restore_reloads_stored_chain() {
        let store = Arc::new(MemoryStore::new());
        let mut ledger = Ledger::new(Block::genesis(), store.clone()).unwrap();
        let key = PrivateKey::generate();
        for _ in 0..3 {
            let block = produce(&ledger, &key, Vec::new());
            ledger.add_block(&block).unwrap();
        }

        let restored = Ledger::restore(store).unwrap();
        assert_eq!(restored.height(), 3);
        assert_eq!(restored.head_hash(), ledger.head_hash());

        let empty = Ledger::restore(Arc::new(MemoryStore::new())).unwrap();
        assert_eq!(empty.height(), 0);
    }

    #[test]
    fn restore_refuses_foreign_genesis() {
        let store = Arc::new(MemoryStore::new());
        let mut foreign = Block::genesis();
        foreign.header.timestamp = 42;
        store.put(&foreign).unwrap();

        let err = Ledger::restore(store).unwrap_err();
        assert!(matches!(err, LedgerError::GenesisMismatch { .. }));
    }

    #[test]
    fn payloads_run_against_contract_state() {
        let mut ledger = Ledger::in_memory().unwrap();
        // push 1, push 'F', pack 1 => store 1 under "F"
        let program = vec![0x01, 0x0a, 0x46, 0x0c, 0x01, 0x0a, 0x0d, 0x0f];
        let tx = Transaction::new(program).signed(&PrivateKey::generate());
        let block = produce(&ledger, &PrivateKey::generate(), vec![tx]);
        ledger.add_block(&block).unwrap();

        assert_eq!(
            ledger.contract_state().get(b"F").unwrap(),
            1i64.to_le_bytes().as_slice()
        );
    }

    /// Stores genesis, then refuses everything after it.
    struct GenesisOnlyStore(MemoryStore);

    impl BlockStore for GenesisOnlyStore {
        fn put(&self, block: &Block) -> Result<(), StorageError> {
            if block.height() > 0 {
                return Err(StorageError::Sled(sled::Error::Unsupported("read-only".into())));
            }
            self.0.put(block)
        }

        fn get(&self, height: u32) -> Result<Option<Block>, StorageError> {
            self.0.get(height)
        }
    }

    #[test]
    fn failed_persist_leaves_contract_state_untouched() {
        let store = Arc::new(GenesisOnlyStore(MemoryStore::new()));
        let mut ledger = Ledger::new(Block::genesis(), store).unwrap();
        let program = vec![0x01, 0x0a, 0x46, 0x0c, 0x01, 0x0a, 0x0d, 0x0f];
        let tx = Transaction::new(program).signed(&PrivateKey::generate());
        let block = produce(&ledger, &PrivateKey::generate(), vec![tx]);

        let err = ledger.add_block(&block).unwrap_err();
        assert!(matches!(err, LedgerError::Storage(_)));
        assert_eq!(ledger.height(), 0);
        assert!(ledger.contract_state().is_empty());
    }

    #[test]
    fn contract_fault_does_not_reject_block() {
        let mut ledger = Ledger::in_memory().unwrap();
        let tx = Transaction::new(vec![0x0b]).signed(&PrivateKey::generate());
        let block = produce(&ledger, &PrivateKey::generate(), vec![tx]);
        ledger.add_block(&block).unwrap();
        assert_eq!(ledger.height(), 1);
        assert!(ledger.contract_state().is_empty());
    }
}
