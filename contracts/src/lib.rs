// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # minichain Contracts
//!
//! The side-data engine for minichain transactions. Payload bytes of every
//! committed transaction are fed to a small stack machine that can do integer
//! arithmetic, pack byte strings, and read/write a flat key/value store.
//!
//! - **vm** - opcode interpreter over an operand stack.
//! - **state** - the contract key/value store the interpreter writes into.
//!
//! The engine is deliberately isolated: it consumes `(program, state)` and
//! returns success or a runtime fault. Nothing it does can make a block
//! valid or invalid.

pub mod state;
pub mod vm;

pub use state::{ContractState, StateError};
pub use vm::{execute, Opcode, Value, Vm, VmError};
