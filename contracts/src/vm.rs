// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Bytecode Engine
//!
//! A tiny stack machine that runs the payload of a committed transaction
//! against the [`ContractState`]. It exists so transactions can carry
//! side-data ("write 1 under key FOO") without the ledger having to
//! understand it.
//!
//! ## Encoding
//!
//! A program is a flat byte string. Each byte is inspected in order; if it is
//! one of the opcodes below it executes, otherwise it is treated as an
//! operand and skipped. Push opcodes take the byte *immediately before them*
//! as their operand:
//!
//! ```text
//! 0x01 0x0a 0x03 0x0a 0x0b   => push 1, push 3, add        (stack: [4])
//! 0x46 0x0c 0x01 0x0a 0x0d   => push 'F', push 1, pack     (stack: ["F"])
//! ```
//!
//! | Opcode | Name      | Effect                                                   |
//! |--------|-----------|----------------------------------------------------------|
//! | `0x0a` | push-int  | push the preceding byte as an integer                    |
//! | `0x0b` | add       | pop a, pop b, push a + b                                 |
//! | `0x0c` | push-byte | push the preceding byte as a byte                        |
//! | `0x0d` | pack      | pop n, pop n bytes into a byte string (pop order)        |
//! | `0x0e` | sub       | pop a, pop b, push a - b                                 |
//! | `0x0f` | store     | pop key, pop value, write value under key                |
//! | `0x10` | get       | pop key, push the stored bytes                           |
//! | `0x11` | mul       | pop a, pop b, push a * b                                 |
//! | `0x12` | div       | pop a, pop b, push a / b                                 |
//!
//! Integers are stored as 8-byte little-endian values.

use thiserror::Error;
use tracing::trace;

use crate::state::ContractState;

/// Maximum operand stack depth.
pub const STACK_LIMIT: usize = 1024;

// ---------------------------------------------------------------------------
// Opcodes
// ---------------------------------------------------------------------------

/// Instruction set understood by [`Vm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    PushInt = 0x0a,
    Add = 0x0b,
    PushByte = 0x0c,
    Pack = 0x0d,
    Sub = 0x0e,
    Store = 0x0f,
    Get = 0x10,
    Mul = 0x11,
    Div = 0x12,
}

impl Opcode {
    /// Decodes a byte into an opcode. Non-opcode bytes are operands.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x0a => Some(Self::PushInt),
            0x0b => Some(Self::Add),
            0x0c => Some(Self::PushByte),
            0x0d => Some(Self::Pack),
            0x0e => Some(Self::Sub),
            0x0f => Some(Self::Store),
            0x10 => Some(Self::Get),
            0x11 => Some(Self::Mul),
            0x12 => Some(Self::Div),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Values and faults
// ---------------------------------------------------------------------------

/// A value on the operand stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Byte(u8),
    Bytes(Vec<u8>),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Byte(_) => "byte",
            Value::Bytes(_) => "bytes",
        }
    }
}

/// Runtime faults. A fault aborts the program; writes already made to the
/// state are kept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    #[error("stack underflow at ip {ip}")]
    StackUnderflow { ip: usize },

    #[error("stack overflow at ip {ip}")]
    StackOverflow { ip: usize },

    #[error("type mismatch at ip {ip}: expected {expected}, found {found}")]
    TypeMismatch {
        ip: usize,
        expected: &'static str,
        found: &'static str,
    },

    #[error("opcode at ip {ip} has no preceding operand")]
    MissingOperand { ip: usize },

    #[error("division by zero at ip {ip}")]
    DivisionByZero { ip: usize },

    #[error("arithmetic overflow at ip {ip}")]
    Overflow { ip: usize },

    #[error("pack length {len} at ip {ip} is negative")]
    InvalidPackLength { ip: usize, len: i64 },

    #[error("key not found at ip {ip}: {key}")]
    KeyNotFound { ip: usize, key: String },
}

// ---------------------------------------------------------------------------
// Vm
// ---------------------------------------------------------------------------

/// One program execution over a borrowed contract state.
pub struct Vm<'a> {
    program: &'a [u8],
    stack: Vec<Value>,
    ip: usize,
    state: &'a mut ContractState,
}

impl<'a> Vm<'a> {
    pub fn new(program: &'a [u8], state: &'a mut ContractState) -> Self {
        Self {
            program,
            stack: Vec::new(),
            ip: 0,
            state,
        }
    }

    /// Runs the program to completion. An empty program succeeds trivially.
    pub fn run(&mut self) -> Result<(), VmError> {
        while self.ip < self.program.len() {
            if let Some(op) = Opcode::from_byte(self.program[self.ip]) {
                trace!(ip = self.ip, ?op, depth = self.stack.len(), "exec");
                self.exec(op)?;
            }
            self.ip += 1;
        }
        Ok(())
    }

    /// Current operand stack, bottom first.
    pub fn stack(&self) -> &[Value] {
        &self.stack
    }

    /// Pops the top of the stack.
    pub fn pop(&mut self) -> Result<Value, VmError> {
        self.stack
            .pop()
            .ok_or(VmError::StackUnderflow { ip: self.ip })
    }

    fn push(&mut self, value: Value) -> Result<(), VmError> {
        if self.stack.len() >= STACK_LIMIT {
            return Err(VmError::StackOverflow { ip: self.ip });
        }
        self.stack.push(value);
        Ok(())
    }

    fn operand(&self) -> Result<u8, VmError> {
        self.ip
            .checked_sub(1)
            .map(|i| self.program[i])
            .ok_or(VmError::MissingOperand { ip: self.ip })
    }

    fn pop_int(&mut self) -> Result<i64, VmError> {
        match self.pop()? {
            Value::Int(n) => Ok(n),
            other => Err(self.mismatch("int", &other)),
        }
    }

    fn pop_byte(&mut self) -> Result<u8, VmError> {
        match self.pop()? {
            Value::Byte(b) => Ok(b),
            other => Err(self.mismatch("byte", &other)),
        }
    }

    fn pop_bytes(&mut self) -> Result<Vec<u8>, VmError> {
        match self.pop()? {
            Value::Bytes(b) => Ok(b),
            other => Err(self.mismatch("bytes", &other)),
        }
    }

    fn mismatch(&self, expected: &'static str, found: &Value) -> VmError {
        VmError::TypeMismatch {
            ip: self.ip,
            expected,
            found: found.kind(),
        }
    }

    fn arith(&mut self, f: fn(i64, i64) -> Option<i64>) -> Result<(), VmError> {
        let a = self.pop_int()?;
        let b = self.pop_int()?;
        let result = f(a, b).ok_or(VmError::Overflow { ip: self.ip })?;
        self.push(Value::Int(result))
    }

    fn exec(&mut self, op: Opcode) -> Result<(), VmError> {
        match op {
            Opcode::PushInt => {
                let v = self.operand()?;
                self.push(Value::Int(i64::from(v)))
            }
            Opcode::PushByte => {
                let v = self.operand()?;
                self.push(Value::Byte(v))
            }
            Opcode::Add => self.arith(i64::checked_add),
            Opcode::Sub => self.arith(i64::checked_sub),
            Opcode::Mul => self.arith(i64::checked_mul),
            Opcode::Div => {
                let a = self.pop_int()?;
                let b = self.pop_int()?;
                if b == 0 {
                    return Err(VmError::DivisionByZero { ip: self.ip });
                }
                let q = a.checked_div(b).ok_or(VmError::Overflow { ip: self.ip })?;
                self.push(Value::Int(q))
            }
            Opcode::Pack => {
                let n = self.pop_int()?;
                let len = usize::try_from(n)
                    .map_err(|_| VmError::InvalidPackLength { ip: self.ip, len: n })?;
                let mut packed = Vec::with_capacity(len.min(STACK_LIMIT));
                for _ in 0..len {
                    packed.push(self.pop_byte()?);
                }
                self.push(Value::Bytes(packed))
            }
            Opcode::Store => {
                let key = self.pop_bytes()?;
                let value = match self.pop()? {
                    Value::Int(n) => n.to_le_bytes().to_vec(),
                    Value::Bytes(b) => b,
                    Value::Byte(b) => vec![b],
                };
                self.state.put(key, value);
                Ok(())
            }
            Opcode::Get => {
                let key = self.pop_bytes()?;
                let value = self
                    .state
                    .get(&key)
                    .map_err(|_| VmError::KeyNotFound {
                        ip: self.ip,
                        key: String::from_utf8_lossy(&key).into_owned(),
                    })?
                    .to_vec();
                self.push(Value::Bytes(value))
            }
        }
    }
}

/// Runs `program` against `state`. Convenience wrapper used by the ledger.
pub fn execute(program: &[u8], state: &mut ContractState) -> Result<(), VmError> {
    Vm::new(program, state).run()
}
