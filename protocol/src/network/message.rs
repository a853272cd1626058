// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Wire Messages
//!
//! Every payload a transport carries is an [`Envelope`]: a numeric kind plus
//! an opaque body. The body is the kind-specific record, encoded with the same
//! codec as the ledger entities.
//!
//! | Kind | Code | Body                   |
//! |------|------|------------------------|
//! | `Tx`         | 1 | `Transaction`    |
//! | `Block`      | 2 | `Block`          |
//! | `GetStatus`  | 3 | empty            |
//! | `Status`     | 4 | `StatusMessage`  |
//! | `GetBlocks`  | 5 | empty            |
//! | `SyncBlocks` | 6 | `Vec<Block>`     |
//!
//! Decoding yields a closed [`Message`] enum, so the dispatcher handles every
//! kind with one exhaustive `match`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{self, CodecError};
use crate::storage::block::Block;
use crate::transaction::Transaction;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unknown message kind {0}")]
    UnknownMessageKind(u32),

    #[error("failed to decode {kind} message: {source}")]
    DecodeFailure {
        kind: &'static str,
        #[source]
        source: CodecError,
    },

    #[error("failed to encode message: {0}")]
    EncodeFailure(#[from] CodecError),
}

// ---------------------------------------------------------------------------
// Kinds and envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MessageKind {
    Tx = 1,
    Block = 2,
    GetStatus = 3,
    Status = 4,
    GetBlocks = 5,
    SyncBlocks = 6,
}

impl MessageKind {
    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Result<Self, ProtocolError> {
        match code {
            1 => Ok(Self::Tx),
            2 => Ok(Self::Block),
            3 => Ok(Self::GetStatus),
            4 => Ok(Self::Status),
            5 => Ok(Self::GetBlocks),
            6 => Ok(Self::SyncBlocks),
            other => Err(ProtocolError::UnknownMessageKind(other)),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Tx => "tx",
            Self::Block => "block",
            Self::GetStatus => "get_status",
            Self::Status => "status",
            Self::GetBlocks => "get_blocks",
            Self::SyncBlocks => "sync_blocks",
        }
    }
}

/// The outer wire record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub kind: u32,
    pub body: Vec<u8>,
}

impl Envelope {
    pub fn new(kind: MessageKind, body: Vec<u8>) -> Self {
        Self {
            kind: kind.code(),
            body,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        codec::encode(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        codec::decode(bytes).map_err(|source| ProtocolError::DecodeFailure {
            kind: "envelope",
            source,
        })
    }
}

// ---------------------------------------------------------------------------
// Typed messages
// ---------------------------------------------------------------------------

/// Reply to `GetStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub node_id: String,
    pub version: String,
    pub height: u32,
}

/// A decoded protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Tx(Transaction),
    Block(Block),
    GetStatus,
    Status(StatusMessage),
    GetBlocks,
    SyncBlocks(Vec<Block>),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Tx(_) => MessageKind::Tx,
            Self::Block(_) => MessageKind::Block,
            Self::GetStatus => MessageKind::GetStatus,
            Self::Status(_) => MessageKind::Status,
            Self::GetBlocks => MessageKind::GetBlocks,
            Self::SyncBlocks(_) => MessageKind::SyncBlocks,
        }
    }

    /// Encodes into envelope bytes ready for a transport.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let body = match self {
            Self::Tx(tx) => tx.encode()?,
            Self::Block(block) => block.encode()?,
            Self::GetStatus | Self::GetBlocks => Vec::new(),
            Self::Status(status) => codec::encode(status)?,
            Self::SyncBlocks(blocks) => {
                for block in blocks {
                    block.encode()?;
                }
                codec::encode(blocks)?
            }
        };
        Ok(Envelope::new(self.kind(), body).to_bytes()?)
    }

    /// Decodes envelope bytes into a typed message.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let envelope = Envelope::from_bytes(bytes)?;
        let kind = MessageKind::from_code(envelope.kind)?;
        let fail = |source| ProtocolError::DecodeFailure {
            kind: kind.name(),
            source,
        };
        let body = &envelope.body;

        Ok(match kind {
            MessageKind::Tx => Self::Tx(Transaction::decode(body).map_err(fail)?),
            MessageKind::Block => Self::Block(Block::decode(body).map_err(fail)?),
            MessageKind::GetStatus => Self::GetStatus,
            MessageKind::Status => Self::Status(codec::decode(body).map_err(fail)?),
            MessageKind::GetBlocks => Self::GetBlocks,
            MessageKind::SyncBlocks => Self::SyncBlocks(codec::decode(body).map_err(fail)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::keys::PrivateKey;
    use crate::storage::block::Header;

    #[test]
    fn kind_codes_are_fixed() {
        assert_eq!(MessageKind::Tx.code(), 1);
        assert_eq!(MessageKind::Block.code(), 2);
        assert_eq!(MessageKind::GetStatus.code(), 3);
        assert_eq!(MessageKind::Status.code(), 4);
        assert_eq!(MessageKind::GetBlocks.code(), 5);
        assert_eq!(MessageKind::SyncBlocks.code(), 6);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let bytes = Envelope { kind: 42, body: Vec::new() }.to_bytes().unwrap();
        assert!(matches!(
            Message::decode(&bytes),
            Err(ProtocolError::UnknownMessageKind(42))
        ));
    }

    #[test]
    fn truncated_body_is_a_decode_failure() {
        let bytes = Envelope::new(MessageKind::Block, vec![1, 2, 3]).to_bytes().unwrap();
        assert!(matches!(
            Message::decode(&bytes),
            Err(ProtocolError::DecodeFailure { kind: "block", .. })
        ));
        assert!(matches!(
            Message::decode(&[0xff]),
            Err(ProtocolError::DecodeFailure { kind: "envelope", .. })
        ));
    }

    #[test]
    fn status_and_sync_blocks_decode() {
        let status = Message::Status(StatusMessage {
            node_id: "node-a".into(),
            version: "0.0.1".into(),
            height: 7,
        });
        assert_eq!(Message::decode(&status.encode().unwrap()).unwrap(), status);

        let mut block = Block::from_parent(&Header::genesis(), Vec::new()).unwrap();
        block.sign(&PrivateKey::generate());
        let sync = Message::SyncBlocks(vec![block]);
        assert_eq!(Message::decode(&sync.encode().unwrap()).unwrap(), sync);
    }

    #[test]
    fn tx_message_keeps_signature() {
        let tx = Transaction::new(b"hi".to_vec()).signed(&PrivateKey::generate());
        let decoded = Message::decode(&Message::Tx(tx.clone()).encode().unwrap()).unwrap();
        match decoded {
            Message::Tx(got) => {
                assert_eq!(got, tx);
                assert!(got.verify().is_ok());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn empty_requests_encode() {
        for msg in [Message::GetStatus, Message::GetBlocks] {
            assert_eq!(Message::decode(&msg.encode().unwrap()).unwrap(), msg);
        }
    }
}
