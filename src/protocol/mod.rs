//! Wire encoding subsystem.
//!
//! # Data Flow
//! ```text
//! input transport (BoxedReader)
//!     → ProtocolFactory::input_protocol
//!     → InputProtocol::read_message → Message
//!
//! Message (reply)
//!     → OutputProtocol::write_message + flush
//!     → output transport (BoxedWriter)
//! ```
//!
//! # Design Decisions
//! - A protocol only knows the message envelope; the payload is opaque bytes
//! - Input and output sides are bound separately so they can differ
//! - A clean end of stream at a message boundary is not an error

pub mod binary;
pub mod json;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::transport::{BoxedReader, BoxedWriter};

pub use binary::BinaryProtocolFactory;
pub use json::JsonProtocolFactory;

/// Default upper bound for a single name or payload, in bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Kind of message carried in the envelope.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Call = 1,
    Reply = 2,
    Exception = 3,
    Oneway = 4,
}

impl TryFrom<u8> for MessageType {
    type Error = ProtocolError;

    fn try_from(val: u8) -> Result<Self, Self::Error> {
        match val {
            1 => Ok(MessageType::Call),
            2 => Ok(MessageType::Reply),
            3 => Ok(MessageType::Exception),
            4 => Ok(MessageType::Oneway),
            other => Err(ProtocolError::InvalidMessageType(other)),
        }
    }
}

/// One decoded request or encoded reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Method name.
    pub name: String,
    pub message_type: MessageType,
    /// Sequence id echoed back in the reply.
    pub sequence_id: i32,
    /// Opaque argument/result bytes.
    pub payload: Bytes,
}

impl Message {
    pub fn new(
        name: impl Into<String>,
        message_type: MessageType,
        sequence_id: i32,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            message_type,
            sequence_id,
            payload: payload.into(),
        }
    }

    /// Build a reply to this message carrying `payload`.
    pub fn reply(&self, payload: impl Into<Bytes>) -> Self {
        Self::new(self.name.clone(), MessageType::Reply, self.sequence_id, payload)
    }
}

/// Error type for protocol operations.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad protocol version: {0:#010x}")]
    BadVersion(u32),
    #[error("missing version in message header")]
    MissingVersion,
    #[error("negative size: {0}")]
    NegativeSize(i32),
    #[error("size {size} exceeds limit {limit}")]
    SizeLimit { size: usize, limit: usize },
    #[error("invalid message type: {0}")]
    InvalidMessageType(u8),
    #[error("invalid UTF-8 in message name")]
    InvalidName(#[from] std::string::FromUtf8Error),
    #[error("malformed message: {0}")]
    Malformed(String),
}

/// Decoder bound to an input transport.
#[async_trait]
pub trait InputProtocol: Send {
    /// Read the next message. Returns `Ok(None)` when the peer closed the
    /// stream between messages.
    async fn read_message(&mut self) -> Result<Option<Message>, ProtocolError>;
}

/// Encoder bound to an output transport.
#[async_trait]
pub trait OutputProtocol: Send {
    async fn write_message(&mut self, message: &Message) -> Result<(), ProtocolError>;

    /// Push buffered bytes down to the transport.
    async fn flush(&mut self) -> Result<(), ProtocolError>;
}

/// Produces protocol instances for each connection.
pub trait ProtocolFactory: Send + Sync + 'static {
    fn input_protocol(&self, transport: BoxedReader) -> Box<dyn InputProtocol>;

    fn output_protocol(&self, transport: BoxedWriter) -> Box<dyn OutputProtocol>;
}
