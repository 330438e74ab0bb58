//! Binary message envelope (the default protocol).
//!
//! Strict header layout, big-endian:
//! ```text
//! i32  VERSION_1 | type
//! i32  name length, name bytes (UTF-8)
//! i32  sequence id
//! i32  payload length, payload bytes
//! ```
//! The legacy (non-strict) header starts with the name instead and carries the
//! type as a single byte after it.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::protocol::{
    InputProtocol, Message, MessageType, OutputProtocol, ProtocolError, ProtocolFactory,
    DEFAULT_MAX_MESSAGE_SIZE,
};
use crate::transport::{BoxedReader, BoxedWriter};

pub const VERSION_1: u32 = 0x8001_0000;
pub const VERSION_MASK: u32 = 0xffff_0000;
const TYPE_MASK: u32 = 0x0000_00ff;

/// Factory for the binary protocol.
#[derive(Debug, Clone, Copy)]
pub struct BinaryProtocolFactory {
    strict_read: bool,
    strict_write: bool,
    max_message_size: usize,
}

impl BinaryProtocolFactory {
    pub fn new(strict_read: bool, strict_write: bool) -> Self {
        Self {
            strict_read,
            strict_write,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    /// Set the upper bound for names and payloads.
    pub fn with_max_message_size(mut self, limit: usize) -> Self {
        self.max_message_size = limit;
        self
    }

    pub fn strict_read(&self) -> bool {
        self.strict_read
    }

    pub fn strict_write(&self) -> bool {
        self.strict_write
    }

    pub fn max_message_size(&self) -> usize {
        self.max_message_size
    }
}

impl Default for BinaryProtocolFactory {
    fn default() -> Self {
        Self::new(false, true)
    }
}

impl ProtocolFactory for BinaryProtocolFactory {
    fn input_protocol(&self, transport: BoxedReader) -> Box<dyn InputProtocol> {
        Box::new(BinaryInputProtocol {
            transport,
            strict_read: self.strict_read,
            max_message_size: self.max_message_size,
        })
    }

    fn output_protocol(&self, transport: BoxedWriter) -> Box<dyn OutputProtocol> {
        Box::new(BinaryOutputProtocol {
            transport,
            strict_write: self.strict_write,
        })
    }
}

pub struct BinaryInputProtocol {
    transport: BoxedReader,
    strict_read: bool,
    max_message_size: usize,
}

impl BinaryInputProtocol {
    fn check_len(&self, len: i32) -> Result<usize, ProtocolError> {
        if len < 0 {
            return Err(ProtocolError::NegativeSize(len));
        }
        let len = len as usize;
        if len > self.max_message_size {
            return Err(ProtocolError::SizeLimit {
                size: len,
                limit: self.max_message_size,
            });
        }
        Ok(len)
    }

    async fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = vec![0u8; len];
        self.transport.read_exact(&mut buf).await?;
        Ok(buf)
    }

    async fn read_sized(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let len = self.transport.read_i32().await?;
        let len = self.check_len(len)?;
        self.read_bytes(len).await
    }

    /// Read the first header word; `None` if the stream ended before it.
    async fn read_first_word(&mut self) -> Result<Option<i32>, ProtocolError> {
        let mut word = [0u8; 4];
        let first = self.transport.read(&mut word[..1]).await?;
        if first == 0 {
            return Ok(None);
        }
        self.transport.read_exact(&mut word[1..]).await?;
        Ok(Some(i32::from_be_bytes(word)))
    }
}

#[async_trait]
impl InputProtocol for BinaryInputProtocol {
    async fn read_message(&mut self) -> Result<Option<Message>, ProtocolError> {
        let Some(first) = self.read_first_word().await? else {
            return Ok(None);
        };

        let (name, message_type) = if first < 0 {
            let header = first as u32;
            let version = header & VERSION_MASK;
            if version != VERSION_1 {
                return Err(ProtocolError::BadVersion(version));
            }
            let message_type = MessageType::try_from((header & TYPE_MASK) as u8)?;
            let name = String::from_utf8(self.read_sized().await?)?;
            (name, message_type)
        } else {
            if self.strict_read {
                return Err(ProtocolError::MissingVersion);
            }
            let len = self.check_len(first)?;
            let name = String::from_utf8(self.read_bytes(len).await?)?;
            let message_type = MessageType::try_from(self.transport.read_u8().await?)?;
            (name, message_type)
        };

        let sequence_id = self.transport.read_i32().await?;
        let payload = Bytes::from(self.read_sized().await?);

        Ok(Some(Message {
            name,
            message_type,
            sequence_id,
            payload,
        }))
    }
}

pub struct BinaryOutputProtocol {
    transport: BoxedWriter,
    strict_write: bool,
}

impl BinaryOutputProtocol {
    async fn write_sized(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        let len = i32::try_from(bytes.len()).map_err(|_| ProtocolError::SizeLimit {
            size: bytes.len(),
            limit: i32::MAX as usize,
        })?;
        self.transport.write_i32(len).await?;
        self.transport.write_all(bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl OutputProtocol for BinaryOutputProtocol {
    async fn write_message(&mut self, message: &Message) -> Result<(), ProtocolError> {
        if self.strict_write {
            let header = VERSION_1 | message.message_type as u32;
            self.transport.write_u32(header).await?;
            self.write_sized(message.name.as_bytes()).await?;
        } else {
            self.write_sized(message.name.as_bytes()).await?;
            self.transport.write_u8(message.message_type as u8).await?;
        }
        self.transport.write_i32(message.sequence_id).await?;
        self.write_sized(&message.payload).await
    }

    async fn flush(&mut self) -> Result<(), ProtocolError> {
        self.transport.flush().await?;
        Ok(())
    }
}
