//! Newline-delimited JSON protocol.
//!
//! Each message is one JSON object on its own line:
//! `{"name":"echo","message_type":"call","sequence_id":1,"payload":[104,105]}`

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::protocol::{
    InputProtocol, Message, OutputProtocol, ProtocolError, ProtocolFactory,
    DEFAULT_MAX_MESSAGE_SIZE,
};
use crate::transport::{BoxedReader, BoxedWriter};

#[derive(Debug, Clone, Copy)]
pub struct JsonProtocolFactory {
    max_message_size: usize,
}

impl JsonProtocolFactory {
    pub fn new() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    /// Set the upper bound for one encoded line.
    pub fn with_max_message_size(mut self, limit: usize) -> Self {
        self.max_message_size = limit;
        self
    }
}

impl Default for JsonProtocolFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolFactory for JsonProtocolFactory {
    fn input_protocol(&self, transport: BoxedReader) -> Box<dyn InputProtocol> {
        Box::new(JsonInputProtocol {
            transport: BufReader::new(transport),
            line: String::new(),
            max_message_size: self.max_message_size,
        })
    }

    fn output_protocol(&self, transport: BoxedWriter) -> Box<dyn OutputProtocol> {
        Box::new(JsonOutputProtocol { transport })
    }
}

pub struct JsonInputProtocol {
    transport: BufReader<BoxedReader>,
    line: String,
    max_message_size: usize,
}

#[async_trait]
impl InputProtocol for JsonInputProtocol {
    async fn read_message(&mut self) -> Result<Option<Message>, ProtocolError> {
        loop {
            self.line.clear();
            let read = self.transport.read_line(&mut self.line).await?;
            if read == 0 {
                return Ok(None);
            }
            if read > self.max_message_size {
                return Err(ProtocolError::SizeLimit {
                    size: read,
                    limit: self.max_message_size,
                });
            }
            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }
            return serde_json::from_str(trimmed)
                .map(Some)
                .map_err(|e| ProtocolError::Malformed(e.to_string()));
        }
    }
}

pub struct JsonOutputProtocol {
    transport: BoxedWriter,
}

#[async_trait]
impl OutputProtocol for JsonOutputProtocol {
    async fn write_message(&mut self, message: &Message) -> Result<(), ProtocolError> {
        let mut encoded =
            serde_json::to_vec(message).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        encoded.push(b'\n');
        self.transport.write_all(&encoded).await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ProtocolError> {
        self.transport.flush().await?;
        Ok(())
    }
}
