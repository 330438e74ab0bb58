//! Byte-stream transport wrappers.
//!
//! A connection is split into a read half and a write half. The input
//! transport factory wraps the read half, the output transport factory wraps
//! the write half, so buffering can differ per direction.

use tokio::io::{AsyncRead, AsyncWrite, BufReader, BufWriter};

/// Read side of a connection after transport wrapping.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Write side of a connection after transport wrapping.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Default buffer capacity for [`BufferedTransportFactory`].
pub const DEFAULT_BUFFER_SIZE: usize = 8 * 1024;

/// Wraps raw connection halves in buffering or other stream adapters.
pub trait TransportFactory: Send + Sync + 'static {
    fn wrap_reader(&self, inner: BoxedReader) -> BoxedReader;

    fn wrap_writer(&self, inner: BoxedWriter) -> BoxedWriter;
}

/// Identity transport: hands the stream back untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughTransportFactory;

impl TransportFactory for PassthroughTransportFactory {
    fn wrap_reader(&self, inner: BoxedReader) -> BoxedReader {
        inner
    }

    fn wrap_writer(&self, inner: BoxedWriter) -> BoxedWriter {
        inner
    }
}

/// Buffered transport backed by tokio's `BufReader`/`BufWriter`.
///
/// Writes are only visible to the peer after the protocol flushes.
#[derive(Debug, Clone, Copy)]
pub struct BufferedTransportFactory {
    capacity: usize,
}

impl BufferedTransportFactory {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for BufferedTransportFactory {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

impl TransportFactory for BufferedTransportFactory {
    fn wrap_reader(&self, inner: BoxedReader) -> BoxedReader {
        Box::new(BufReader::with_capacity(self.capacity, inner))
    }

    fn wrap_writer(&self, inner: BoxedWriter) -> BoxedWriter {
        Box::new(BufWriter::with_capacity(self.capacity, inner))
    }
}
