//! Base builder tier and the resolved configuration snapshot.
//!
//! Builder tiers are traits with provided by-value chain methods. A struct
//! that embeds [`ServerArgs`] implements [`ServerBuilder`] by handing out
//! `&mut` access to it and inherits every chain method with its own type:
//!
//! ```rust
//! use std::sync::Arc;
//! use rpc_server::server::{ServerBuilder, TlsBuilder, TlsServerArgs};
//! use rpc_server::transport::BufferedTransportFactory;
//!
//! let args = TlsServerArgs::new()
//!     .transport_factory(Arc::new(BufferedTransportFactory::default()))
//!     .ssl(true)
//!     .key_store_path("server.pem");
//! let config = args.args.finish();
//! # let _ = config;
//! ```

use std::sync::Arc;

use crate::processor::{Processor, ProcessorFactory, SingletonProcessorFactory};
use crate::protocol::{BinaryProtocolFactory, ProtocolFactory};
use crate::transport::{PassthroughTransportFactory, TransportFactory};

/// Processor, transport and protocol choices accumulated by a builder.
///
/// Unset factories are filled with defaults by [`ServerArgs::finish`].
#[derive(Clone, Default)]
pub struct ServerArgs {
    processor_factory: Option<Arc<dyn ProcessorFactory>>,
    input_transport_factory: Option<Arc<dyn TransportFactory>>,
    output_transport_factory: Option<Arc<dyn TransportFactory>>,
    input_protocol_factory: Option<Arc<dyn ProtocolFactory>>,
    output_protocol_factory: Option<Arc<dyn ProtocolFactory>>,
}

impl ServerArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Freeze the accumulated choices, applying defaults for unset sides:
    /// passthrough transports and the binary protocol.
    pub fn finish(self) -> ServerConfig {
        let default_transport: Arc<dyn TransportFactory> = Arc::new(PassthroughTransportFactory);
        let default_protocol: Arc<dyn ProtocolFactory> = Arc::new(BinaryProtocolFactory::default());

        ServerConfig {
            processor_factory: self.processor_factory,
            input_transport_factory: self
                .input_transport_factory
                .unwrap_or_else(|| Arc::clone(&default_transport)),
            output_transport_factory: self.output_transport_factory.unwrap_or(default_transport),
            input_protocol_factory: self
                .input_protocol_factory
                .unwrap_or_else(|| Arc::clone(&default_protocol)),
            output_protocol_factory: self.output_protocol_factory.unwrap_or(default_protocol),
        }
    }
}

/// Fluent setters shared by every builder tier.
pub trait ServerBuilder: Sized {
    /// Access to the base tier embedded in this builder.
    fn server_args(&mut self) -> &mut ServerArgs;

    fn processor_factory(mut self, factory: Arc<dyn ProcessorFactory>) -> Self {
        self.server_args().processor_factory = Some(factory);
        self
    }

    /// Serve every session with the same processor.
    fn processor(self, processor: Arc<dyn Processor>) -> Self {
        self.processor_factory(Arc::new(SingletonProcessorFactory::new(processor)))
    }

    /// Set both input and output transport factories.
    fn transport_factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        let args = self.server_args();
        args.input_transport_factory = Some(Arc::clone(&factory));
        args.output_transport_factory = Some(factory);
        self
    }

    fn input_transport_factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.server_args().input_transport_factory = Some(factory);
        self
    }

    fn output_transport_factory(mut self, factory: Arc<dyn TransportFactory>) -> Self {
        self.server_args().output_transport_factory = Some(factory);
        self
    }

    /// Set both input and output protocol factories.
    fn protocol_factory(mut self, factory: Arc<dyn ProtocolFactory>) -> Self {
        let args = self.server_args();
        args.input_protocol_factory = Some(Arc::clone(&factory));
        args.output_protocol_factory = Some(factory);
        self
    }

    fn input_protocol_factory(mut self, factory: Arc<dyn ProtocolFactory>) -> Self {
        self.server_args().input_protocol_factory = Some(factory);
        self
    }

    fn output_protocol_factory(mut self, factory: Arc<dyn ProtocolFactory>) -> Self {
        self.server_args().output_protocol_factory = Some(factory);
        self
    }
}

impl ServerBuilder for ServerArgs {
    fn server_args(&mut self) -> &mut ServerArgs {
        self
    }
}

/// Immutable configuration owned by a server after construction.
#[derive(Clone)]
pub struct ServerConfig {
    processor_factory: Option<Arc<dyn ProcessorFactory>>,
    input_transport_factory: Arc<dyn TransportFactory>,
    output_transport_factory: Arc<dyn TransportFactory>,
    input_protocol_factory: Arc<dyn ProtocolFactory>,
    output_protocol_factory: Arc<dyn ProtocolFactory>,
}

impl ServerConfig {
    /// `None` when the builder never received a processor.
    pub fn processor_factory(&self) -> Option<&Arc<dyn ProcessorFactory>> {
        self.processor_factory.as_ref()
    }

    pub fn input_transport_factory(&self) -> &Arc<dyn TransportFactory> {
        &self.input_transport_factory
    }

    pub fn output_transport_factory(&self) -> &Arc<dyn TransportFactory> {
        &self.output_transport_factory
    }

    pub fn input_protocol_factory(&self) -> &Arc<dyn ProtocolFactory> {
        &self.input_protocol_factory
    }

    pub fn output_protocol_factory(&self) -> &Arc<dyn ProtocolFactory> {
        &self.output_protocol_factory
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("has_processor_factory", &self.processor_factory.is_some())
            .finish_non_exhaustive()
    }
}
