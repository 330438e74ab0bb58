//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RpcConfig → Result<(), Vec<ValidationError>>
//! - TLS credentials are left to the server, which reads them at serve time

use std::net::SocketAddr;

use crate::config::schema::RpcConfig;

/// One semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &RpcConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = config.listener.bind_address.parse::<SocketAddr>() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address: {}", config.listener.bind_address, e),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than 0"));
    }
    if config.transport.buffer_size == 0 {
        errors.push(ValidationError::new("transport.buffer_size", "must be greater than 0"));
    }
    if config.protocol.max_message_size == 0 {
        errors.push(ValidationError::new("protocol.max_message_size", "must be greater than 0"));
    }
    if config.observability.metrics_enabled {
        if let Err(e) = config.observability.metrics_address.parse::<SocketAddr>() {
            errors.push(ValidationError::new(
                "observability.metrics_address",
                format!(
                    "'{}' is not a socket address: {}",
                    config.observability.metrics_address, e
                ),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
