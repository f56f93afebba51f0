//! Error types and handling for the mesh chat node.
//!
//! This module provides a unified error handling system across all components
//! of the node. Transport, decode and command errors are absorbed where they
//! happen; only bind and configuration failures are meant to end the process.

use thiserror::Error;

/// Result type alias for the node library
pub type Result<T> = std::result::Result<T, NodeError>;

/// Comprehensive error type for all node operations
#[derive(Error, Debug, Clone)]
pub enum NodeError {
    /// Network and transport layer errors
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Wire protocol errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// User command errors
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// Configuration and I/O errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Network and transport layer errors
#[derive(Error, Debug, Clone)]
pub enum NetworkError {
    /// Connection establishment or write failure
    #[error("Connection failed to {peer}: {reason}")]
    ConnectionFailed { peer: String, reason: String },

    /// Timeout during network operation
    #[error("Network timeout: {operation}")]
    Timeout { operation: String },

    /// The listening socket could not be bound
    #[error("Failed to bind {address}: {reason}")]
    BindFailed { address: String, reason: String },

    /// Invalid network address
    #[error("Invalid address: {address}")]
    InvalidAddress { address: String },
}

/// Wire protocol errors
#[derive(Error, Debug, Clone)]
pub enum ProtocolError {
    /// Invalid message format
    #[error("Invalid message format: {reason}")]
    InvalidMessage { reason: String },

    /// Message too large
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// Envelope type outside the known set
    #[error("Unknown message type: {message_type}")]
    UnknownMessageType { message_type: String },

    /// Missing required message field
    #[error("Missing required field: {field}")]
    MissingField { field: String },
}

/// Errors raised while interpreting a console command
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// No known peer uses this nickname
    #[error("Unknown nickname: {nickname}")]
    UnknownNickname { nickname: String },

    /// No known channel has this name
    #[error("Unknown channel: {channel}")]
    UnknownChannel { channel: String },

    /// The name is neither a known channel nor a known nickname
    #[error("Unknown user or channel: {target}")]
    UnknownTarget { target: String },

    /// The channel exists and the supplied key does not match
    #[error("Incorrect key for channel {channel}")]
    IncorrectKey { channel: String },
}

/// Configuration and setup errors
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// Missing required configuration
    #[error("Missing configuration: {field}")]
    MissingField { field: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// Configuration parsing error
    #[error("Configuration parse error: {reason}")]
    ParseError { reason: String },

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl From<std::io::Error> for NodeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for NodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Protocol(ProtocolError::InvalidMessage {
            reason: err.to_string(),
        })
    }
}
