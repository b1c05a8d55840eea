//! Error types for ClipSync
//!
//! Errors are split by how far they propagate: establishment and transport
//! failures end the process, while protocol, decode and clipboard failures are
//! scoped to a single message.

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Main error type for ClipSync
#[derive(Error, Debug)]
pub enum ClipSyncError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Could not bring the connection up
    #[error("Connection error: {0}")]
    Establishment(#[from] EstablishmentError),

    /// The established connection failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Malformed frame on the wire
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Frame payload is not a valid clipboard snapshot
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Local clipboard access failed
    #[error("Clipboard error: {0}")]
    Clipboard(#[from] ClipboardError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Configuration directory not found: {0}")]
    DirectoryNotFound(String),

    #[error("Failed to create configuration directory: {0}")]
    DirectoryCreationFailed(String),
}

/// Errors raised while binding, accepting or dialing
#[derive(Error, Debug)]
pub enum EstablishmentError {
    #[error("Failed to resolve {target}: {source}")]
    Resolve {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("Failed to accept connection: {0}")]
    Accept(#[source] io::Error),

    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Errors on an established connection
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Peer closed the connection")]
    PeerClosed,

    #[error("Read failed: {0}")]
    Read(#[source] io::Error),

    #[error("Write failed: {0}")]
    Write(#[source] io::Error),
}

/// Frame header violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("No length separator in first chunk")]
    MissingSeparator,

    #[error("Invalid length prefix: {0:?}")]
    InvalidLength(String),

    #[error("Frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Length prefix exceeds {max} bytes without a separator")]
    HeaderTooLong { max: usize },
}

/// Snapshot decoding errors
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Invalid base64 image: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid snapshot envelope: {0}")]
    Envelope(#[from] serde_json::Error),
}

/// Local clipboard errors
#[derive(Error, Debug)]
pub enum ClipboardError {
    #[error("Clipboard unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to read clipboard: {0}")]
    Read(String),

    #[error("Failed to write clipboard: {0}")]
    Write(String),

    #[error("Image conversion failed: {0}")]
    Image(String),
}

/// Type alias for Results using ClipSyncError
pub type Result<T> = std::result::Result<T, ClipSyncError>;

/// Type alias for Config Results
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Type alias for Clipboard Results
pub type ClipboardResult<T> = std::result::Result<T, ClipboardError>;

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::LoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ConfigError {
    fn from(err: toml::ser::Error) -> Self {
        ConfigError::SaveFailed(err.to_string())
    }
}

impl From<arboard::Error> for ClipboardError {
    fn from(err: arboard::Error) -> Self {
        ClipboardError::Unavailable(err.to_string())
    }
}

impl From<image::ImageError> for ClipboardError {
    fn from(err: image::ImageError) -> Self {
        ClipboardError::Image(err.to_string())
    }
}

impl ClipSyncError {
    /// Returns true if the error ends the session
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClipSyncError::Config(_)
                | ClipSyncError::Establishment(_)
                | ClipSyncError::Transport(_)
                | ClipSyncError::Io(_)
        )
    }
}
