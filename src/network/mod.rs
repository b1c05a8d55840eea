//! Network module for ClipSync
//!
//! This module handles the peer connection:
//! - Host/guest connection establishment over TCP
//! - Length-prefixed framing of snapshot payloads

pub mod connection;
pub mod framing;

// Re-export commonly used types
pub use connection::{run_as_guest, run_as_host, ConnectionRole, HostListener};
pub use framing::{
    encode_frame, write_frame, FrameError, FrameReader, FrameWriter, FramingMode,
};
