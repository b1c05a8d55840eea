//! ClipSync - two-party clipboard synchronization over TCP
//!
//! One side runs as host and accepts a single connection, the other runs as
//! guest and dials it. After that both sides are symmetric: local clipboard
//! changes are framed and sent, frames from the peer are written into the
//! local clipboard without being echoed back.
//!
//! # Examples
//!
//! ```no_run
//! use clip_sync::{clipboard::ArboardClipboard, config::Config, network::ConnectionRole};
//!
//! # async fn example() -> clip_sync::Result<()> {
//! let config = Config::default();
//! let reason = clip_sync::session::run_session(&config, ConnectionRole::Host, ArboardClipboard::new).await?;
//! println!("Session ended: {reason}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cli;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod logging;
pub mod network;
pub mod session;

// Re-export commonly used types at crate root
pub use error::{ClipSyncError, Result};
