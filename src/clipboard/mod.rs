//! Clipboard module for ClipSync
//!
//! Local clipboard access, change detection with feedback suppression, and
//! application of snapshots received from the peer.

pub mod applier;
pub mod backend;
pub mod dispatcher;
pub mod png;
pub mod snapshot;
pub mod watcher;

pub use applier::{ApplyOutcome, ClipboardApplier};
pub use backend::{ArboardClipboard, ClipboardBackend, MemoryClipboard};
pub use dispatcher::{ChangeDetector, ClipboardDispatcher, DispatcherConfig, DispatcherHandle, TickReport};
pub use snapshot::{ClipboardKind, ClipboardSnapshot};
pub use watcher::{ClipboardWatcher, SuppressionHandle, WatchOutcome};
