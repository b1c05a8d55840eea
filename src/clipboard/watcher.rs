//! Local clipboard change handling
//!
//! On each change notification the watcher either swallows it (the change
//! was our own write of a peer's snapshot) or reads the clipboard and queues
//! the snapshot for the peer.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};

use crate::clipboard::backend::ClipboardBackend;
use crate::error::ClipboardResult;
use crate::network::ConnectionRole;
use crate::session::SyncSlots;

/// Counted "ignore the next change" tokens shared by watcher and applier
#[derive(Debug, Clone, Default)]
pub struct SuppressionHandle {
    pending: Arc<AtomicUsize>,
}

impl SuppressionHandle {
    /// Creates a handle with no pending tokens
    pub fn new() -> Self {
        Self::default()
    }

    /// Swallow one more upcoming change notification
    pub fn suppress_next(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    /// Consumes one token; true if the current notification must be ignored
    pub fn try_consume(&self) -> bool {
        self.pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Withdraws a token whose notification will never arrive
    pub fn release(&self) -> bool {
        self.try_consume()
    }

    /// Tokens not yet consumed
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

/// What a change notification led to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// Caused by applying a peer snapshot; nothing sent
    Suppressed,
    /// No image, HTML or text present; nothing sent
    Unsupported,
    /// Snapshot queued for the peer
    Published {
        /// Encoded payload size
        bytes: usize,
        /// An older unsent snapshot was overwritten
        replaced: bool,
    },
}

/// Turns local clipboard changes into outbound payloads
pub struct ClipboardWatcher {
    slots: Arc<SyncSlots>,
    suppression: SuppressionHandle,
    role: ConnectionRole,
}

impl ClipboardWatcher {
    /// Creates a watcher publishing into `slots`
    pub fn new(slots: Arc<SyncSlots>, suppression: SuppressionHandle, role: ConnectionRole) -> Self {
        Self {
            slots,
            suppression,
            role,
        }
    }

    /// Suppression handle to share with the applier
    pub fn suppression(&self) -> &SuppressionHandle {
        &self.suppression
    }

    /// Handles one change notification
    ///
    /// # Errors
    ///
    /// Returns a clipboard error if the contents cannot be read
    pub fn on_clipboard_changed(
        &self,
        backend: &mut dyn ClipboardBackend,
    ) -> ClipboardResult<WatchOutcome> {
        if self.suppression.try_consume() {
            debug!("Ignoring clipboard change caused by a received snapshot");
            return Ok(WatchOutcome::Suppressed);
        }

        let snapshot = backend.read_snapshot()?;
        if snapshot.is_empty() {
            info!("Clipboard changed but no data type is supported");
            return Ok(WatchOutcome::Unsupported);
        }

        info!(
            "Clipboard changed, sending <{}> to {}",
            snapshot.describe(),
            self.role.peer_name()
        );

        let payload = Bytes::from(snapshot.encode());
        let bytes = payload.len();
        let replaced = self.slots.publish_outbound(payload);
        if replaced {
            debug!("Replaced an unsent clipboard snapshot");
        }

        Ok(WatchOutcome::Published { bytes, replaced })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::backend::MemoryClipboard;
    use crate::clipboard::snapshot::ClipboardSnapshot;

    fn watcher() -> (ClipboardWatcher, Arc<SyncSlots>) {
        let slots = Arc::new(SyncSlots::new());
        let watcher = ClipboardWatcher::new(
            Arc::clone(&slots),
            SuppressionHandle::new(),
            ConnectionRole::Guest,
        );
        (watcher, slots)
    }

    #[test]
    fn test_suppression_tokens() {
        let handle = SuppressionHandle::new();
        assert!(!handle.try_consume());

        handle.suppress_next();
        handle.suppress_next();
        assert_eq!(handle.pending(), 2);
        assert!(handle.try_consume());
        assert!(handle.release());
        assert!(!handle.try_consume());
        assert_eq!(handle.pending(), 0);
    }

    #[test]
    fn test_change_is_published() {
        let (watcher, slots) = watcher();
        let mut clipboard = MemoryClipboard::new();
        clipboard.copy(ClipboardSnapshot::text("hello"));

        let outcome = watcher.on_clipboard_changed(&mut clipboard).unwrap();
        assert!(matches!(outcome, WatchOutcome::Published { replaced: false, .. }));

        let payload = slots.take_outbound().unwrap();
        assert_eq!(
            ClipboardSnapshot::decode(&payload).unwrap(),
            ClipboardSnapshot::text("hello")
        );
    }

    #[test]
    fn test_empty_clipboard_sends_nothing() {
        let (watcher, slots) = watcher();
        let mut clipboard = MemoryClipboard::new();

        let outcome = watcher.on_clipboard_changed(&mut clipboard).unwrap();
        assert_eq!(outcome, WatchOutcome::Unsupported);
        assert!(slots.take_outbound().is_none());
    }

    #[test]
    fn test_suppressed_change_sends_nothing() {
        let (watcher, slots) = watcher();
        let mut clipboard = MemoryClipboard::new();
        clipboard.copy(ClipboardSnapshot::text("from peer"));

        watcher.suppression().suppress_next();
        let outcome = watcher.on_clipboard_changed(&mut clipboard).unwrap();
        assert_eq!(outcome, WatchOutcome::Suppressed);
        assert!(slots.take_outbound().is_none());

        // Exactly one notification is swallowed.
        let outcome = watcher.on_clipboard_changed(&mut clipboard).unwrap();
        assert!(matches!(outcome, WatchOutcome::Published { .. }));
    }

    #[test]
    fn test_latest_change_wins() {
        let (watcher, slots) = watcher();
        let mut clipboard = MemoryClipboard::new();

        clipboard.copy(ClipboardSnapshot::text("first"));
        watcher.on_clipboard_changed(&mut clipboard).unwrap();
        clipboard.copy(ClipboardSnapshot::text("second"));
        let outcome = watcher.on_clipboard_changed(&mut clipboard).unwrap();
        assert!(matches!(outcome, WatchOutcome::Published { replaced: true, .. }));

        let payload = slots.take_outbound().unwrap();
        assert_eq!(
            ClipboardSnapshot::decode(&payload).unwrap().text.as_deref(),
            Some("second")
        );
        assert!(slots.take_outbound().is_none());
    }
}
