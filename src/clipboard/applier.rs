//! Writes snapshots received from the peer into the local clipboard

use tracing::{debug, info};

use crate::clipboard::backend::ClipboardBackend;
use crate::clipboard::snapshot::ClipboardSnapshot;
use crate::clipboard::watcher::SuppressionHandle;
use crate::error::Result;
use crate::network::ConnectionRole;

/// What a received payload led to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Clipboard overwritten with the snapshot
    Applied(ClipboardSnapshot),
    /// Snapshot carried no data; clipboard untouched
    Empty,
}

/// Applies inbound payloads
pub struct ClipboardApplier {
    suppression: SuppressionHandle,
    role: ConnectionRole,
}

impl ClipboardApplier {
    /// Creates an applier that marks its own writes on `suppression`
    pub fn new(suppression: SuppressionHandle, role: ConnectionRole) -> Self {
        Self { suppression, role }
    }

    /// Decodes `payload` and writes it to the clipboard
    ///
    /// One suppression token is taken before writing so the resulting change
    /// notification is not sent back. A failed write may still have changed
    /// part of the clipboard, so the token stays pending; the caller polls
    /// for a change and releases the token if none happened.
    ///
    /// # Errors
    ///
    /// Returns a decode error for malformed payloads, taken before any token,
    /// or a clipboard error if the write fails; neither affects the connection
    pub fn on_frame_received(
        &self,
        payload: &[u8],
        backend: &mut dyn ClipboardBackend,
    ) -> Result<ApplyOutcome> {
        let snapshot = ClipboardSnapshot::decode(payload)?.normalized();
        if snapshot.is_empty() {
            debug!("Received an empty snapshot from {}", self.role.peer_name());
            return Ok(ApplyOutcome::Empty);
        }

        info!(
            "Received <{}> from {}. Copying to clipboard.",
            snapshot.describe(),
            self.role.peer_name()
        );

        self.suppression.suppress_next();
        backend.set_contents(&snapshot)?;

        Ok(ApplyOutcome::Applied(snapshot))
    }
}
