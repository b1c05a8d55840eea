//! Clipboard backends
//!
//! [`ClipboardBackend`] is the narrow surface the sync core needs from a
//! platform clipboard. [`ArboardClipboard`] talks to the OS through arboard;
//! [`MemoryClipboard`] keeps contents in process for tests and headless runs.

use std::borrow::Cow;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arboard::{Clipboard, ImageData};
use tracing::debug;

use crate::clipboard::png::{decode_png, encode_png, RgbaImage};
use crate::clipboard::snapshot::ClipboardSnapshot;
use crate::error::{ClipboardError, ClipboardResult};

/// Platform clipboard capabilities used by the sync core
pub trait ClipboardBackend {
    /// Current plain text, if any
    fn get_text(&mut self) -> ClipboardResult<Option<String>>;

    /// Current HTML, if any
    fn get_html(&mut self) -> ClipboardResult<Option<String>>;

    /// Current image as PNG bytes, if any
    fn get_image(&mut self) -> ClipboardResult<Option<Vec<u8>>>;

    /// Replaces the clipboard with the kinds present in `snapshot`
    ///
    /// A backend that holds one kind at a time keeps the text kinds (HTML
    /// with its plain text, or plain text alone) over the image. Only an
    /// image-only snapshot is guaranteed to land as an image everywhere.
    fn set_contents(&mut self, snapshot: &ClipboardSnapshot) -> ClipboardResult<()>;

    /// Value that changes whenever the clipboard contents change
    fn fingerprint(&mut self) -> ClipboardResult<u64>;

    /// Reads image, HTML and text into a snapshot
    fn read_snapshot(&mut self) -> ClipboardResult<ClipboardSnapshot> {
        let image = self.get_image()?;
        let html = self.get_html()?;
        let text = self.get_text()?;
        Ok(ClipboardSnapshot { text, html, image }.normalized())
    }
}

/// Maps "nothing of this kind" to `None`
fn optional<T>(result: Result<T, arboard::Error>) -> ClipboardResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(arboard::Error::ContentNotAvailable) => Ok(None),
        Err(e) => Err(ClipboardError::Read(e.to_string())),
    }
}

/// OS clipboard via arboard
pub struct ArboardClipboard {
    clipboard: Clipboard,
}

impl ArboardClipboard {
    /// Opens the system clipboard
    ///
    /// # Errors
    ///
    /// Returns `ClipboardError::Unavailable` if no clipboard can be reached
    pub fn new() -> ClipboardResult<Self> {
        let clipboard = Clipboard::new()?;
        Ok(Self { clipboard })
    }
}

impl ClipboardBackend for ArboardClipboard {
    fn get_text(&mut self) -> ClipboardResult<Option<String>> {
        optional(self.clipboard.get_text())
    }

    fn get_html(&mut self) -> ClipboardResult<Option<String>> {
        optional(self.clipboard.get().html())
    }

    fn get_image(&mut self) -> ClipboardResult<Option<Vec<u8>>> {
        let Some(image) = optional(self.clipboard.get_image())? else {
            return Ok(None);
        };
        let rgba = RgbaImage {
            width: image.width,
            height: image.height,
            bytes: image.bytes.into_owned(),
        };
        encode_png(&rgba).map(Some)
    }

    fn set_contents(&mut self, snapshot: &ClipboardSnapshot) -> ClipboardResult<()> {
        // Each arboard set replaces the clipboard, so the image goes first and
        // the text kinds, written together by set_html, take precedence.
        if let Some(png) = snapshot.image.as_deref() {
            let rgba = decode_png(png)?;
            let image = ImageData {
                width: rgba.width,
                height: rgba.height,
                bytes: Cow::Owned(rgba.bytes),
            };
            self.clipboard
                .set_image(image)
                .map_err(|e| ClipboardError::Write(e.to_string()))?;
        }

        let result = match (snapshot.html.as_deref(), snapshot.text.as_deref()) {
            (Some(html), alt_text) => self.clipboard.set_html(html, alt_text),
            (None, Some(text)) => self.clipboard.set_text(text),
            (None, None) => Ok(()),
        };
        result.map_err(|e| ClipboardError::Write(e.to_string()))
    }

    fn fingerprint(&mut self) -> ClipboardResult<u64> {
        // Hash raw pixels rather than PNG bytes to skip encoding every poll.
        let mut hasher = DefaultHasher::new();
        optional(self.clipboard.get_text())?.hash(&mut hasher);
        optional(self.clipboard.get().html())?.hash(&mut hasher);
        match optional(self.clipboard.get_image())? {
            Some(image) => {
                image.width.hash(&mut hasher);
                image.height.hash(&mut hasher);
                image.bytes.hash(&mut hasher);
            }
            None => 0u8.hash(&mut hasher),
        }
        Ok(hasher.finish())
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    contents: ClipboardSnapshot,
    generation: u64,
}

/// In-process clipboard
///
/// Clones share the same contents, so a test can keep one handle while the
/// dispatcher thread owns another. Every write bumps a generation counter,
/// which mirrors platforms that notify on each set even if nothing changed.
#[derive(Debug, Clone, Default)]
pub struct MemoryClipboard {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryClipboard {
    /// Creates an empty clipboard
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulates a local copy
    pub fn copy(&self, snapshot: ClipboardSnapshot) {
        let mut state = self.lock();
        state.contents = snapshot.normalized();
        state.generation += 1;
    }

    /// Current contents
    pub fn contents(&self) -> ClipboardSnapshot {
        self.lock().contents.clone()
    }

    /// Number of writes so far, local copies included
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }
}

impl ClipboardBackend for MemoryClipboard {
    fn get_text(&mut self) -> ClipboardResult<Option<String>> {
        Ok(self.lock().contents.text.clone())
    }

    fn get_html(&mut self) -> ClipboardResult<Option<String>> {
        Ok(self.lock().contents.html.clone())
    }

    fn get_image(&mut self) -> ClipboardResult<Option<Vec<u8>>> {
        Ok(self.lock().contents.image.clone())
    }

    fn set_contents(&mut self, snapshot: &ClipboardSnapshot) -> ClipboardResult<()> {
        debug!("Memory clipboard set to <{}>", snapshot.describe());
        self.copy(snapshot.clone());
        Ok(())
    }

    fn fingerprint(&mut self) -> ClipboardResult<u64> {
        Ok(self.generation())
    }
}
