//! Clipboard snapshot and its wire envelope
//!
//! A snapshot is the unit of synchronization: the text, HTML and image held
//! by the clipboard at one moment. On the wire it is a JSON object whose
//! image field carries base64 encoded PNG bytes.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

/// Kind of clipboard payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClipboardKind {
    /// PNG image
    Image,
    /// HTML fragment
    Html,
    /// Plain text
    Text,
}

impl fmt::Display for ClipboardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClipboardKind::Image => write!(f, "image"),
            ClipboardKind::Html => write!(f, "html"),
            ClipboardKind::Text => write!(f, "text"),
        }
    }
}

/// Clipboard contents at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipboardSnapshot {
    /// Plain text
    pub text: Option<String>,
    /// HTML markup
    pub html: Option<String>,
    /// PNG encoded image
    pub image: Option<Vec<u8>>,
}

/// JSON shape of a snapshot on the wire
#[derive(Debug, Default, Serialize, Deserialize)]
struct SnapshotEnvelope {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    html: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

impl ClipboardSnapshot {
    /// Creates a text-only snapshot
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Creates an HTML snapshot with an optional plain text alternative
    pub fn html(html: impl Into<String>, alt_text: Option<String>) -> Self {
        Self {
            html: Some(html.into()),
            text: alt_text,
            ..Self::default()
        }
    }

    /// Creates an image snapshot from PNG bytes
    pub fn image(png: Vec<u8>) -> Self {
        Self {
            image: Some(png),
            ..Self::default()
        }
    }

    /// Drops fields that are present but empty
    pub fn normalized(self) -> Self {
        Self {
            text: self.text.filter(|t| !t.is_empty()),
            html: self.html.filter(|h| !h.is_empty()),
            image: self.image.filter(|i| !i.is_empty()),
        }
    }

    /// True if no field carries data; such snapshots are never sent
    pub fn is_empty(&self) -> bool {
        self.kinds().is_empty()
    }

    /// Present kinds, in image, html, text order
    pub fn kinds(&self) -> Vec<ClipboardKind> {
        let mut kinds = Vec::with_capacity(3);
        if self.image.as_ref().is_some_and(|i| !i.is_empty()) {
            kinds.push(ClipboardKind::Image);
        }
        if self.html.as_ref().is_some_and(|h| !h.is_empty()) {
            kinds.push(ClipboardKind::Html);
        }
        if self.text.as_ref().is_some_and(|t| !t.is_empty()) {
            kinds.push(ClipboardKind::Text);
        }
        kinds
    }

    /// Human readable list of kinds, e.g. `image, text`
    pub fn describe(&self) -> String {
        self.kinds()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Encodes the snapshot as a frame payload
    pub fn encode(&self) -> Vec<u8> {
        let envelope = SnapshotEnvelope {
            image: self.image.as_ref().map(|png| STANDARD.encode(png)),
            html: self.html.clone(),
            text: self.text.clone(),
        };
        // A struct of strings and options cannot fail to serialize.
        serde_json::to_vec(&envelope).unwrap_or_default()
    }

    /// Decodes a frame payload
    ///
    /// # Errors
    ///
    /// Returns `DecodeError` if the payload is not a snapshot envelope or the
    /// image is not valid base64
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        let envelope: SnapshotEnvelope = serde_json::from_slice(payload)?;
        let image = envelope
            .image
            .map(|b64| STANDARD.decode(b64.as_bytes()))
            .transpose()?;

        Ok(Self {
            text: envelope.text,
            html: envelope.html,
            image,
        })
    }
}
