//! UI-agnostic session state types
//!
//! This module contains the data shared between the session controller and
//! whatever view renders it. None of it depends on a UI framework.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::AttachmentError;

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// A chat message in the transcript. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    role: Role,
    text: Option<String>,
    attachment: Option<EncodedImage>,
}

impl Message {
    /// Build a user message. Returns `None` when there is neither text nor an
    /// attachment to send.
    pub fn user(text: Option<String>, attachment: Option<EncodedImage>) -> Option<Self> {
        let text = text.filter(|t| !t.trim().is_empty());
        if text.is_none() && attachment.is_none() {
            return None;
        }
        Some(Self {
            role: Role::User,
            text,
            attachment,
        })
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: Some(text.into()),
            attachment: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn attachment(&self) -> Option<&EncodedImage> {
        self.attachment.as_ref()
    }
}

/// Image bytes encoded as a `data:` URL, ready for the wire and for preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    mime_type: String,
    payload: String,
    source_len: usize,
}

impl EncodedImage {
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Result<Self, AttachmentError> {
        if !is_image_type(mime_type) {
            return Err(AttachmentError::NotAnImage {
                content_type: mime_type.to_string(),
            });
        }

        let payload = format!("data:{};base64,{}", mime_type, BASE64.encode(bytes));
        Ok(Self {
            mime_type: mime_type.to_string(),
            payload,
            source_len: bytes.len(),
        })
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// The `data:<mime>;base64,<data>` string sent as the request `image` field.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Size of the original file in bytes.
    pub fn source_len(&self) -> usize {
        self.source_len
    }

    /// Short human-readable label, e.g. `image/png, 12.4 KB`.
    pub fn describe(&self) -> String {
        format!("{}, {}", self.mime_type, format_size(self.source_len))
    }
}

pub(crate) fn is_image_type(content_type: &str) -> bool {
    content_type.starts_with("image/")
}

fn format_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;

    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

/// The user's not-yet-sent input
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Composition {
    pub draft_text: String,
    pub draft_attachment: Option<EncodedImage>,
}

impl Composition {
    pub fn is_empty(&self) -> bool {
        self.draft_text.trim().is_empty() && self.draft_attachment.is_none()
    }

    /// Move the draft out, leaving an empty composition behind.
    pub(crate) fn take(&mut self) -> Composition {
        std::mem::take(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchState {
    #[default]
    Idle,
    Pending,
}
