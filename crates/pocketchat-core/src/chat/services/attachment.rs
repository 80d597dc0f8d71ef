//! Attachment encoding and per-message capacity enforcement.
//!
//! Encoding is a pure transformation of bytes the acquisition layer
//! already read; there are no retry semantics here — if a source is
//! unreadable the caller decides whether to re-acquire it.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;

use crate::chat::models::Attachment;

/// Upper bound on images per outgoing message.
pub const MAX_ATTACHMENTS: usize = 3;

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("could not read image data: {0}")]
    Encoding(#[from] std::io::Error),

    #[error("a message can include at most {max} images")]
    LimitReached { max: usize },
}

/// Base64-encode raw image bytes.
pub fn encode_bytes(bytes: &[u8]) -> Attachment {
    Attachment::new(STANDARD.encode(bytes))
}

/// Read and encode an image the acquisition layer left on disk.
pub fn encode_file(path: &Path) -> Result<Attachment, AttachmentError> {
    let bytes = std::fs::read(path)?;
    Ok(encode_bytes(&bytes))
}

/// Attachments accumulated for the message being composed.
///
/// Rejects the fourth image without touching the three already held.
#[derive(Debug, Default)]
pub struct PendingAttachments {
    items: Vec<Attachment>,
}

impl PendingAttachments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, attachment: Attachment) -> Result<(), AttachmentError> {
        if self.items.len() >= MAX_ATTACHMENTS {
            return Err(AttachmentError::LimitReached {
                max: MAX_ATTACHMENTS,
            });
        }
        self.items.push(attachment);
        Ok(())
    }

    pub fn items(&self) -> &[Attachment] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Hand the accumulated attachments to the outgoing message,
    /// resetting for the next composition.
    pub fn take(&mut self) -> Vec<Attachment> {
        std::mem::take(&mut self.items)
    }
}
