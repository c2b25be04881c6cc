//! Turns a user-selected file into an [`EncodedImage`].

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::AttachmentError;
use crate::state::{is_image_type, EncodedImage};

/// A file picked by the user, with the content type declared for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSelection {
    pub path: PathBuf,
    pub content_type: String,
}

impl FileSelection {
    /// Declare the content type from the file name, the way a browser file
    /// input does. Unknown extensions become `application/octet-stream`.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let content_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self { path, content_type }
    }

    pub fn is_image(&self) -> bool {
        is_image_type(&self.content_type)
    }
}

/// Proof that a selection was accepted. Only the most recent ticket may
/// install its image into the composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentTicket(pub(crate) u64);

/// Read and encode the selected file.
pub async fn encode(selection: &FileSelection) -> Result<EncodedImage, AttachmentError> {
    if !selection.is_image() {
        return Err(AttachmentError::NotAnImage {
            content_type: selection.content_type.clone(),
        });
    }

    let bytes = read_file(&selection.path).await?;
    debug!(
        path = %selection.path.display(),
        mime = %selection.content_type,
        bytes = bytes.len(),
        "encoded attachment"
    );
    EncodedImage::from_bytes(&selection.content_type, &bytes)
}

async fn read_file(path: &Path) -> Result<Vec<u8>, AttachmentError> {
    tokio::fs::read(path).await.map_err(|source| AttachmentError::Read {
        path: path.to_path_buf(),
        source,
    })
}
