//! Collaborator boundaries consumed from the hosting shell: gallery media
//! writes and media-index registration. The updater core does not implement
//! these; they are specified here so the shell and tests can.

use std::path::Path;

use async_trait::async_trait;

use crate::core::error::UpdateError;

/// Media-index registration: make a finished file visible to the gallery.
/// Returns the content URI on success.
#[async_trait]
pub trait MediaIndex: Send + Sync {
    async fn register(&self, path: &Path, mime: &str) -> Result<String, UpdateError>;
}

/// Byte-buffer-to-shared-storage writer. Returns the content URI of the
/// saved file.
#[async_trait]
pub trait GalleryWriter: Send + Sync {
    async fn save_bytes(
        &self,
        bytes: &[u8],
        filename: &str,
        folder: &str,
    ) -> Result<String, UpdateError>;
}
