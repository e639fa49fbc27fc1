use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::errors::AppResult;

use super::{AvatarUploader, FileAvatarUploader};

/// Adapts a path-based upload API to [`AvatarUploader`].
///
/// Every upload overwrites the same file; it only exists to satisfy the
/// inner API and is never read back by the rotator.
pub struct FileShimUploader<U> {
    inner: U,
    path: PathBuf,
}

impl<U: FileAvatarUploader> FileShimUploader<U> {
    pub fn new(inner: U, path: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl<U: FileAvatarUploader> AvatarUploader for FileShimUploader<U> {
    async fn set_avatar(&self, user_id: &str, image: Vec<u8>) -> AppResult<()> {
        tokio::fs::write(&self.path, &image).await?;
        log::debug!("Wrote {} bytes to {}", image.len(), self.path.display());

        self.inner.set_avatar_from_file(user_id, &self.path).await
    }
}
