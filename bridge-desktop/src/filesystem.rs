//! File System Access Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    storage::FileSystemAccess,
};
use bytes::Bytes;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Tokio-based file system implementation
///
/// Writes go to a hidden sibling file (`.<name>.partial`) which is flushed and
/// then renamed over the destination, so a failed write never leaves a
/// truncated wallpaper behind.
#[derive(Debug, Default, Clone)]
pub struct TokioFileSystem;

impl TokioFileSystem {
    pub fn new() -> Self {
        Self
    }

    /// Convert std::io::Error to BridgeError
    fn map_io_error(e: std::io::Error) -> BridgeError {
        BridgeError::Io(e)
    }

    /// Temporary path used while writing `path`
    fn partial_path(path: &Path) -> Result<PathBuf> {
        let file_name = path.file_name().ok_or_else(|| {
            BridgeError::OperationFailed(format!("Not a file path: {}", path.display()))
        })?;

        let mut partial = OsString::from(".");
        partial.push(file_name);
        partial.push(".partial");

        Ok(path.with_file_name(partial))
    }

    async fn write_partial(partial: &Path, data: &[u8]) -> std::io::Result<()> {
        let mut file = fs::File::create(partial).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[async_trait]
impl FileSystemAccess for TokioFileSystem {
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(Self::map_io_error)?;
        }

        let partial = Self::partial_path(path)?;

        if let Err(e) = Self::write_partial(&partial, &data).await {
            if let Err(cleanup) = fs::remove_file(&partial).await {
                warn!(path = ?partial, error = %cleanup, "Failed to remove partial file");
            }
            return Err(Self::map_io_error(e));
        }

        if let Err(e) = fs::rename(&partial, path).await {
            let _ = fs::remove_file(&partial).await;
            return Err(Self::map_io_error(e));
        }

        debug!(path = ?path, size = data.len(), "Wrote file");
        Ok(())
    }
}
