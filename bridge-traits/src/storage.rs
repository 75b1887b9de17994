//! Storage and File System Abstractions
//!
//! Provides a platform-agnostic trait for writing generated wallpapers.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

use crate::error::Result;

/// File system access trait
///
/// Abstracts the file I/O the wallpaper pipeline needs:
/// - Desktop: Direct filesystem access
/// - Sandboxed hosts: app container directories
///
/// # Atomicity
///
/// `write_file` must never leave a partially written file at `path`. Desktop
/// implementations write to a sibling temporary file and rename it into place,
/// so an OS wallpaper service watching the path only ever sees complete images.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::FileSystemAccess;
///
/// async fn save(fs: &dyn FileSystemAccess, data: Bytes) -> Result<()> {
///     fs.write_file(Path::new("/home/me/Pictures/Air-MoonSafari.png"), data).await
/// }
/// ```
#[async_trait]
pub trait FileSystemAccess: Send + Sync {
    /// Write data to a file atomically, replacing any previous content.
    ///
    /// Missing parent directories are created.
    async fn write_file(&self, path: &Path, data: Bytes) -> Result<()>;
}
