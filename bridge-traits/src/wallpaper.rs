//! Wallpaper Setter Abstraction
//!
//! The OS-level "set desktop picture" call is host specific (AppleScript on
//! macOS, `SystemParametersInfo` on Windows, gsettings/feh on Linux). The core
//! only produces an image file and hands its path to this trait exactly once
//! per generated wallpaper.

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;

/// Applies a generated image file as the desktop background
///
/// Implementations may refuse (for example when every desktop has picture
/// rotation enabled) by returning an error; the core logs the failure and keeps
/// processing later track changes.
#[async_trait]
pub trait WallpaperSetter: Send + Sync {
    /// Set the wallpaper to the image at `path`
    async fn set_wallpaper(&self, path: &Path) -> Result<()>;
}
