//! Values passed between sources, the acquisition chain and the compositor

use bytes::Bytes;
use std::fmt;

/// What to look for: built once per track change and consumed by one
/// acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackQuery {
    pub artist: String,
    pub album: String,
    /// Low resolution cover the player already knows about
    pub thumbnail_url: Option<String>,
}

impl TrackQuery {
    pub fn new(artist: impl Into<String>, album: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            album: album.into(),
            thumbnail_url: None,
        }
    }

    pub fn with_thumbnail_url(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }

    /// Free-text form used by broad catalog searches
    pub fn search_text(&self) -> String {
        format!("{} {}", self.artist, self.album)
    }
}

/// An unvalidated image downloaded by a source
#[derive(Clone)]
pub struct ImageCandidate {
    pub bytes: Bytes,
    pub origin_url: String,
    pub source_name: String,
}

impl ImageCandidate {
    pub fn new(bytes: Bytes, origin_url: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self {
            bytes,
            origin_url: origin_url.into(),
            source_name: source_name.into(),
        }
    }
}

impl fmt::Debug for ImageCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageCandidate")
            .field("bytes", &format_args!("{} bytes", self.bytes.len()))
            .field("origin_url", &self.origin_url)
            .field("source_name", &self.source_name)
            .finish()
    }
}

/// An accepted cover. Never re-validated once produced.
#[derive(Clone)]
pub struct CoverResult {
    pub bytes: Bytes,
    pub source_name: String,
    pub origin_url: String,
    pub width: u32,
    pub height: u32,
    /// Perceived distance to the reference, when one was available
    pub distance: Option<f64>,
}

impl fmt::Debug for CoverResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoverResult")
            .field("bytes", &format_args!("{} bytes", self.bytes.len()))
            .field("source_name", &self.source_name)
            .field("origin_url", &self.origin_url)
            .field("dimensions", &format_args!("{}x{}", self.width, self.height))
            .field("distance", &self.distance)
            .finish()
    }
}
