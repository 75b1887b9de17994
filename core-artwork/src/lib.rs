//! # Artwork Module
//!
//! Finds album covers and turns them into wallpapers.
//!
//! ## Overview
//!
//! This module handles:
//! - Cover candidates from the player thumbnail and the Discogs database
//! - Perceptual validation of candidates against a reference thumbnail
//! - The fallback chain that picks the first acceptable cover
//! - Wallpaper composition (blurred background plus centered cover)
//! - Templated output paths

pub mod chain;
pub mod compositor;
pub mod context;
pub mod error;
pub mod model;
pub mod output_path;
pub mod providers;
pub mod similarity;

pub use chain::CoverAcquisitionChain;
pub use compositor::{OutputFormat, WallpaperCompositor};
pub use context::{AcquisitionContext, ReferenceFetch};
pub use error::{ArtworkError, Result, SourceError, SourceErrorKind, SourceFailure};
pub use model::{CoverResult, ImageCandidate, TrackQuery};
pub use output_path::OutputPathFormatter;
pub use providers::{CandidateStream, CatalogSource, CoverSource, ThumbnailSource};
pub use similarity::{ImageSimilarity, SimilarityReport};
