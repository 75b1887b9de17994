//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the wallpaper core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities that the artwork and service
//! crates depend on. It establishes the configuration contract, logging
//! conventions, and event broadcasting used throughout the system.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{
    CatalogApiConfig, CompositorSettings, ScreenSize, SelectionPolicy, SimilarityThresholds,
    SourceKind, WallpaperConfig,
};
pub use error::{Error, Result};
