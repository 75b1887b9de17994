//! # Core Configuration Module
//!
//! Provides configuration management for the wallpaper core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! `WallpaperConfig` instance that holds every dependency and setting the core
//! needs. It enforces fail-fast validation so a bad template, screen size or
//! threshold is reported at startup, before any track change is processed or
//! any network call is made.
//!
//! ## Required Settings
//!
//! - `screen_size` - Canvas dimensions of the generated wallpaper
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `HttpClient` - HTTP operations (desktop default: reqwest)
//! - `FileSystemAccess` - File I/O (desktop default: tokio fs)
//! - `WallpaperSetter` - Applies the generated image (no default; without it
//!   the wallpaper is only written to disk)
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults for
//! `HttpClient` and `FileSystemAccess` are injected automatically if not
//! provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{CatalogApiConfig, WallpaperConfig};
//!
//! let config = WallpaperConfig::builder()
//!     .screen_size(2560, 1440)
//!     .output_template("~/Pictures/{artist}-{album}.png")
//!     .catalog_api_config(CatalogApiConfig::from_env())
//!     .build()?;
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::WallpaperConfig;
//!
//! // Screen size is required
//! let config = WallpaperConfig::builder()
//!     .build()
//!     .expect("Should fail - missing screen size");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{FileSystemAccess, HttpClient, WallpaperSetter};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default output template, relative to the working directory.
pub const DEFAULT_OUTPUT_TEMPLATE: &str = "{artist}-{album}.png";

/// Default quiet period before a track change triggers a wallpaper.
pub const DEFAULT_DEBOUNCE_MS: u64 = 5_000;

/// Largest canvas edge accepted by validation.
pub const MAX_SCREEN_EDGE: u32 = 16_384;

/// Environment variable holding the Discogs consumer key.
pub const DISCOGS_KEY_ENV: &str = "DISCOGS_CONSUMER_KEY";

/// Environment variable holding the Discogs consumer secret.
pub const DISCOGS_SECRET_ENV: &str = "DISCOGS_CONSUMER_SECRET";

/// Wallpaper canvas size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Cover sources that can take part in acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Music catalog database search (Discogs)
    Catalog,
    /// The player-provided low resolution thumbnail
    Thumbnail,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Catalog => "catalog",
            SourceKind::Thumbnail => "thumbnail",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the acquisition chain picks among validated candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SelectionPolicy {
    /// Accept the first candidate that decodes and validates.
    #[default]
    FirstMatch,
    /// Within the first source that yields any accepted candidate, keep the
    /// one closest to the reference image.
    BestMatch,
}

/// Limits below which two images count as the same cover.
///
/// Both values are fractions in `(0, 1]`; a candidate is accepted only when
/// its perceived distance AND its pixel difference are strictly below them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimilarityThresholds {
    pub max_distance: f64,
    pub max_difference: f64,
}

impl Default for SimilarityThresholds {
    fn default() -> Self {
        Self {
            max_distance: 0.15,
            max_difference: 0.15,
        }
    }
}

impl SimilarityThresholds {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("distance", self.max_distance),
            ("difference", self.max_difference),
        ] {
            if !value.is_finite() || value <= 0.0 || value > 1.0 {
                return Err(Error::Config(format!(
                    "Similarity {} threshold must be in (0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Settings for the wallpaper compositor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositorSettings {
    /// Blur radius in pixels for the background copy (sigma is half of it)
    pub blur_radius: f32,
    /// Enlargement applied to the background copy after cover-fill
    pub background_scale: f32,
}

impl Default for CompositorSettings {
    fn default() -> Self {
        Self {
            blur_radius: 20.0,
            background_scale: 1.5,
        }
    }
}

impl CompositorSettings {
    pub fn validate(&self) -> Result<()> {
        if !self.blur_radius.is_finite() || self.blur_radius < 0.0 {
            return Err(Error::Config(format!(
                "Blur radius must be a non-negative number, got {}",
                self.blur_radius
            )));
        }

        if !self.background_scale.is_finite() || !(1.0..=4.0).contains(&self.background_scale) {
            return Err(Error::Config(format!(
                "Background scale must be between 1.0 and 4.0, got {}",
                self.background_scale
            )));
        }

        Ok(())
    }
}

/// Configuration for the Discogs database API.
///
/// # Security Note
///
/// Credentials should never be hardcoded in the binary. Load them from the
/// environment with [`CatalogApiConfig::from_env`] or from the host's secure
/// configuration. `Debug` output never includes them.
///
/// # Example
///
/// ```no_run
/// use core_runtime::config::CatalogApiConfig;
///
/// let config = CatalogApiConfig::new()
///     .with_credentials("consumer-key", "consumer-secret")
///     .with_rate_limit_delay_ms(1000);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct CatalogApiConfig {
    /// Discogs consumer key
    pub consumer_key: Option<String>,

    /// Discogs consumer secret
    pub consumer_secret: Option<String>,

    /// User agent sent with every request
    ///
    /// Discogs rejects requests without an identifying user agent.
    /// Format: "ApplicationName/Version"
    pub user_agent: String,

    /// Minimum delay in milliseconds between API requests
    ///
    /// Default: 1000ms. Unauthenticated clients get 25 requests per minute,
    /// authenticated ones 60.
    pub rate_limit_delay_ms: u64,
}

impl Default for CatalogApiConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CatalogApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogApiConfig")
            .field("consumer_key", &self.consumer_key.as_ref().map(|_| "***"))
            .field(
                "consumer_secret",
                &self.consumer_secret.as_ref().map(|_| "***"),
            )
            .field("user_agent", &self.user_agent)
            .field("rate_limit_delay_ms", &self.rate_limit_delay_ms)
            .finish()
    }
}

impl CatalogApiConfig {
    /// Creates a config with no credentials
    pub fn new() -> Self {
        Self {
            consumer_key: None,
            consumer_secret: None,
            user_agent: concat!("coverwall/", env!("CARGO_PKG_VERSION")).to_string(),
            rate_limit_delay_ms: 1000,
        }
    }

    /// Reads credentials from `DISCOGS_CONSUMER_KEY` / `DISCOGS_CONSUMER_SECRET`
    ///
    /// Unset or blank variables leave the corresponding field empty.
    pub fn from_env() -> Self {
        let read = |name: &str| {
            std::env::var(name)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        Self {
            consumer_key: read(DISCOGS_KEY_ENV),
            consumer_secret: read(DISCOGS_SECRET_ENV),
            ..Self::new()
        }
    }

    pub fn with_credentials(
        mut self,
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
    ) -> Self {
        self.consumer_key = Some(consumer_key.into());
        self.consumer_secret = Some(consumer_secret.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_rate_limit_delay_ms(mut self, delay_ms: u64) -> Self {
        self.rate_limit_delay_ms = delay_ms;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        match (&self.consumer_key, &self.consumer_secret) {
            (Some(key), Some(secret)) if key.is_empty() || secret.is_empty() => {
                return Err(Error::Config(
                    "Discogs consumer key and secret cannot be empty".to_string(),
                ));
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(Error::Config(format!(
                    "Discogs credentials are incomplete: set both {} and {}",
                    DISCOGS_KEY_ENV, DISCOGS_SECRET_ENV
                )));
            }
            _ => {}
        }

        if self.user_agent.trim().is_empty() {
            return Err(Error::Config(
                "Catalog user agent cannot be empty".to_string(),
            ));
        }

        if self.rate_limit_delay_ms == 0 {
            return Err(Error::Config(
                "Rate limit delay must be greater than 0ms".to_string(),
            ));
        }

        if self.rate_limit_delay_ms > 60000 {
            return Err(Error::Config(
                "Rate limit delay exceeds maximum of 60 seconds (60,000ms)".to_string(),
            ));
        }

        Ok(())
    }

    /// Checks if Discogs credentials are configured
    pub fn has_credentials(&self) -> bool {
        self.consumer_key.is_some() && self.consumer_secret.is_some()
    }
}

/// Core configuration for the wallpaper service.
///
/// Use [`WallpaperConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct WallpaperConfig {
    /// Destination path template; only `{artist}` and `{album}` are allowed
    pub output_template: String,

    /// Canvas size of the generated wallpaper
    pub screen: ScreenSize,

    /// Sources in priority order
    pub source_order: Vec<SourceKind>,

    /// Discogs API configuration
    pub catalog_api_config: CatalogApiConfig,

    /// Cover validation limits
    pub similarity: SimilarityThresholds,

    /// Candidate selection policy
    pub selection_policy: SelectionPolicy,

    /// Quiet period after the last track change, in milliseconds
    pub debounce_ms: u64,

    /// Compositor tuning
    pub compositor: CompositorSettings,

    /// HTTP client for API requests and image downloads
    pub http_client: Arc<dyn HttpClient>,

    /// File system access for writing wallpapers
    pub file_system: Arc<dyn FileSystemAccess>,

    /// Applies generated wallpapers (optional)
    pub wallpaper_setter: Option<Arc<dyn WallpaperSetter>>,
}

impl fmt::Debug for WallpaperConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WallpaperConfig")
            .field("output_template", &self.output_template)
            .field("screen", &self.screen)
            .field("source_order", &self.source_order)
            .field("catalog_api_config", &self.catalog_api_config)
            .field("similarity", &self.similarity)
            .field("selection_policy", &self.selection_policy)
            .field("debounce_ms", &self.debounce_ms)
            .field("compositor", &self.compositor)
            .field("http_client", &"HttpClient { ... }")
            .field("file_system", &"FileSystemAccess { ... }")
            .field(
                "wallpaper_setter",
                &self
                    .wallpaper_setter
                    .as_ref()
                    .map(|_| "WallpaperSetter { ... }"),
            )
            .finish()
    }
}

impl WallpaperConfig {
    /// Creates a new builder for constructing a `WallpaperConfig`.
    pub fn builder() -> WallpaperConfigBuilder {
        WallpaperConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Output template is not blank
    /// - Screen dimensions are non-zero and at most 16384 pixels
    /// - At least one source is configured and none is listed twice
    /// - Thresholds, compositor settings and the catalog config are in range
    ///
    /// Template placeholders are checked by the output path formatter when
    /// the service starts.
    pub fn validate(&self) -> Result<()> {
        if self.output_template.trim().is_empty() {
            return Err(Error::Config("Output template cannot be empty".to_string()));
        }

        let ScreenSize { width, height } = self.screen;
        if width == 0 || height == 0 {
            return Err(Error::Config(format!(
                "Screen size must be non-zero, got {}x{}",
                width, height
            )));
        }

        if width > MAX_SCREEN_EDGE || height > MAX_SCREEN_EDGE {
            return Err(Error::Config(format!(
                "Screen size {}x{} exceeds maximum edge of {} pixels",
                width, height, MAX_SCREEN_EDGE
            )));
        }

        if self.source_order.is_empty() {
            return Err(Error::Config(
                "At least one cover source must be configured".to_string(),
            ));
        }

        for (index, kind) in self.source_order.iter().enumerate() {
            if self.source_order[..index].contains(kind) {
                return Err(Error::Config(format!(
                    "Cover source '{}' is listed more than once",
                    kind
                )));
            }
        }

        if self.debounce_ms > 600_000 {
            return Err(Error::Config(
                "Debounce exceeds maximum of 10 minutes (600,000ms)".to_string(),
            ));
        }

        self.similarity.validate()?;
        self.compositor.validate()?;
        self.catalog_api_config.validate()?;

        Ok(())
    }

    /// Whether the catalog source takes part in acquisition
    pub fn catalog_enabled(&self) -> bool {
        self.source_order.contains(&SourceKind::Catalog)
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn capability_missing_error(capability: &str, purpose: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: format!(
            "{} implementation is required for {}. \
             Desktop: enable the 'desktop-shims' feature to use the default implementation. \
             Other hosts: inject a platform implementation through the builder.",
            capability, purpose
        ),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::new().map_err(|e| {
        Error::Internal(format!("Failed to initialize default HttpClient: {}", e))
    })?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(capability_missing_error("HttpClient", "cover downloads"))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    use bridge_desktop::TokioFileSystem;

    let fs: Arc<dyn FileSystemAccess> = Arc::new(TokioFileSystem::new());
    Ok(fs)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_file_system() -> Result<Arc<dyn FileSystemAccess>> {
    Err(capability_missing_error("FileSystemAccess", "writing wallpapers"))
}

/// Builder for constructing [`WallpaperConfig`] instances.
///
/// Call [`build()`](WallpaperConfigBuilder::build) to validate and create
/// the final config.
#[derive(Default)]
pub struct WallpaperConfigBuilder {
    output_template: Option<String>,
    screen: Option<ScreenSize>,
    source_order: Option<Vec<SourceKind>>,
    catalog_api_config: Option<CatalogApiConfig>,
    similarity: SimilarityThresholds,
    selection_policy: SelectionPolicy,
    debounce_ms: Option<u64>,
    compositor: CompositorSettings,
    http_client: Option<Arc<dyn HttpClient>>,
    file_system: Option<Arc<dyn FileSystemAccess>>,
    wallpaper_setter: Option<Arc<dyn WallpaperSetter>>,
}

impl WallpaperConfigBuilder {
    /// Sets the destination path template.
    ///
    /// Default: `{artist}-{album}.png` in the working directory.
    ///
    /// ```
    /// use core_runtime::config::WallpaperConfig;
    ///
    /// let builder = WallpaperConfig::builder()
    ///     .output_template("~/Pictures/{artist}-{album}.png");
    /// ```
    pub fn output_template(mut self, template: impl Into<String>) -> Self {
        self.output_template = Some(template.into());
        self
    }

    /// Sets the wallpaper canvas size (required).
    pub fn screen_size(mut self, width: u32, height: u32) -> Self {
        self.screen = Some(ScreenSize::new(width, height));
        self
    }

    /// Sets the source priority order.
    ///
    /// Default: catalog first, then the player thumbnail.
    pub fn source_order(mut self, order: Vec<SourceKind>) -> Self {
        self.source_order = Some(order);
        self
    }

    /// Sets the Discogs API configuration.
    ///
    /// Without credentials the catalog source is skipped at startup.
    pub fn catalog_api_config(mut self, config: CatalogApiConfig) -> Self {
        self.catalog_api_config = Some(config);
        self
    }

    /// Sets the similarity thresholds.
    ///
    /// Default: 0.15 perceived distance, 0.15 pixel difference
    pub fn similarity(mut self, thresholds: SimilarityThresholds) -> Self {
        self.similarity = thresholds;
        self
    }

    /// Sets the candidate selection policy.
    ///
    /// Default: [`SelectionPolicy::FirstMatch`]
    pub fn selection_policy(mut self, policy: SelectionPolicy) -> Self {
        self.selection_policy = policy;
        self
    }

    /// Sets the debounce quiet period in milliseconds.
    ///
    /// Default: 5000 ms
    pub fn debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = Some(debounce_ms);
        self
    }

    /// Sets the background blur radius.
    ///
    /// Default: 20.0
    pub fn blur_radius(mut self, radius: f32) -> Self {
        self.compositor.blur_radius = radius;
        self
    }

    /// Sets the background enlargement factor.
    ///
    /// Default: 1.5
    pub fn background_scale(mut self, scale: f32) -> Self {
        self.compositor.background_scale = scale;
        self
    }

    /// Sets the HTTP client implementation.
    ///
    /// If not provided, the desktop default (reqwest-based) will be used when
    /// the `desktop-shims` feature is enabled.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Sets the file system access implementation.
    ///
    /// If not provided, the desktop default (tokio fs-based) will be used when
    /// the `desktop-shims` feature is enabled.
    pub fn file_system(mut self, fs: Arc<dyn FileSystemAccess>) -> Self {
        self.file_system = Some(fs);
        self
    }

    /// Sets the wallpaper setter (optional).
    pub fn wallpaper_setter(mut self, setter: Arc<dyn WallpaperSetter>) -> Self {
        self.wallpaper_setter = Some(setter);
        self
    }

    /// Builds the final `WallpaperConfig` instance.
    ///
    /// # Returns
    ///
    /// Returns an error if:
    /// - The screen size is missing
    /// - A required bridge is missing and no platform default exists
    /// - Configuration values are invalid
    pub fn build(self) -> Result<WallpaperConfig> {
        let screen = self.screen.ok_or_else(|| {
            Error::Config("Screen size is required. Use .screen_size() to set it.".to_string())
        })?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let file_system = match self.file_system {
            Some(fs) => fs,
            None => provide_default_file_system()?,
        };

        let config = WallpaperConfig {
            output_template: self
                .output_template
                .unwrap_or_else(|| DEFAULT_OUTPUT_TEMPLATE.to_string()),
            screen,
            source_order: self
                .source_order
                .unwrap_or_else(|| vec![SourceKind::Catalog, SourceKind::Thumbnail]),
            catalog_api_config: self.catalog_api_config.unwrap_or_default(),
            similarity: self.similarity,
            selection_policy: self.selection_policy,
            debounce_ms: self.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS),
            compositor: self.compositor,
            http_client,
            file_system,
            wallpaper_setter: self.wallpaper_setter,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::{
        error::Result as BridgeResult, HttpRequest, HttpResponse,
    };
    use bytes::Bytes;
    use std::path::Path;

    struct NoopHttpClient;

    #[async_trait]
    impl HttpClient for NoopHttpClient {
        async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
            Ok(HttpResponse {
                status: 404,
                headers: Default::default(),
                body: Bytes::new(),
            })
        }
    }

    struct NoopFileSystem;

    #[async_trait]
    impl FileSystemAccess for NoopFileSystem {
        async fn write_file(&self, _path: &Path, _data: Bytes) -> BridgeResult<()> {
            Ok(())
        }
    }

    fn builder() -> WallpaperConfigBuilder {
        WallpaperConfig::builder()
            .screen_size(1920, 1080)
            .http_client(Arc::new(NoopHttpClient))
            .file_system(Arc::new(NoopFileSystem))
    }

    #[test]
    fn test_builder_defaults() {
        let config = builder().build().unwrap();

        assert_eq!(config.output_template, DEFAULT_OUTPUT_TEMPLATE);
        assert_eq!(config.screen, ScreenSize::new(1920, 1080));
        assert_eq!(
            config.source_order,
            vec![SourceKind::Catalog, SourceKind::Thumbnail]
        );
        assert_eq!(config.similarity, SimilarityThresholds::default());
        assert_eq!(config.selection_policy, SelectionPolicy::FirstMatch);
        assert_eq!(config.debounce_ms, 5000);
        assert_eq!(config.compositor.blur_radius, 20.0);
        assert_eq!(config.compositor.background_scale, 1.5);
        assert!(config.wallpaper_setter.is_none());
        assert!(config.catalog_enabled());
    }

    #[test]
    fn test_builder_requires_screen_size() {
        let result = WallpaperConfig::builder()
            .http_client(Arc::new(NoopHttpClient))
            .file_system(Arc::new(NoopFileSystem))
            .build();

        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Screen size is required"));
    }

    #[cfg(not(feature = "desktop-shims"))]
    #[test]
    fn test_builder_requires_http_client_without_shims() {
        let result = WallpaperConfig::builder()
            .screen_size(800, 600)
            .file_system(Arc::new(NoopFileSystem))
            .build();

        let err = result.unwrap_err();
        assert!(matches!(err, Error::CapabilityMissing { .. }));
        assert!(err.to_string().contains("HttpClient"));
    }

    #[cfg(feature = "desktop-shims")]
    #[test]
    fn test_build_with_desktop_defaults() {
        let config = WallpaperConfig::builder()
            .screen_size(800, 600)
            .build()
            .expect("desktop defaults should succeed");

        assert_eq!(config.screen.width, 800);
    }

    #[test]
    fn test_validate_rejects_zero_screen() {
        let err = builder().screen_size(0, 1080).build().unwrap_err();
        assert!(err.to_string().contains("non-zero"));
    }

    #[test]
    fn test_validate_rejects_huge_screen() {
        let err = builder().screen_size(40_000, 1080).build().unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_validate_rejects_blank_template() {
        let err = builder().output_template("   ").build().unwrap_err();
        assert!(err.to_string().contains("Output template"));
    }

    #[test]
    fn test_validate_rejects_empty_or_duplicate_sources() {
        let err = builder().source_order(vec![]).build().unwrap_err();
        assert!(err.to_string().contains("At least one cover source"));

        let err = builder()
            .source_order(vec![SourceKind::Thumbnail, SourceKind::Thumbnail])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_validate_rejects_out_of_range_thresholds() {
        let err = builder()
            .similarity(SimilarityThresholds {
                max_distance: 0.0,
                max_difference: 0.15,
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("distance threshold"));

        let err = builder()
            .similarity(SimilarityThresholds {
                max_distance: 0.15,
                max_difference: f64::NAN,
            })
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("difference threshold"));
    }

    #[test]
    fn test_validate_rejects_bad_compositor_settings() {
        assert!(builder().blur_radius(-1.0).build().is_err());
        assert!(builder().background_scale(0.5).build().is_err());
        assert!(builder().background_scale(2.0).build().is_ok());
    }

    #[test]
    fn test_catalog_config_validation() {
        assert!(CatalogApiConfig::new().validate().is_ok());
        assert!(CatalogApiConfig::new()
            .with_credentials("key", "secret")
            .validate()
            .is_ok());
        assert!(CatalogApiConfig::new()
            .with_credentials("", "secret")
            .validate()
            .is_err());
        assert!(CatalogApiConfig::new()
            .with_rate_limit_delay_ms(0)
            .validate()
            .is_err());
        assert!(CatalogApiConfig::new()
            .with_rate_limit_delay_ms(120_000)
            .validate()
            .is_err());
        assert!(CatalogApiConfig::new()
            .with_user_agent(" ")
            .validate()
            .is_err());

        let half = CatalogApiConfig {
            consumer_key: Some("key".to_string()),
            ..CatalogApiConfig::new()
        };
        assert!(half.validate().unwrap_err().to_string().contains("incomplete"));
    }

    #[test]
    fn test_catalog_config_debug_hides_secrets() {
        let config = CatalogApiConfig::new().with_credentials("my-key", "my-secret");
        let debug = format!("{:?}", config);

        assert!(!debug.contains("my-key"));
        assert!(!debug.contains("my-secret"));
        assert!(debug.contains("***"));
        assert!(config.has_credentials());
    }

    #[test]
    fn test_source_kind_serialization() {
        let json = serde_json::to_string(&vec![SourceKind::Thumbnail, SourceKind::Catalog]).unwrap();
        assert_eq!(json, r#"["thumbnail","catalog"]"#);
        assert_eq!(SourceKind::Catalog.to_string(), "catalog");
    }

    #[test]
    fn test_config_is_cloneable() {
        let config = builder().debounce_ms(250).build().unwrap();
        let cloned = config.clone();

        assert_eq!(cloned.debounce_ms, 250);
        assert_eq!(cloned.output_template, config.output_template);
    }
}
