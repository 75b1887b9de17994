//! Wallpaper service façade and bootstrap.
//!
//! This crate wires the validated [`WallpaperConfig`] into the artwork core:
//! it builds the cover sources in configured order, the acquisition chain,
//! the compositor and the output path formatter, and runs the debounced
//! trigger loop that feeds them. Desktop apps typically enable the
//! `desktop-shims` feature so the HTTP client and file system default to the
//! `bridge-desktop` adapters.
//!
//! ```no_run
//! # async fn example() -> core_service::Result<()> {
//! use core_runtime::config::{CatalogApiConfig, WallpaperConfig};
//! use core_service::{TrackChange, WallpaperService};
//! use tokio::sync::mpsc;
//!
//! let config = WallpaperConfig::builder()
//!     .screen_size(2560, 1440)
//!     .output_template("~/Pictures/{artist}-{album}.png")
//!     .catalog_api_config(CatalogApiConfig::from_env())
//!     .build()?;
//!
//! let service = WallpaperService::new(config)?;
//! let (tx, rx) = mpsc::channel(32);
//! let handle = service.start(rx);
//!
//! tx.send(TrackChange::new("Air", "Moon Safari")).await.ok();
//! drop(tx);
//! handle.join().await;
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod error;
pub mod pipeline;

pub use coordinator::{CoordinatorHandle, TrackChange, TriggerCoordinator, TriggerHandler};
pub use error::{Result, ServiceError};
pub use pipeline::{WallpaperArtifact, WallpaperPipeline};

use core_artwork::{
    CatalogSource, CoverAcquisitionChain, CoverSource, OutputPathFormatter, ThumbnailSource,
    TrackQuery, WallpaperCompositor,
};
use core_runtime::config::{SourceKind, WallpaperConfig};
use core_runtime::events::EventBus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Primary façade exposed to host applications.
pub struct WallpaperService {
    config: WallpaperConfig,
    source_names: Vec<String>,
    pipeline: Arc<WallpaperPipeline>,
    event_bus: EventBus,
}

impl WallpaperService {
    /// Builds the service from a validated configuration.
    ///
    /// # Errors
    ///
    /// Fails before any network activity if the output template has
    /// unsupported placeholders or no cover source can be used.
    pub fn new(config: WallpaperConfig) -> Result<Self> {
        Self::with_event_bus(config, EventBus::default())
    }

    pub fn with_event_bus(config: WallpaperConfig, event_bus: EventBus) -> Result<Self> {
        config.validate()?;
        let formatter = OutputPathFormatter::parse(&config.output_template)?;

        let sources = build_sources(&config);
        if sources.is_empty() {
            return Err(ServiceError::Config(core_runtime::Error::Config(
                "No usable cover source: the catalog needs Discogs credentials".to_string(),
            )));
        }
        let source_names: Vec<String> = sources.iter().map(|s| s.name().to_string()).collect();

        let chain = CoverAcquisitionChain::new(sources, config.similarity)
            .with_policy(config.selection_policy)
            .with_event_bus(event_bus.clone());

        let mut pipeline = WallpaperPipeline::new(
            chain,
            WallpaperCompositor::new(config.compositor),
            formatter,
            config.screen,
            Arc::clone(&config.file_system),
            event_bus.clone(),
        );
        if let Some(setter) = &config.wallpaper_setter {
            pipeline = pipeline.with_wallpaper_setter(Arc::clone(setter));
        }

        info!(
            sources = ?source_names,
            width = config.screen.width,
            height = config.screen.height,
            template = %config.output_template,
            "Wallpaper service ready"
        );

        Ok(Self {
            config,
            source_names,
            pipeline: Arc::new(pipeline),
            event_bus,
        })
    }

    pub fn config(&self) -> &WallpaperConfig {
        &self.config
    }

    /// Names of the active sources, in priority order
    pub fn source_names(&self) -> &[String] {
        &self.source_names
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn pipeline(&self) -> Arc<WallpaperPipeline> {
        Arc::clone(&self.pipeline)
    }

    /// Generates a wallpaper right away, bypassing the debounce
    pub async fn generate(&self, query: &TrackQuery) -> Result<WallpaperArtifact> {
        self.pipeline.process(query).await
    }

    /// Starts consuming track changes from `changes`
    pub fn start(&self, changes: mpsc::Receiver<TrackChange>) -> CoordinatorHandle {
        TriggerCoordinator::new(Duration::from_millis(self.config.debounce_ms))
            .with_event_bus(self.event_bus.clone())
            .spawn(changes, self.pipeline())
    }
}

fn build_sources(config: &WallpaperConfig) -> Vec<Arc<dyn CoverSource>> {
    let mut sources: Vec<Arc<dyn CoverSource>> = Vec::with_capacity(config.source_order.len());

    for kind in &config.source_order {
        match kind {
            SourceKind::Catalog if config.catalog_api_config.has_credentials() => {
                sources.push(Arc::new(CatalogSource::new(
                    Arc::clone(&config.http_client),
                    config.catalog_api_config.clone(),
                )));
            }
            SourceKind::Catalog => {
                warn!("Discogs credentials not configured, catalog source disabled");
            }
            SourceKind::Thumbnail => {
                sources.push(Arc::new(ThumbnailSource::new(Arc::clone(
                    &config.http_client,
                ))));
            }
        }
    }

    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
    use bridge_traits::storage::FileSystemAccess;
    use bytes::Bytes;
    use core_artwork::ArtworkError;
    use core_runtime::config::CatalogApiConfig;
    use mockall::mock;
    use std::path::Path;

    mock! {
        pub HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    mock! {
        pub FileSystem {}

        #[async_trait]
        impl FileSystemAccess for FileSystem {
            async fn write_file(&self, path: &Path, data: Bytes) -> BridgeResult<()>;
        }
    }

    fn config(template: &str, catalog: CatalogApiConfig) -> WallpaperConfig {
        let mut http = MockHttpClient::new();
        http.expect_execute().never();
        let mut fs = MockFileSystem::new();
        fs.expect_write_file().never();

        WallpaperConfig::builder()
            .screen_size(1920, 1080)
            .output_template(template)
            .catalog_api_config(catalog)
            .http_client(Arc::new(http))
            .file_system(Arc::new(fs))
            .build()
            .unwrap()
    }

    #[test]
    fn test_invalid_template_is_fatal() {
        let result = WallpaperService::new(config(
            "{artist}-{unknown}.png",
            CatalogApiConfig::new(),
        ));

        match result {
            Err(error @ ServiceError::Artwork(ArtworkError::InvalidTemplate(_))) => {
                assert!(error.is_fatal());
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("template should have been rejected"),
        }
    }

    #[test]
    fn test_catalog_needs_credentials() {
        let service =
            WallpaperService::new(config("{artist}.png", CatalogApiConfig::new())).unwrap();
        assert_eq!(service.source_names(), ["thumbnail"]);

        let service = WallpaperService::new(config(
            "{artist}.png",
            CatalogApiConfig::new().with_credentials("key", "secret"),
        ))
        .unwrap();
        assert_eq!(service.source_names(), ["discogs", "thumbnail"]);
    }

    #[test]
    fn test_no_usable_source_is_rejected() {
        let mut config = config("{artist}.png", CatalogApiConfig::new());
        config.source_order = vec![SourceKind::Catalog];

        let result = WallpaperService::new(config);
        assert!(matches!(result, Err(ServiceError::Config(_))));
    }
}
