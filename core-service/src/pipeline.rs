//! Wallpaper generation for one settled track change
//!
//! acquire cover → compose → resolve destination → write → apply

use crate::coordinator::TriggerHandler;
use crate::error::{Result, ServiceError};
use async_trait::async_trait;
use bridge_traits::storage::FileSystemAccess;
use bridge_traits::wallpaper::WallpaperSetter;
use bytes::Bytes;
use core_artwork::{
    CoverAcquisitionChain, OutputFormat, OutputPathFormatter, TrackQuery, WallpaperCompositor,
};
use core_runtime::config::ScreenSize;
use core_runtime::events::{CoreEvent, EventBus, WallpaperEvent};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// An encoded wallpaper and where it was written
#[derive(Clone)]
pub struct WallpaperArtifact {
    pub bytes: Bytes,
    pub destination_path: PathBuf,
}

impl fmt::Debug for WallpaperArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WallpaperArtifact")
            .field("bytes", &format_args!("{} bytes", self.bytes.len()))
            .field("destination_path", &self.destination_path)
            .finish()
    }
}

pub struct WallpaperPipeline {
    chain: CoverAcquisitionChain,
    compositor: WallpaperCompositor,
    formatter: OutputPathFormatter,
    screen: ScreenSize,
    file_system: Arc<dyn FileSystemAccess>,
    wallpaper_setter: Option<Arc<dyn WallpaperSetter>>,
    event_bus: EventBus,
}

impl WallpaperPipeline {
    pub fn new(
        chain: CoverAcquisitionChain,
        compositor: WallpaperCompositor,
        formatter: OutputPathFormatter,
        screen: ScreenSize,
        file_system: Arc<dyn FileSystemAccess>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            chain,
            compositor,
            formatter,
            screen,
            file_system,
            wallpaper_setter: None,
            event_bus,
        }
    }

    pub fn with_wallpaper_setter(mut self, setter: Arc<dyn WallpaperSetter>) -> Self {
        self.wallpaper_setter = Some(setter);
        self
    }

    /// Acquires, composes and writes the wallpaper for `query`
    ///
    /// Nothing is written unless composition succeeded.
    pub async fn create(&self, query: &TrackQuery) -> Result<WallpaperArtifact> {
        let destination_path = self.formatter.resolve(&query.artist, &query.album);
        let format = OutputFormat::from_path(&destination_path);

        let cover = self.chain.acquire(query).await?;
        let bytes = self
            .compositor
            .compose(self.screen.width, self.screen.height, cover.bytes, format)
            .await?;

        self.file_system
            .write_file(&destination_path, bytes.clone())
            .await?;

        info!(path = %destination_path.display(), "Wallpaper written");
        self.publish(WallpaperEvent::Created {
            path: destination_path.display().to_string(),
        });

        Ok(WallpaperArtifact {
            bytes,
            destination_path,
        })
    }

    /// Creates the wallpaper and hands it to the wallpaper setter
    ///
    /// Failures are logged and published as [`WallpaperEvent::Failed`]
    /// before being returned.
    #[instrument(skip(self, query), fields(artist = %query.artist, album = %query.album))]
    pub async fn process(&self, query: &TrackQuery) -> Result<WallpaperArtifact> {
        let outcome = match self.create(query).await {
            Ok(artifact) => self.apply(&artifact).await.map(|_| artifact),
            Err(e) => Err(e),
        };

        if let Err(e) = &outcome {
            error!("Wallpaper generation failed: {}", e);
            self.publish(WallpaperEvent::Failed {
                artist: query.artist.clone(),
                album: query.album.clone(),
                message: e.to_string(),
            });
        }
        outcome
    }

    async fn apply(&self, artifact: &WallpaperArtifact) -> Result<()> {
        let Some(setter) = &self.wallpaper_setter else {
            return Ok(());
        };

        let path = &artifact.destination_path;
        setter
            .set_wallpaper(path)
            .await
            .map_err(|e| ServiceError::ApplyFailed {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

        self.publish(WallpaperEvent::Applied {
            path: path.display().to_string(),
        });
        Ok(())
    }

    fn publish(&self, event: WallpaperEvent) {
        let _ = self.event_bus.emit(CoreEvent::Wallpaper(event));
    }
}

#[async_trait]
impl TriggerHandler for WallpaperPipeline {
    async fn on_trigger(&self, query: TrackQuery) {
        // Failures are already logged and published by `process`
        let _ = self.process(&query).await;
    }
}
