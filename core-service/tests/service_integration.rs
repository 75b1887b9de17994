//! Full flow: debounced track changes through acquisition, composition,
//! writing and applying.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::storage::FileSystemAccess;
use bridge_traits::wallpaper::WallpaperSetter;
use bytes::Bytes;
use core_runtime::config::{SourceKind, WallpaperConfig};
use core_runtime::events::{CoreEvent, TrackEvent, WallpaperEvent};
use core_service::{TrackChange, WallpaperService};
use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Serves the same thumbnail for every URL except `missing` ones, and
/// counts requests
#[derive(Default)]
struct ThumbnailServer {
    requests: Mutex<Vec<String>>,
    missing: Vec<String>,
}

impl ThumbnailServer {
    fn without(missing: &[&str]) -> Self {
        Self {
            missing: missing.iter().map(|url| url.to_string()).collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl HttpClient for ThumbnailServer {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.requests.lock().unwrap().push(request.url.clone());

        if self.missing.contains(&request.url) {
            return Ok(HttpResponse {
                status: 404,
                headers: HashMap::new(),
                body: Bytes::new(),
            });
        }

        let mut body = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_fn(30, 30, |x, y| {
            Rgb([(x * 8) as u8, (y * 8) as u8, 120])
        }))
        .write_to(&mut Cursor::new(&mut body), ImageFormat::Png)
        .unwrap();

        Ok(HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: Bytes::from(body),
        })
    }
}

#[derive(Default)]
struct MemoryFileSystem {
    files: Mutex<HashMap<PathBuf, Bytes>>,
}

#[async_trait]
impl FileSystemAccess for MemoryFileSystem {
    async fn write_file(&self, path: &Path, data: Bytes) -> BridgeResult<()> {
        self.files.lock().unwrap().insert(path.to_path_buf(), data);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingSetter {
    applied: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl WallpaperSetter for RecordingSetter {
    async fn set_wallpaper(&self, path: &Path) -> BridgeResult<()> {
        self.applied.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn burst_of_track_changes_produces_one_wallpaper() {
    let http = Arc::new(ThumbnailServer::default());
    let fs = Arc::new(MemoryFileSystem::default());
    let setter = Arc::new(RecordingSetter::default());

    let config = WallpaperConfig::builder()
        .screen_size(96, 54)
        .output_template("{artist}-{album}.png")
        .source_order(vec![SourceKind::Thumbnail])
        .http_client(http.clone())
        .file_system(fs.clone())
        .wallpaper_setter(setter.clone())
        .build()
        .unwrap();
    assert_eq!(config.debounce_ms, 5000);

    let service = WallpaperService::new(config).unwrap();
    let mut events = service.event_bus().subscribe();
    let (tx, rx) = mpsc::channel(8);
    let handle = service.start(rx);

    for (album, url) in [
        ("Premiers Symptomes", "https://thumb/1.jpg"),
        ("Talkie Walkie", "https://thumb/2.jpg"),
        ("Moon Safari", "https://thumb/3.jpg"),
    ] {
        tx.send(TrackChange::new("Air", album).with_thumbnail_url(url))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(1000)).await;
    }
    drop(tx);
    handle.join().await;

    // Reference download only; the candidate reuses it
    assert_eq!(
        *http.requests.lock().unwrap(),
        vec!["https://thumb/3.jpg".to_string()]
    );

    let files = fs.files.lock().unwrap();
    assert_eq!(files.len(), 1);
    let written = files.get(Path::new("Air-MoonSafari.png")).unwrap();
    assert_eq!(
        image::load_from_memory(written).unwrap().dimensions(),
        (96, 54)
    );

    assert_eq!(
        *setter.applied.lock().unwrap(),
        vec![PathBuf::from("Air-MoonSafari.png")]
    );

    let mut triggered = 0;
    let mut created = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            CoreEvent::Track(TrackEvent::Triggered { .. }) => triggered += 1,
            CoreEvent::Wallpaper(WallpaperEvent::Created { path }) => created.push(path),
            _ => {}
        }
    }
    assert_eq!(triggered, 1);
    assert_eq!(created, ["Air-MoonSafari.png"]);
}

#[tokio::test(start_paused = true)]
async fn failed_trigger_does_not_block_later_ones() {
    let http = Arc::new(ThumbnailServer::without(&["https://thumb/gone.jpg"]));
    let fs = Arc::new(MemoryFileSystem::default());
    let setter = Arc::new(RecordingSetter::default());

    let config = WallpaperConfig::builder()
        .screen_size(64, 36)
        .output_template("{album}.png")
        .source_order(vec![SourceKind::Thumbnail])
        .debounce_ms(1000)
        .http_client(http.clone())
        .file_system(fs.clone())
        .wallpaper_setter(setter.clone())
        .build()
        .unwrap();

    let service = WallpaperService::new(config).unwrap();
    let mut events = service.event_bus().subscribe();
    let (tx, rx) = mpsc::channel(8);
    let handle = service.start(rx);

    let change =
        TrackChange::new("Air", "Pocket Symphony").with_thumbnail_url("https://thumb/gone.jpg");
    tx.send(change).await.unwrap();
    tokio::time::sleep(Duration::from_millis(3000)).await;
    let change = TrackChange::new("Air", "Moon Safari").with_thumbnail_url("https://thumb/3.jpg");
    tx.send(change).await.unwrap();
    drop(tx);
    handle.join().await;

    assert_eq!(
        *http.requests.lock().unwrap(),
        vec![
            "https://thumb/gone.jpg".to_string(),
            "https://thumb/3.jpg".to_string()
        ]
    );

    // Nothing was written for the failed album
    let files = fs.files.lock().unwrap();
    assert_eq!(
        files.keys().cloned().collect::<Vec<_>>(),
        vec![PathBuf::from("MoonSafari.png")]
    );
    assert_eq!(
        *setter.applied.lock().unwrap(),
        vec![PathBuf::from("MoonSafari.png")]
    );

    let mut failed = Vec::new();
    let mut applied = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            CoreEvent::Wallpaper(WallpaperEvent::Failed { album, .. }) => failed.push(album),
            CoreEvent::Wallpaper(WallpaperEvent::Applied { path }) => applied.push(path),
            _ => {}
        }
    }
    assert_eq!(failed, ["Pocket Symphony"]);
    assert_eq!(applied, ["MoonSafari.png"]);
}

#[tokio::test]
async fn generate_bypasses_debounce() {
    let fs = Arc::new(MemoryFileSystem::default());
    let config = WallpaperConfig::builder()
        .screen_size(40, 40)
        .output_template("{album}.jpg")
        .source_order(vec![SourceKind::Thumbnail])
        .http_client(Arc::new(ThumbnailServer::default()))
        .file_system(fs.clone())
        .build()
        .unwrap();
    let service = WallpaperService::new(config).unwrap();

    let query = core_artwork::TrackQuery::new("Air", "Moon Safari")
        .with_thumbnail_url("https://thumb/1.jpg");
    let artifact = service.generate(&query).await.unwrap();

    assert_eq!(artifact.destination_path, PathBuf::from("MoonSafari.jpg"));
    assert_eq!(
        image::guess_format(&artifact.bytes).unwrap(),
        ImageFormat::Jpeg
    );
    assert!(fs.files.lock().unwrap().contains_key(Path::new("MoonSafari.jpg")));
}
