//! Trigger Coordinator
//!
//! Turns a noisy feed of track changes into wallpaper generations.
//!
//! ## Behavior
//!
//! - Changes without an artist or album are dropped.
//! - Trailing-edge debounce: every accepted change restarts the quiet period;
//!   only the last change of a burst fires, once the period has elapsed.
//! - Fired triggers go to a single worker through a latest-wins slot.
//!   Generations never overlap, and a trigger still waiting while the worker
//!   is busy is replaced by a newer one.
//! - Closing the feed flushes a pending change (after its quiet period) and
//!   stops both tasks once the worker is idle.

use async_trait::async_trait;
use core_artwork::TrackQuery;
use core_runtime::events::{CoreEvent, EventBus, TrackEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Track-change notification from the player feed
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TrackChange {
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default, alias = "albumArt")]
    pub thumbnail_url: Option<String>,
}

impl TrackChange {
    pub fn new(artist: impl Into<String>, album: impl Into<String>) -> Self {
        Self {
            artist: Some(artist.into()),
            album: Some(album.into()),
            thumbnail_url: None,
        }
    }

    pub fn with_thumbnail_url(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }

    /// The query to run, or why this change cannot trigger one
    pub fn into_query(self) -> Result<TrackQuery, &'static str> {
        let present = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        let artist = present(self.artist).ok_or("missing artist")?;
        let album = present(self.album).ok_or("missing album")?;

        let query = TrackQuery::new(artist, album);
        Ok(match present(self.thumbnail_url) {
            Some(url) => query.with_thumbnail_url(url),
            None => query,
        })
    }
}

/// Receives settled triggers, one at a time
#[async_trait]
pub trait TriggerHandler: Send + Sync {
    async fn on_trigger(&self, query: TrackQuery);
}

/// Running coordinator tasks
pub struct CoordinatorHandle {
    debounce: JoinHandle<()>,
    worker: JoinHandle<()>,
}

impl CoordinatorHandle {
    /// Waits until the feed is closed and the last generation finished
    pub async fn join(self) {
        if let Err(e) = self.debounce.await {
            warn!("Debounce task ended abnormally: {}", e);
        }
        if let Err(e) = self.worker.await {
            warn!("Trigger worker ended abnormally: {}", e);
        }
    }

    /// Stops both tasks without waiting for in-flight work
    pub fn abort(&self) {
        self.debounce.abort();
        self.worker.abort();
    }
}

#[derive(Clone)]
pub struct TriggerCoordinator {
    quiet_period: Duration,
    event_bus: Option<EventBus>,
}

impl TriggerCoordinator {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    /// Starts the debounce and worker tasks on the current runtime
    pub fn spawn<H>(self, changes: mpsc::Receiver<TrackChange>, handler: Arc<H>) -> CoordinatorHandle
    where
        H: TriggerHandler + ?Sized + 'static,
    {
        let (slot_tx, slot_rx) = watch::channel(None);

        let worker = tokio::spawn(run_worker(slot_rx, handler));
        let debounce = tokio::spawn(self.run_debounce(changes, slot_tx));

        CoordinatorHandle { debounce, worker }
    }

    async fn run_debounce(
        self,
        mut changes: mpsc::Receiver<TrackChange>,
        slot: watch::Sender<Option<TrackQuery>>,
    ) {
        let mut pending: Option<(TrackQuery, Instant)> = None;

        loop {
            let deadline = pending.as_ref().map(|(_, deadline)| *deadline);

            tokio::select! {
                received = changes.recv() => match received {
                    Some(change) => {
                        if let Some(query) = self.accept(change) {
                            pending = Some((query, Instant::now() + self.quiet_period));
                        }
                    }
                    None => break,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if let Some((query, _)) = pending.take() {
                        self.fire(&slot, query);
                    }
                }
            }
        }

        if let Some((query, deadline)) = pending.take() {
            sleep_until(deadline).await;
            self.fire(&slot, query);
        }
        debug!("Track change feed closed");
    }

    fn accept(&self, change: TrackChange) -> Option<TrackQuery> {
        match change.into_query() {
            Ok(query) => {
                debug!(artist = %query.artist, album = %query.album, "Track changed");
                self.publish(TrackEvent::Changed {
                    artist: query.artist.clone(),
                    album: query.album.clone(),
                });
                Some(query)
            }
            Err(reason) => {
                debug!("Ignoring track change: {}", reason);
                self.publish(TrackEvent::Ignored {
                    reason: reason.to_string(),
                });
                None
            }
        }
    }

    fn fire(&self, slot: &watch::Sender<Option<TrackQuery>>, query: TrackQuery) {
        info!(artist = %query.artist, album = %query.album, "Track settled");
        self.publish(TrackEvent::Triggered {
            artist: query.artist.clone(),
            album: query.album.clone(),
        });
        // Replaces a trigger the worker has not picked up yet
        slot.send_replace(Some(query));
    }

    fn publish(&self, event: TrackEvent) {
        if let Some(bus) = &self.event_bus {
            let _ = bus.emit(CoreEvent::Track(event));
        }
    }
}

async fn run_worker<H>(mut slot: watch::Receiver<Option<TrackQuery>>, handler: Arc<H>)
where
    H: TriggerHandler + ?Sized,
{
    while slot.changed().await.is_ok() {
        let next = slot.borrow_and_update().clone();
        if let Some(query) = next {
            handler.on_trigger(query).await;
        }
    }
}
