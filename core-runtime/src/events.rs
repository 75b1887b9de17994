//! # Event Bus System
//!
//! Provides an event-driven architecture for the wallpaper core using `tokio::sync::broadcast`.
//! The bus is for observers only (status displays, logging, tests); the
//! component that applies the wallpaper receives the generated artifact
//! directly and never depends on an event being delivered.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   emit    ┌───────────┐
//! │TriggerCoordinator├──────────>│           │
//! └──────────────────┘           │           │     subscribe    ┌────────────┐
//!                                │ EventBus  ├─────────────────>│ Subscriber │
//! ┌──────────────────┐   emit    │ (broadcast│                  └────────────┘
//! │ WallpaperPipeline├──────────>│  channel) │
//! └──────────────────┘           └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, WallpaperEvent};
//!
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Wallpaper(WallpaperEvent::Created {
//!         path: "/tmp/Air-MoonSafari.png".to_string(),
//!     }))
//!     .ok();
//! ```
//!
//! ## Event Types
//!
//! ### Track Events
//! - `Changed`: A track-change notification was accepted by the coordinator
//! - `Ignored`: A notification was dropped (missing artist or album)
//! - `Triggered`: The debounce quiet period elapsed and a generation was scheduled
//!
//! ### Artwork Events
//! - `CandidateRejected`: A downloaded candidate failed decoding or validation
//! - `Acquired`: A cover was accepted
//! - `AcquisitionFailed`: Every source was exhausted
//!
//! ### Wallpaper Events
//! - `Created`: The wallpaper image was written
//! - `Applied`: The host applied the wallpaper
//! - `Failed`: Generation failed for a trigger
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: Subscriber was too slow and missed `n` events.
//!   This is non-fatal; the subscriber can continue receiving new events.
//! - **`RecvError::Closed`**: All senders have been dropped. This indicates shutdown.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Track-change notifications and debounce decisions
    Track(TrackEvent),
    /// Cover acquisition progress
    Artwork(ArtworkEvent),
    /// Wallpaper generation results
    Wallpaper(WallpaperEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Track(e) => e.description(),
            CoreEvent::Artwork(e) => e.description(),
            CoreEvent::Wallpaper(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Wallpaper(WallpaperEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Artwork(ArtworkEvent::AcquisitionFailed { .. }) => EventSeverity::Warning,
            CoreEvent::Track(TrackEvent::Ignored { .. }) => EventSeverity::Warning,
            CoreEvent::Wallpaper(WallpaperEvent::Created { .. })
            | CoreEvent::Wallpaper(WallpaperEvent::Applied { .. }) => EventSeverity::Info,
            CoreEvent::Artwork(ArtworkEvent::Acquired { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Track Events
// ============================================================================

/// Events emitted by the trigger coordinator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum TrackEvent {
    /// A notification was accepted and (re)started the quiet period.
    Changed { artist: String, album: String },
    /// A notification was dropped before debouncing.
    Ignored {
        /// Why the notification was dropped.
        reason: String,
    },
    /// The quiet period elapsed; a generation was handed to the worker.
    Triggered { artist: String, album: String },
}

impl TrackEvent {
    fn description(&self) -> &str {
        match self {
            TrackEvent::Changed { .. } => "Track changed",
            TrackEvent::Ignored { .. } => "Track change ignored",
            TrackEvent::Triggered { .. } => "Wallpaper generation triggered",
        }
    }
}

// ============================================================================
// Artwork Events
// ============================================================================

/// Events emitted while acquiring a cover image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ArtworkEvent {
    /// A candidate was downloaded but not accepted.
    CandidateRejected {
        /// Source that produced the candidate.
        source: String,
        /// URL the candidate was downloaded from.
        url: String,
        /// Decode failure or similarity mismatch.
        reason: String,
    },
    /// A cover was accepted.
    Acquired {
        artist: String,
        album: String,
        /// Source that produced the accepted cover.
        source: String,
        /// URL the accepted cover was downloaded from.
        url: String,
    },
    /// All sources were exhausted without an acceptable cover.
    AcquisitionFailed {
        artist: String,
        album: String,
        /// One entry per attempted source, in priority order.
        attempts: Vec<String>,
    },
}

impl ArtworkEvent {
    fn description(&self) -> &str {
        match self {
            ArtworkEvent::CandidateRejected { .. } => "Cover candidate rejected",
            ArtworkEvent::Acquired { .. } => "Cover acquired",
            ArtworkEvent::AcquisitionFailed { .. } => "Cover acquisition failed",
        }
    }
}

// ============================================================================
// Wallpaper Events
// ============================================================================

/// Events emitted by the wallpaper pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum WallpaperEvent {
    /// The wallpaper image was written to `path`.
    Created { path: String },
    /// The host wallpaper setter accepted the image at `path`.
    Applied { path: String },
    /// Generation failed for a trigger.
    Failed {
        artist: String,
        album: String,
        /// Human-readable error message.
        message: String,
    },
}

impl WallpaperEvent {
    fn description(&self) -> &str {
        match self {
            WallpaperEvent::Created { .. } => "Wallpaper created",
            WallpaperEvent::Applied { .. } => "Wallpaper applied",
            WallpaperEvent::Failed { .. } => "Wallpaper generation failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to core events.
///
/// Cloning the bus is cheap; every clone publishes into the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// When a subscriber falls behind by more than `capacity` events it
    /// receives `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Creates a new event bus with the default buffer size.
    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber to receive events.
    ///
    /// Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    ///
    /// ```rust
    /// use core_runtime::events::EventBus;
    ///
    /// let event_bus = EventBus::new(100);
    /// assert_eq!(event_bus.subscriber_count(), 0);
    ///
    /// let _subscriber = event_bus.subscribe();
    /// assert_eq!(event_bus.subscriber_count(), 1);
    /// ```
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

/// Type alias for event filter functions.
type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let wallpaper_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Wallpaper(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
