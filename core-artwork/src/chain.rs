//! Cover Acquisition Chain
//!
//! Drives the configured [`CoverSource`]s in priority order and returns the
//! first candidate that decodes and, when a reference image is available,
//! looks like the same cover.
//!
//! ## Algorithm
//!
//! 1. Ask each source for a reference image and record every download in
//!    the acquisition context, failed or not, so it is never repeated. The
//!    first one that downloads is decoded and used for validation. A
//!    reference that fails to decode disables validation.
//! 2. Consume each source's candidates lazily. Decoding and comparison run on
//!    the blocking thread pool.
//! 3. Stop at the first accepted candidate. The candidate stream is dropped so
//!    no further requests are made.
//! 4. A rate-limited source is abandoned immediately. Any other error is
//!    recorded and consumption continues.
//! 5. A source that ends without success contributes one failure: its last
//!    error, or `NotFound`.
//!
//! With [`SelectionPolicy::BestMatch`] the chain keeps consuming the first
//! source that yields an accepted candidate and returns the closest one.

use crate::context::{AcquisitionContext, ReferenceImage};
use crate::error::{ArtworkError, Result, SourceError, SourceFailure};
use crate::model::{CoverResult, ImageCandidate, TrackQuery};
use crate::providers::CoverSource;
use crate::similarity::{decode_image, ImageSimilarity};
use bytes::Bytes;
use core_runtime::config::{SelectionPolicy, SimilarityThresholds};
use core_runtime::events::{ArtworkEvent, CoreEvent, EventBus};
use futures::StreamExt;
use image::{DynamicImage, GenericImageView};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Outcome of checking one candidate
enum Verdict {
    Accepted(CoverResult),
    Rejected { url: String, reason: String },
    Undecodable { url: String, message: String },
}

pub struct CoverAcquisitionChain {
    sources: Vec<Arc<dyn CoverSource>>,
    similarity: ImageSimilarity,
    policy: SelectionPolicy,
    event_bus: Option<EventBus>,
}

impl CoverAcquisitionChain {
    /// Creates a chain over `sources`, highest priority first
    pub fn new(sources: Vec<Arc<dyn CoverSource>>, thresholds: SimilarityThresholds) -> Self {
        Self {
            sources,
            similarity: ImageSimilarity::new(thresholds),
            policy: SelectionPolicy::default(),
            event_bus: None,
        }
    }

    pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|source| source.name()).collect()
    }

    /// Finds a cover for `query`
    ///
    /// # Errors
    ///
    /// Returns [`ArtworkError::AcquisitionFailed`] with one failure per
    /// source, in priority order, when no source produced an acceptable
    /// cover.
    #[instrument(skip(self, query), fields(artist = %query.artist, album = %query.album))]
    pub async fn acquire(&self, query: &TrackQuery) -> Result<CoverResult> {
        let ctx = self.prepare_context(query).await;

        let mut failures = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            match self.consume_source(source.as_ref(), query, &ctx).await {
                Ok(cover) => {
                    info!(
                        source = %cover.source_name,
                        url = %cover.origin_url,
                        width = cover.width,
                        height = cover.height,
                        "Cover acquired"
                    );
                    self.publish(ArtworkEvent::Acquired {
                        artist: query.artist.clone(),
                        album: query.album.clone(),
                        source: cover.source_name.clone(),
                        url: cover.origin_url.clone(),
                    });
                    return Ok(cover);
                }
                Err(error) => {
                    debug!(source = source.name(), "Source exhausted: {}", error);
                    failures.push(SourceFailure::new(source.name(), error));
                }
            }
        }

        warn!(
            tried_urls = ctx.tried_count(),
            "No acceptable cover from {} source(s)",
            failures.len()
        );
        self.publish(ArtworkEvent::AcquisitionFailed {
            artist: query.artist.clone(),
            album: query.album.clone(),
            attempts: failures.iter().map(ToString::to_string).collect(),
        });
        Err(ArtworkError::AcquisitionFailed { attempts: failures })
    }

    async fn prepare_context(&self, query: &TrackQuery) -> AcquisitionContext {
        let mut ctx = AcquisitionContext::new();

        for source in &self.sources {
            let Some(fetch) = source.reference(query).await else {
                continue;
            };
            let url = fetch.url.clone();
            let downloaded = match &fetch.result {
                Ok(bytes) => Some(bytes.clone()),
                Err(e) => {
                    warn!(source = source.name(), url = %url, "Reference image unavailable: {}", e);
                    None
                }
            };
            ctx.record_fetch(fetch);

            let Some(bytes) = downloaded else {
                continue;
            };
            match decode(bytes).await {
                Ok(image) => {
                    debug!(url = %url, "Using reference image");
                    ctx.set_reference(ReferenceImage {
                        url,
                        image: Arc::new(image),
                    });
                }
                Err(e) => warn!(
                    url = %url,
                    "Reference image is not decodable, accepting candidates unvalidated: {}",
                    e
                ),
            }
            break;
        }

        ctx
    }

    async fn consume_source(
        &self,
        source: &dyn CoverSource,
        query: &TrackQuery,
        ctx: &AcquisitionContext,
    ) -> std::result::Result<CoverResult, SourceError> {
        let reference = ctx.reference().map(|reference| Arc::clone(&reference.image));
        let keep_best = self.policy == SelectionPolicy::BestMatch && reference.is_some();

        let mut candidates = source.fetch_candidates(query, ctx);
        let mut last_error = None;
        let mut best: Option<CoverResult> = None;

        while let Some(item) = candidates.next().await {
            let candidate = match item {
                Ok(candidate) => candidate,
                Err(e) if e.is_rate_limited() => {
                    warn!(source = source.name(), "{}", e);
                    last_error = Some(e);
                    break;
                }
                Err(e) => {
                    debug!(source = source.name(), "Candidate failed: {}", e);
                    last_error = Some(e);
                    continue;
                }
            };

            match self.evaluate(candidate, reference.clone()).await {
                Verdict::Accepted(cover) if !keep_best => return Ok(cover),
                Verdict::Accepted(cover) => {
                    if cover.distance == Some(0.0) {
                        return Ok(cover);
                    }
                    best = match best {
                        Some(current) if current.distance <= cover.distance => Some(current),
                        _ => Some(cover),
                    };
                }
                Verdict::Rejected { url, reason } => {
                    debug!(url = %url, "Candidate rejected: {}", reason);
                    self.publish(ArtworkEvent::CandidateRejected {
                        source: source.name().to_string(),
                        url,
                        reason,
                    });
                }
                Verdict::Undecodable { url, message } => {
                    debug!(url = %url, "Candidate not decodable: {}", message);
                    self.publish(ArtworkEvent::CandidateRejected {
                        source: source.name().to_string(),
                        url,
                        reason: message.clone(),
                    });
                    last_error = Some(SourceError::Malformed(message));
                }
            }
        }

        if let Some(cover) = best {
            return Ok(cover);
        }
        Err(last_error.unwrap_or_else(|| {
            SourceError::NotFound(format!("{} produced no acceptable cover", source.name()))
        }))
    }

    async fn evaluate(
        &self,
        candidate: ImageCandidate,
        reference: Option<Arc<DynamicImage>>,
    ) -> Verdict {
        let similarity = self.similarity;
        let bytes = candidate.bytes.clone();
        let checked = tokio::task::spawn_blocking(move || {
            let image = decode_image(&bytes)?;
            let report = reference.map(|reference| similarity.compare(&reference, &image));
            Ok::<_, ArtworkError>((image.dimensions(), report))
        })
        .await
        .map_err(|e| ArtworkError::Decode(format!("decode task failed: {}", e)))
        .and_then(|result| result);

        let ((width, height), report) = match checked {
            Ok(checked) => checked,
            Err(e) => {
                return Verdict::Undecodable {
                    url: candidate.origin_url,
                    message: e.to_string(),
                }
            }
        };

        if let Some(report) = report {
            if !report.is_match(self.similarity.thresholds()) {
                return Verdict::Rejected {
                    url: candidate.origin_url,
                    reason: format!(
                        "not the same cover (distance {:.3}, difference {:.3})",
                        report.distance, report.difference
                    ),
                };
            }
        }

        Verdict::Accepted(CoverResult {
            bytes: candidate.bytes,
            source_name: candidate.source_name,
            origin_url: candidate.origin_url,
            width,
            height,
            distance: report.map(|report| report.distance),
        })
    }

    fn publish(&self, event: ArtworkEvent) {
        if let Some(bus) = &self.event_bus {
            // No subscribers is fine
            let _ = bus.emit(CoreEvent::Artwork(event));
        }
    }
}

async fn decode(bytes: Bytes) -> Result<DynamicImage> {
    tokio::task::spawn_blocking(move || decode_image(&bytes))
        .await
        .map_err(|e| ArtworkError::Decode(format!("decode task failed: {}", e)))?
}
