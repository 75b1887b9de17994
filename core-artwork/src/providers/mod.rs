//! Cover Sources
//!
//! This module contains the sources the acquisition chain draws candidates from:
//! - Thumbnail - the low resolution cover the player already reports
//! - Discogs - release database search with two search strategies
//!
//! Each source yields candidates lazily so the chain can stop consuming (and
//! stop issuing requests) as soon as one is accepted.

pub mod discogs;
pub mod thumbnail;

pub use discogs::CatalogSource;
pub use thumbnail::ThumbnailSource;

use crate::context::{AcquisitionContext, ReferenceFetch};
use crate::error::SourceError;
use crate::model::{ImageCandidate, TrackQuery};
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::time::Clock;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Lazily produced candidates of one source
pub type CandidateStream<'a> = BoxStream<'a, Result<ImageCandidate, SourceError>>;

/// A provider of cover candidates for a track
///
/// # Contract
///
/// - The stream is finite and produces candidates in the source's own
///   priority order.
/// - Requests are only issued while the stream is polled; dropping it stops
///   all further network activity.
/// - A URL must be claimed through [`AcquisitionContext::claim`] before it
///   is downloaded, and skipped if the claim fails.
/// - `RateLimited` means the source cannot make progress; the chain stops
///   polling after it.
#[async_trait]
pub trait CoverSource: Send + Sync {
    /// Short identifier used in results, logs and failure lists
    fn name(&self) -> &str;

    /// Downloads the image every other candidate should resemble, if this
    /// source can provide one. The outcome is recorded in the context and
    /// the same URL is not requested again in that acquisition.
    async fn reference(&self, _query: &TrackQuery) -> Option<ReferenceFetch> {
        None
    }

    /// Candidates for `query`, produced on demand
    fn fetch_candidates<'a>(
        &'a self,
        query: &'a TrackQuery,
        ctx: &'a AcquisitionContext,
    ) -> CandidateStream<'a>;
}

/// Simple rate limiter to enforce delay between requests
pub(crate) struct RateLimiter {
    clock: std::sync::Arc<dyn Clock>,
    last_request_ms: Option<i64>,
    min_delay: Duration,
}

impl RateLimiter {
    pub(crate) fn new(delay_ms: u64, clock: std::sync::Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last_request_ms: None,
            min_delay: Duration::from_millis(delay_ms),
        }
    }

    pub(crate) async fn wait_if_needed(&mut self) {
        if let Some(last) = self.last_request_ms {
            let now = self.clock.unix_timestamp_millis();
            let elapsed_ms = now - last;
            let required_ms = self.min_delay.as_millis() as i64;
            if elapsed_ms < required_ms {
                let wait_time = Duration::from_millis((required_ms - elapsed_ms) as u64);
                debug!("Rate limiting: waiting {:?}", wait_time);
                sleep(wait_time).await;
            }
        }
        self.last_request_ms = Some(self.clock.unix_timestamp_millis());
    }
}

/// Retry-After header in seconds, when present and numeric
pub(crate) fn retry_after(response: &HttpResponse) -> Option<u64> {
    response
        .header("Retry-After")
        .and_then(|value| value.trim().parse::<u64>().ok())
}

/// GET an image and map the response onto source errors
///
/// 404 and empty bodies are `NotFound`, 429 is `RateLimited`, other
/// non-success statuses and transport failures are `Network`.
pub(crate) async fn download_image(
    http_client: &dyn HttpClient,
    request: HttpRequest,
    policy: RetryPolicy,
    provider: &str,
) -> Result<Bytes, SourceError> {
    let url = request.url.clone();
    let response = http_client
        .execute_with_retry(request, policy)
        .await
        .map_err(|e| SourceError::Network(format!("{} download failed: {}", url, e)))?;

    match response.status {
        429 => Err(SourceError::RateLimited {
            provider: provider.to_string(),
            retry_after_seconds: retry_after(&response),
        }),
        404 => Err(SourceError::NotFound(format!("{} returned 404", url))),
        _ if !response.is_success() => Err(SourceError::Network(format!(
            "{} returned HTTP {}",
            url, response.status
        ))),
        _ if response.body.is_empty() => {
            Err(SourceError::NotFound(format!("{} returned an empty body", url)))
        }
        _ => Ok(response.body),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use bridge_traits::error::Result;
    use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
    use bytes::Bytes;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use mockall::mock;
    use std::collections::HashMap;
    use std::io::Cursor;

    mock! {
        pub HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
        }
    }

    pub fn response(status: u16, body: impl Into<Bytes>) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn png(width: u32, height: u32, color: [u8; 3]) -> Bytes {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)));
        let mut encoded = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)
            .unwrap();
        Bytes::from(encoded)
    }
}
