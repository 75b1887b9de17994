//! Discogs database source
//!
//! Looks a release up in the Discogs database and yields its cover images.
//!
//! ## API Endpoints
//!
//! - **Search**: `https://api.discogs.com/database/search?artist={artist}&release_title={album}&type=release`
//!   or `...?q={artist album}&type=release`
//! - **Release**: `https://api.discogs.com/releases/{id}`
//!
//! ## Search Strategies
//!
//! 1. *Specific*: artist and release title fields. Results must mention both
//!    in their title.
//! 2. *Broad*: free-text query. Only used when the specific search yields
//!    nothing usable.
//!
//! Both strategies drop results whose format is not a music release format.
//!
//! ## Rate Limiting
//!
//! Discogs allows 60 authenticated requests per minute. Requests are spaced by
//! `rate_limit_delay_ms`, and both HTTP 429 and an exhausted
//! `X-Discogs-Ratelimit-Remaining` budget surface as
//! [`SourceError::RateLimited`].

use super::{download_image, retry_after, CandidateStream, CoverSource, RateLimiter};
use crate::context::AcquisitionContext;
use crate::error::SourceError;
use crate::model::{ImageCandidate, TrackQuery};
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::time::{Clock, SystemClock};
use core_runtime::config::CatalogApiConfig;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const SOURCE_NAME: &str = "discogs";

/// Discogs API base URL
const DISCOGS_API_BASE: &str = "https://api.discogs.com";

/// Timeout for API requests
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const RATE_LIMIT_REMAINING_HEADER: &str = "X-Discogs-Ratelimit-Remaining";

/// Formats that identify an actual music release
const RELEASE_FORMATS: [&str; 6] = ["cd", "vinyl", "mp3", "album", "ep", "lp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchStrategy {
    Specific,
    Broad,
}

impl SearchStrategy {
    fn as_str(&self) -> &'static str {
        match self {
            SearchStrategy::Specific => "specific",
            SearchStrategy::Broad => "broad",
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Clone, Deserialize)]
struct SearchResult {
    id: u64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    format: Vec<String>,
    #[serde(default)]
    cover_image: Option<String>,
    #[serde(default)]
    thumb: Option<String>,
}

impl SearchResult {
    fn has_release_format(&self) -> bool {
        self.format
            .iter()
            .any(|format| RELEASE_FORMATS.contains(&format.to_lowercase().as_str()))
    }

    fn title_mentions(&self, query: &TrackQuery) -> bool {
        let title = self.title.to_lowercase();
        title.contains(&query.artist.to_lowercase()) && title.contains(&query.album.to_lowercase())
    }

    /// Low resolution cover listed in the search result, falling back to
    /// the full cover image when the result has no thumb
    fn listed_cover(&self) -> Option<&str> {
        [self.thumb.as_deref(), self.cover_image.as_deref()]
            .into_iter()
            .flatten()
            .find(|url| !url.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ReleaseDetail {
    #[serde(default)]
    images: Vec<ReleaseImage>,
}

#[derive(Debug, Deserialize)]
struct ReleaseImage {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    uri: String,
}

impl ReleaseDetail {
    /// The image flagged primary, else the first one
    fn primary_image(&self) -> Option<&str> {
        self.images
            .iter()
            .find(|image| image.kind == "primary")
            .or_else(|| self.images.first())
            .map(|image| image.uri.as_str())
            .filter(|uri| !uri.is_empty())
    }
}

/// Cover source backed by the Discogs database
pub struct CatalogSource {
    http_client: Arc<dyn HttpClient>,
    config: CatalogApiConfig,
    base_url: String,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl CatalogSource {
    /// Creates a source that spaces its requests with the system clock
    pub fn new(http_client: Arc<dyn HttpClient>, config: CatalogApiConfig) -> Self {
        Self::with_clock(http_client, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        http_client: Arc<dyn HttpClient>,
        config: CatalogApiConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let rate_limiter = RateLimiter::new(config.rate_limit_delay_ms, clock);
        Self {
            http_client,
            config,
            base_url: DISCOGS_API_BASE.to_string(),
            rate_limiter: Arc::new(Mutex::new(rate_limiter)),
        }
    }

    /// Points the source at a different API host
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request(&self, url: &str) -> HttpRequest {
        let request = HttpRequest::get(url)
            .header("User-Agent", self.config.user_agent.as_str())
            .timeout(REQUEST_TIMEOUT);

        match (&self.config.consumer_key, &self.config.consumer_secret) {
            (Some(key), Some(secret)) => request.header(
                "Authorization",
                format!("Discogs key={}, secret={}", key, secret),
            ),
            _ => request,
        }
    }

    fn rate_limited(&self, response: &HttpResponse) -> Option<SourceError> {
        let exhausted = response
            .header(RATE_LIMIT_REMAINING_HEADER)
            .and_then(|value| value.trim().parse::<u64>().ok())
            == Some(0);

        if response.status == 429 || exhausted {
            Some(SourceError::RateLimited {
                provider: SOURCE_NAME.to_string(),
                retry_after_seconds: retry_after(response),
            })
        } else {
            None
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, SourceError> {
        self.rate_limiter.lock().await.wait_if_needed().await;

        debug!(url = %url, "Discogs API request");
        let response = self
            .http_client
            .execute(self.request(url))
            .await
            .map_err(|e| SourceError::Network(format!("Discogs request failed: {}", e)))?;

        if let Some(error) = self.rate_limited(&response) {
            warn!("Discogs rate limit reached");
            return Err(error);
        }
        if response.status == 404 {
            return Err(SourceError::NotFound(format!("{} returned 404", url)));
        }
        if !response.is_success() {
            return Err(SourceError::Network(format!(
                "Discogs returned HTTP {}",
                response.status
            )));
        }

        response
            .json()
            .map_err(|e| SourceError::Malformed(format!("Discogs response: {}", e)))
    }

    fn search_url(&self, query: &TrackQuery, strategy: SearchStrategy) -> String {
        match strategy {
            SearchStrategy::Specific => format!(
                "{}/database/search?artist={}&release_title={}&type=release",
                self.base_url,
                urlencoding::encode(&query.artist),
                urlencoding::encode(&query.album)
            ),
            SearchStrategy::Broad => format!(
                "{}/database/search?q={}&type=release",
                self.base_url,
                urlencoding::encode(&query.search_text())
            ),
        }
    }

    /// Runs one search strategy and applies its result filters
    async fn search(
        &self,
        query: &TrackQuery,
        strategy: SearchStrategy,
    ) -> Result<Vec<SearchResult>, SourceError> {
        let response: SearchResponse = self.get_json(&self.search_url(query, strategy)).await?;
        let total = response.results.len();

        let releases: Vec<SearchResult> = response
            .results
            .into_iter()
            .filter(SearchResult::has_release_format)
            .filter(|release| strategy == SearchStrategy::Broad || release.title_mentions(query))
            .collect();

        debug!(
            strategy = strategy.as_str(),
            total,
            kept = releases.len(),
            "Discogs search finished"
        );
        Ok(releases)
    }

    /// Releases from the specific search, or from the broad one if that
    /// produced nothing usable
    async fn find_releases(&self, query: &TrackQuery) -> Result<Vec<SearchResult>, SourceError> {
        match self.search(query, SearchStrategy::Specific).await {
            Ok(releases) if !releases.is_empty() => return Ok(releases),
            Ok(_) => debug!("Specific search found no matching release"),
            Err(e) if e.is_rate_limited() => return Err(e),
            Err(e) => warn!("Specific search failed: {}", e),
        }

        let releases = self.search(query, SearchStrategy::Broad).await?;
        if releases.is_empty() {
            info!(
                artist = %query.artist,
                album = %query.album,
                "No album releases found on Discogs"
            );
            return Err(SourceError::NotFound(
                "No album releases found on Discogs".to_string(),
            ));
        }
        Ok(releases)
    }

    async fn release_image(&self, release_id: u64) -> Result<Option<String>, SourceError> {
        let url = format!("{}/releases/{}", self.base_url, release_id);
        let detail: ReleaseDetail = self.get_json(&url).await?;
        Ok(detail.primary_image().map(str::to_string))
    }

    async fn download(&self, url: &str) -> Result<ImageCandidate, SourceError> {
        self.rate_limiter.lock().await.wait_if_needed().await;
        debug!(url = %url, "Downloading Discogs image");
        let bytes = download_image(
            self.http_client.as_ref(),
            self.request(url),
            RetryPolicy::default(),
            SOURCE_NAME,
        )
        .await?;
        Ok(ImageCandidate::new(bytes, url, SOURCE_NAME))
    }
}

#[async_trait]
impl CoverSource for CatalogSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn fetch_candidates<'a>(
        &'a self,
        query: &'a TrackQuery,
        ctx: &'a AcquisitionContext,
    ) -> CandidateStream<'a> {
        async_stream::stream! {
            let releases = match self.find_releases(query).await {
                Ok(releases) => releases,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            for release in releases {
                if let Some(url) = release.listed_cover() {
                    if ctx.claim(url) {
                        yield self.download(url).await;
                    } else {
                        debug!(url = %url, "Skipping already tried image");
                    }
                }

                match self.release_image(release.id).await {
                    Ok(Some(url)) => {
                        if ctx.claim(&url) {
                            yield self.download(&url).await;
                        } else {
                            debug!(url = %url, "Skipping already tried image");
                        }
                    }
                    Ok(None) => {
                        yield Err(SourceError::NotFound(format!(
                            "Release {} has no images",
                            release.id
                        )));
                    }
                    Err(e) => {
                        let stop = e.is_rate_limited();
                        yield Err(e);
                        if stop {
                            return;
                        }
                    }
                }
            }
        }
        .boxed()
    }
}
