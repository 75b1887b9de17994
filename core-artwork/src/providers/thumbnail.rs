//! Player thumbnail source
//!
//! The media player usually reports a small cover image for the current
//! track. It is the last-resort candidate and also the reference every other
//! candidate is validated against.

use super::{download_image, CandidateStream, CoverSource};
use crate::context::{AcquisitionContext, ReferenceFetch};
use crate::error::SourceError;
use crate::model::{ImageCandidate, TrackQuery};
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpRequest, RetryPolicy};
use bytes::Bytes;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const SOURCE_NAME: &str = "thumbnail";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct ThumbnailSource {
    http_client: Arc<dyn HttpClient>,
}

impl ThumbnailSource {
    pub fn new(http_client: Arc<dyn HttpClient>) -> Self {
        Self { http_client }
    }

    async fn download(&self, url: &str) -> Result<Bytes, SourceError> {
        debug!(url = %url, "Downloading thumbnail");
        let request = HttpRequest::get(url).timeout(REQUEST_TIMEOUT);
        // One request per thumbnail, even through a retrying client
        download_image(
            self.http_client.as_ref(),
            request,
            RetryPolicy::no_retry(),
            SOURCE_NAME,
        )
        .await
    }
}

fn thumbnail_url(query: &TrackQuery) -> Result<&str, SourceError> {
    query
        .thumbnail_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| SourceError::NotFound("track has no thumbnail URL".to_string()))
}

#[async_trait]
impl CoverSource for ThumbnailSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn reference(&self, query: &TrackQuery) -> Option<ReferenceFetch> {
        let url = thumbnail_url(query).ok()?;
        Some(ReferenceFetch::new(url, self.download(url).await))
    }

    fn fetch_candidates<'a>(
        &'a self,
        query: &'a TrackQuery,
        ctx: &'a AcquisitionContext,
    ) -> CandidateStream<'a> {
        async_stream::stream! {
            let url = match thumbnail_url(query) {
                Ok(url) => url,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            // The reference download is this source's single request
            let result = match ctx.prefetched(url) {
                Some(result) => result,
                None if ctx.claim(url) => self.download(url).await,
                None => {
                    debug!(url = %url, "Thumbnail already tried");
                    return;
                }
            };
            yield result.map(|bytes| ImageCandidate::new(bytes, url, SOURCE_NAME));
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::test_support::{png, response, MockHttpClient};
    use bridge_traits::BridgeError;

    fn source(http: MockHttpClient) -> ThumbnailSource {
        ThumbnailSource::new(Arc::new(http))
    }

    async fn collect(
        source: &ThumbnailSource,
        query: &TrackQuery,
        ctx: &AcquisitionContext,
    ) -> Vec<Result<ImageCandidate, SourceError>> {
        source.fetch_candidates(query, ctx).collect().await
    }

    #[tokio::test]
    async fn test_single_candidate_from_thumbnail() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .withf(|request| request.url == "https://thumb/air.jpg")
            .times(1)
            .returning(|_| Ok(response(200, png(4, 4, [10, 20, 30]))));

        let source = source(http);
        let query = TrackQuery::new("Air", "Moon Safari").with_thumbnail_url("https://thumb/air.jpg");
        let ctx = AcquisitionContext::new();

        let results = collect(&source, &query, &ctx).await;
        assert_eq!(results.len(), 1);
        let candidate = results[0].as_ref().unwrap();
        assert_eq!(candidate.source_name, "thumbnail");
        assert_eq!(candidate.origin_url, "https://thumb/air.jpg");
        assert!(ctx.was_tried("https://thumb/air.jpg"));
    }

    #[tokio::test]
    async fn test_missing_url_is_not_found() {
        let mut http = MockHttpClient::new();
        http.expect_execute().never();

        let source = source(http);
        let query = TrackQuery::new("Air", "Moon Safari");
        let ctx = AcquisitionContext::new();

        let results = collect(&source, &query, &ctx).await;
        assert!(matches!(results.as_slice(), [Err(SourceError::NotFound(_))]));
        assert!(source.reference(&query).await.is_none());
    }

    #[tokio::test]
    async fn test_http_failures_are_mapped() {
        let mut http = MockHttpClient::new();
        http.expect_execute().returning(|request| match request.url.as_str() {
            "https://thumb/404" => Ok(response(404, Bytes::new())),
            "https://thumb/429" => Ok(response(429, Bytes::new())),
            _ => Err(BridgeError::Timeout("https://thumb/slow".to_string())),
        });
        let source = source(http);

        let cases = [
            ("https://thumb/404", "not_found"),
            ("https://thumb/429", "rate_limited"),
            ("https://thumb/slow", "network"),
        ];
        for (url, expected) in cases {
            let query = TrackQuery::new("Air", "Moon Safari").with_thumbnail_url(url);
            let ctx = AcquisitionContext::new();
            let results = collect(&source, &query, &ctx).await;

            let actual = match results.as_slice() {
                [Err(SourceError::NotFound(_))] => "not_found",
                [Err(SourceError::RateLimited { .. })] => "rate_limited",
                [Err(SourceError::Network(_))] => "network",
                other => panic!("unexpected results for {}: {:?}", url, other),
            };
            assert_eq!(actual, expected, "{}", url);
        }
    }

    #[tokio::test]
    async fn test_reference_records_outcome() {
        let mut http = MockHttpClient::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(response(404, Bytes::new())));

        let source = source(http);
        let query = TrackQuery::new("Air", "Moon Safari").with_thumbnail_url(" https://thumb/air.jpg ");

        let fetch = source.reference(&query).await.unwrap();
        assert_eq!(fetch.url, "https://thumb/air.jpg");
        assert!(matches!(fetch.result, Err(SourceError::NotFound(_))));
    }

    /// Answers 503 and records the retry budget of every request
    #[derive(Default)]
    struct RetryBudgetRecorder {
        max_attempts: std::sync::Mutex<Vec<u32>>,
    }

    #[async_trait]
    impl HttpClient for RetryBudgetRecorder {
        async fn execute(
            &self,
            _request: HttpRequest,
        ) -> bridge_traits::error::Result<bridge_traits::http::HttpResponse> {
            Ok(response(503, Bytes::new()))
        }

        async fn execute_with_retry(
            &self,
            request: HttpRequest,
            policy: RetryPolicy,
        ) -> bridge_traits::error::Result<bridge_traits::http::HttpResponse> {
            self.max_attempts.lock().unwrap().push(policy.max_attempts);
            self.execute(request).await
        }
    }

    #[tokio::test]
    async fn test_thumbnail_is_never_retried() {
        let http = Arc::new(RetryBudgetRecorder::default());
        let source = ThumbnailSource::new(http.clone());
        let query = TrackQuery::new("Air", "Moon Safari").with_thumbnail_url("https://thumb/air.jpg");

        let fetch = source.reference(&query).await.unwrap();
        assert!(matches!(fetch.result, Err(SourceError::Network(_))));
        assert_eq!(*http.max_attempts.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_reuses_reference_download() {
        let mut http = MockHttpClient::new();
        http.expect_execute().never();

        let source = source(http);
        let query = TrackQuery::new("Air", "Moon Safari").with_thumbnail_url("https://thumb/air.jpg");
        let mut ctx = AcquisitionContext::new();
        ctx.record_fetch(ReferenceFetch::new(
            "https://thumb/air.jpg",
            Ok(Bytes::from_static(b"cached")),
        ));

        let results = collect(&source, &query, &ctx).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().unwrap().bytes, Bytes::from_static(b"cached"));
    }

    #[tokio::test]
    async fn test_failed_reference_download_is_not_repeated() {
        let mut http = MockHttpClient::new();
        http.expect_execute().never();

        let source = source(http);
        let query = TrackQuery::new("Air", "Moon Safari").with_thumbnail_url("https://thumb/air.jpg");
        let mut ctx = AcquisitionContext::new();
        ctx.record_fetch(ReferenceFetch::new(
            "https://thumb/air.jpg",
            Err(SourceError::Network("connection reset".to_string())),
        ));

        let results = collect(&source, &query, &ctx).await;
        assert!(matches!(
            results.as_slice(),
            [Err(SourceError::Network(message))] if message == "connection reset"
        ));
    }

    #[tokio::test]
    async fn test_already_tried_url_yields_nothing() {
        let mut http = MockHttpClient::new();
        http.expect_execute().never();

        let source = source(http);
        let query = TrackQuery::new("Air", "Moon Safari").with_thumbnail_url("https://thumb/air.jpg");
        let ctx = AcquisitionContext::new();
        assert!(ctx.claim("https://thumb/air.jpg"));

        assert!(collect(&source, &query, &ctx).await.is_empty());
    }
}
