//! Per-acquisition state shared between the chain and its sources

use crate::error::SourceError;
use bytes::Bytes;
use image::DynamicImage;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

/// One reference download, successful or not
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceFetch {
    pub url: String,
    pub result: Result<Bytes, SourceError>,
}

impl ReferenceFetch {
    pub fn new(url: impl Into<String>, result: Result<Bytes, SourceError>) -> Self {
        Self {
            url: url.into(),
            result,
        }
    }
}

/// Decoded image every candidate is validated against
#[derive(Clone)]
pub struct ReferenceImage {
    pub url: String,
    pub image: Arc<DynamicImage>,
}

/// State that lives for exactly one `acquire` call.
///
/// Holds the set of URLs already attempted, so no URL is downloaded twice
/// within an acquisition, the outcome of every reference download and the
/// decoded reference image, if any.
#[derive(Default)]
pub struct AcquisitionContext {
    tried: Mutex<HashSet<String>>,
    fetches: Vec<ReferenceFetch>,
    reference: Option<ReferenceImage>,
}

impl AcquisitionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a reference download. Its URL counts as tried.
    pub fn record_fetch(&mut self, fetch: ReferenceFetch) {
        self.claim(&fetch.url);
        self.fetches.push(fetch);
    }

    pub fn set_reference(&mut self, reference: ReferenceImage) {
        self.reference = Some(reference);
    }

    /// Marks `url` as attempted. Returns `false` if it already was.
    pub fn claim(&self, url: &str) -> bool {
        self.tried
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string())
    }

    pub fn was_tried(&self, url: &str) -> bool {
        self.tried
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(url)
    }

    pub fn tried_count(&self) -> usize {
        self.tried
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn reference(&self) -> Option<&ReferenceImage> {
        self.reference.as_ref()
    }

    /// Outcome of the reference download of `url`, if there was one
    pub fn prefetched(&self, url: &str) -> Option<Result<Bytes, SourceError>> {
        self.fetches
            .iter()
            .find(|fetch| fetch.url == url)
            .map(|fetch| fetch.result.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_is_once_per_url() {
        let ctx = AcquisitionContext::new();

        assert!(ctx.claim("https://img/1.jpg"));
        assert!(!ctx.claim("https://img/1.jpg"));
        assert!(ctx.claim("https://img/2.jpg"));
        assert!(ctx.was_tried("https://img/1.jpg"));
        assert!(!ctx.was_tried("https://img/3.jpg"));
        assert_eq!(ctx.tried_count(), 2);
    }

    #[test]
    fn test_recorded_fetches_are_tried_and_kept() {
        let mut ctx = AcquisitionContext::new();
        ctx.record_fetch(ReferenceFetch::new(
            "https://thumb/1.jpg",
            Ok(Bytes::from_static(b"thumb")),
        ));
        ctx.record_fetch(ReferenceFetch::new(
            "https://thumb/2.jpg",
            Err(SourceError::NotFound("gone".to_string())),
        ));

        assert!(ctx.was_tried("https://thumb/1.jpg"));
        assert!(ctx.was_tried("https://thumb/2.jpg"));
        assert_eq!(
            ctx.prefetched("https://thumb/1.jpg"),
            Some(Ok(Bytes::from_static(b"thumb")))
        );
        assert_eq!(
            ctx.prefetched("https://thumb/2.jpg"),
            Some(Err(SourceError::NotFound("gone".to_string())))
        );
        assert_eq!(ctx.prefetched("https://other/1.jpg"), None);
        assert!(ctx.reference().is_none());
    }
}
