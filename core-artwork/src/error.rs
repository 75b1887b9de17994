use std::fmt;
use thiserror::Error;

/// Recoverable failure of a single cover source.
///
/// These never abort acquisition on their own; the chain records them and
/// moves on to the next candidate or source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Rate limited by {provider}")]
    RateLimited {
        provider: String,
        retry_after_seconds: Option<u64>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Discriminant of [`SourceError`], for matching without payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceErrorKind {
    RateLimited,
    NotFound,
    Network,
    Malformed,
}

impl SourceError {
    pub fn kind(&self) -> SourceErrorKind {
        match self {
            SourceError::RateLimited { .. } => SourceErrorKind::RateLimited,
            SourceError::NotFound(_) => SourceErrorKind::NotFound,
            SourceError::Network(_) => SourceErrorKind::Network,
            SourceError::Malformed(_) => SourceErrorKind::Malformed,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SourceError::RateLimited { .. })
    }
}

impl From<bridge_traits::BridgeError> for SourceError {
    fn from(error: bridge_traits::BridgeError) -> Self {
        SourceError::Network(error.to_string())
    }
}

/// Why one source failed to produce a cover
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub source_name: String,
    pub error: SourceError,
}

impl SourceFailure {
    pub fn new(source_name: impl Into<String>, error: SourceError) -> Self {
        Self {
            source_name: source_name.into(),
            error,
        }
    }
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source_name, self.error)
    }
}

#[derive(Error, Debug)]
pub enum ArtworkError {
    #[error("No acceptable cover found after trying {} source(s)", .attempts.len())]
    AcquisitionFailed { attempts: Vec<SourceFailure> },

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Composition failed: {0}")]
    Composition(String),

    #[error("Invalid output template: {0}")]
    InvalidTemplate(String),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),
}

pub type Result<T> = std::result::Result<T, ArtworkError>;
