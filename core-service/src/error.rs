use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {0}")]
    Config(#[from] core_runtime::Error),

    #[error("Artwork error: {0}")]
    Artwork(#[from] core_artwork::ArtworkError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::BridgeError),

    #[error("Failed to apply wallpaper {path}: {message}")]
    ApplyFailed { path: String, message: String },
}

impl ServiceError {
    /// Errors that should stop the service from starting
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ServiceError::Config(_)
                | ServiceError::Artwork(core_artwork::ArtworkError::InvalidTemplate(_))
        )
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use core_artwork::ArtworkError;

    #[test]
    fn test_template_errors_are_fatal() {
        let error = ServiceError::from(ArtworkError::InvalidTemplate("{x}".to_string()));
        assert!(error.is_fatal());

        let error = ServiceError::from(ArtworkError::AcquisitionFailed { attempts: vec![] });
        assert!(!error.is_fatal());
    }
}
