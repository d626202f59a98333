use thiserror::Error;

use crate::fetcher::FetchError;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// Bad configuration or input; never retried automatically.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The page was fetched but yielded nothing usable.
    #[error("{0}")]
    Extraction(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Feed is disabled.")]
    ProfileDisabled,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl BridgeError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn extraction(message: impl Into<String>) -> Self {
        Self::Extraction(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Failures a refresh attempt records on the profile instead of bubbling up
    /// as infrastructure errors.
    pub fn is_refresh_failure(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Fetch(_) | Self::Extraction(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_is_displayed_verbatim() {
        let err = BridgeError::validation("Off-site topic links are blocked by default.");
        assert_eq!(err.to_string(), "Off-site topic links are blocked by default.");
        assert!(err.is_validation());
        assert!(err.is_refresh_failure());
    }

    #[test]
    fn test_fetch_error_converts_transparently() {
        let err: BridgeError = FetchError::SizeExceeded(2 * 1024 * 1024).into();
        assert_eq!(err.to_string(), "Source page exceeded the 2 MB response limit.");
        assert!(!err.is_validation());
        assert!(err.is_refresh_failure());
    }

    #[test]
    fn test_not_found_is_not_a_refresh_failure() {
        let err = BridgeError::ProfileNotFound("42".into());
        assert!(!err.is_refresh_failure());
    }
}
