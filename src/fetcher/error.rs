use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Expected HTML but received {0}.")]
    ContentTypeMismatch(String),

    #[error("Source page exceeded the {} MB response limit.", .0 / (1024 * 1024))]
    SizeExceeded(usize),

    #[error("Blocked redirect to {0}")]
    RedirectBlocked(String),

    #[error("Upstream HTTP error: {0}")]
    UpstreamError(String),

    #[error("Browser navigation left the source host and was blocked: {0}")]
    OffHostNavigation(String),

    #[error("Fetching the source page timed out after {}s.", .0.as_secs())]
    Timeout(Duration),

    #[error("Browser mode failed: {0}")]
    Browser(String),
}

impl FetchError {
    /// Classify a reqwest failure into the fetch taxonomy.
    pub fn from_reqwest_error(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_redirect() {
            let target = err
                .url()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "another host".to_string());
            Self::RedirectBlocked(target)
        } else if let Some(status) = err.status() {
            Self::UpstreamError(status.to_string())
        } else if err.is_decode() || err.is_body() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::UpstreamError(format!("connection error: {}", err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_exceeded_reports_megabytes() {
        let err = FetchError::SizeExceeded(2 * 1024 * 1024);
        assert_eq!(err.to_string(), "Source page exceeded the 2 MB response limit.");
    }

    #[test]
    fn test_timeout_reports_seconds() {
        let err = FetchError::Timeout(Duration::from_secs(15));
        assert_eq!(err.to_string(), "Fetching the source page timed out after 15s.");
    }

    #[test]
    fn test_content_type_mismatch_message() {
        let err = FetchError::ContentTypeMismatch("application/json".into());
        assert_eq!(err.to_string(), "Expected HTML but received application/json.");
    }
}
