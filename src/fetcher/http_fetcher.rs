use std::error::Error as StdError;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::redirect::Policy;
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

use crate::app::{BridgeError, Result};
use crate::config::FetchConfig;
use crate::fetcher::{same_host, FetchError};
use crate::progress::{ProgressSink, Stage};

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml;q=0.9,*/*;q=0.1";

/// Redirect target that left the requested host.
#[derive(Debug, thiserror::Error)]
#[error("redirect to {0} left the source host")]
struct OffHostRedirect(String);

pub struct HttpFetcher {
    client: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let max_redirects = config.max_redirects;
        let policy = Policy::custom(move |attempt| {
            let target = attempt.url().clone();
            let Some(origin) = attempt.previous().first() else {
                return attempt.follow();
            };
            if !matches!(target.scheme(), "http" | "https") || !same_host(origin, &target) {
                return attempt.error(OffHostRedirect(target.to_string()));
            }
            if attempt.previous().len() > max_redirects {
                return attempt.error(format!("more than {} redirects", max_redirects));
            }
            attempt.follow()
        });

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));

        let client = Client::builder()
            .timeout(config.timeout())
            .gzip(true)
            .brotli(true)
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .redirect(policy)
            .build()
            .map_err(|e| BridgeError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    #[instrument(skip_all, fields(url = %url))]
    pub async fn fetch(
        &self,
        url: &Url,
        progress: &dyn ProgressSink,
    ) -> std::result::Result<String, FetchError> {
        progress.report(Stage::Fetching, &format!("Requesting {}", url));

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::UpstreamError(status.to_string()));
        }

        check_content_type(response.headers())?;

        let limit = self.config.max_response_bytes;
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(FetchError::SizeExceeded(limit));
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| self.classify(e))? {
            if body.len() + chunk.len() > limit {
                return Err(FetchError::SizeExceeded(limit));
            }
            body.extend_from_slice(&chunk);
        }

        debug!(bytes = body.len(), final_url = %response.url(), "Fetched source page");
        progress.report(
            Stage::Fetching,
            &format!("Received {} bytes from {}", body.len(), response.url()),
        );

        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_redirect() {
            if let Some(target) = blocked_redirect(&err) {
                return FetchError::RedirectBlocked(target);
            }
        }
        FetchError::from_reqwest_error(err, self.config.timeout())
    }
}

fn blocked_redirect(err: &reqwest::Error) -> Option<String> {
    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(blocked) = inner.downcast_ref::<OffHostRedirect>() {
            return Some(blocked.0.clone());
        }
        source = inner.source();
    }
    None
}

fn check_content_type(headers: &HeaderMap) -> std::result::Result<(), FetchError> {
    let Some(value) = headers.get(CONTENT_TYPE) else {
        return Err(FetchError::ContentTypeMismatch(
            "a response without a content type".to_string(),
        ));
    };
    let raw = value.to_str().unwrap_or_default();
    let essence = raw.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    if matches!(essence.as_str(), "text/html" | "application/xhtml+xml") {
        Ok(())
    } else {
        Err(FetchError::ContentTypeMismatch(raw.to_string()))
    }
}
