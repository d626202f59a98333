//! Source page retrieval.
//!
//! [`HtmlFetcher`] is the contract the pipeline depends on. [`SourceFetcher`]
//! implements it by dispatching on [`FetchMode`] to the plain HTTP client or
//! the headless browser.

pub mod browser;
pub mod error;
pub mod http_fetcher;

pub use browser::BrowserFetcher;
pub use error::FetchError;
pub use http_fetcher::HttpFetcher;

use async_trait::async_trait;
use url::Url;

use crate::app::Result;
use crate::config::{BrowserConfig, FetchConfig};
use crate::domain::FetchMode;
use crate::progress::ProgressSink;

#[async_trait]
pub trait HtmlFetcher: Send + Sync {
    /// Fetch `url` and return its HTML as text.
    async fn fetch(
        &self,
        url: &Url,
        mode: FetchMode,
        progress: &dyn ProgressSink,
    ) -> std::result::Result<String, FetchError>;
}

/// Whether `candidate` stays on the same host (and port) as `source`.
pub fn same_host(source: &Url, candidate: &Url) -> bool {
    source.host_str() == candidate.host_str() && source.port() == candidate.port()
}

/// Routes each request to HTTP or browser fetching.
pub struct SourceFetcher {
    http: HttpFetcher,
    browser: BrowserFetcher,
}

impl SourceFetcher {
    pub fn new(fetch: &FetchConfig, browser: &BrowserConfig) -> Result<Self> {
        Ok(Self {
            http: HttpFetcher::new(fetch.clone())?,
            browser: BrowserFetcher::new(browser.clone(), fetch.clone()),
        })
    }

    /// Close the shared browser if one was launched.
    pub async fn shutdown(&self) {
        self.browser.shutdown().await;
    }
}

#[async_trait]
impl HtmlFetcher for SourceFetcher {
    async fn fetch(
        &self,
        url: &Url,
        mode: FetchMode,
        progress: &dyn ProgressSink,
    ) -> std::result::Result<String, FetchError> {
        match mode {
            FetchMode::Http => self.http.fetch(url, progress).await,
            FetchMode::Browser => self.browser.fetch(url, progress).await,
        }
    }
}
