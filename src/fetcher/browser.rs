use std::sync::{Arc, Mutex as StdMutex};

use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::cdp::browser_protocol::fetch::{
    ContinueRequestParams, EnableParams, EventRequestPaused, FailRequestParams,
};
use chromiumoxide::cdp::browser_protocol::network::{
    ErrorReason, EventResponseReceived, ResourceType,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::{BrowserConfig, FetchConfig};
use crate::fetcher::{same_host, FetchError};
use crate::progress::{ProgressSink, Stage};

/// Renders pages in headless Chromium.
///
/// The browser process is launched on first use and shared by later
/// requests; each request gets its own tab, closed afterwards.
pub struct BrowserFetcher {
    config: BrowserConfig,
    fetch: FetchConfig,
    running: Mutex<Option<Arc<RunningBrowser>>>,
}

struct RunningBrowser {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserFetcher {
    pub fn new(config: BrowserConfig, fetch: FetchConfig) -> Self {
        Self {
            config,
            fetch,
            running: Mutex::new(None),
        }
    }

    #[instrument(skip_all, fields(url = %url))]
    pub async fn fetch(
        &self,
        url: &Url,
        progress: &dyn ProgressSink,
    ) -> Result<String, FetchError> {
        let running = self.browser(progress).await?;

        progress.report(Stage::Rendering, &format!("Opening {}", url));
        let page = running
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::Browser(format!("Failed to create page: {}", e)))?;

        let result = self.render(&page, url, progress).await;

        if let Err(e) = page.close().await {
            debug!("Failed to close page: {}", e);
        }
        result
    }

    /// Close the shared browser, if any.
    pub async fn shutdown(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };
        match Arc::try_unwrap(running) {
            Ok(mut running) => {
                if let Err(e) = running.browser.close().await {
                    warn!("Failed to close browser: {}", e);
                }
                let _ = running.browser.wait().await;
                running.handler.abort();
            }
            Err(_) => debug!("Browser still in use; it closes when the last page finishes"),
        }
    }

    async fn browser(&self, progress: &dyn ProgressSink) -> Result<Arc<RunningBrowser>, FetchError> {
        let mut slot = self.running.lock().await;
        if let Some(running) = slot.as_ref() {
            if !running.handler.is_finished() {
                progress.report(Stage::LaunchingBrowser, "Reusing the running browser.");
                return Ok(Arc::clone(running));
            }
            warn!("Browser handler exited, relaunching");
        }

        progress.report(Stage::LaunchingBrowser, "Starting headless Chromium.");
        let running = Arc::new(self.launch().await?);
        *slot = Some(Arc::clone(&running));
        Ok(running)
    }

    async fn launch(&self) -> Result<RunningBrowser, FetchError> {
        let mut builder = ChromeConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--block-new-web-contents");

        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.config.executable {
            builder = builder.chrome_executable(path);
        }

        let chrome_config = builder
            .build()
            .map_err(|e| FetchError::Browser(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(chrome_config).await.map_err(|e| {
            FetchError::Browser(format!(
                "Failed to launch browser: {}. Is Chrome or Chromium installed and in PATH?",
                e
            ))
        })?;

        let handler = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        info!("Browser launched");
        Ok(RunningBrowser { browser, handler })
    }

    async fn render(
        &self,
        page: &Page,
        url: &Url,
        progress: &dyn ProgressSink,
    ) -> Result<String, FetchError> {
        let guard = RequestGuard::install(page, url).await?;

        let timeout = self.fetch.timeout();
        match tokio::time::timeout(timeout, page.goto(url.as_str())).await {
            Err(_) => return Err(FetchError::Timeout(timeout)),
            Ok(Err(e)) => {
                if let Some(target) = guard.blocked_navigation() {
                    return Err(FetchError::OffHostNavigation(target));
                }
                return Err(FetchError::Browser(format!("Navigation failed: {}", e)));
            }
            Ok(Ok(_)) => {}
        }

        if let Some(status) = guard.document_status() {
            if status >= 400 {
                return Err(FetchError::UpstreamError(format!("HTTP {}", status)));
            }
        }

        progress.report(Stage::Rendering, "Waiting for client-side rendering.");
        tokio::time::sleep(std::time::Duration::from_millis(self.config.settle_ms)).await;

        if let Some(target) = guard.blocked_navigation() {
            return Err(FetchError::OffHostNavigation(target));
        }
        let final_url = page
            .url()
            .await
            .map_err(|e| FetchError::Browser(format!("Failed to read page URL: {}", e)))?
            .and_then(|u| Url::parse(&u).ok());
        if let Some(final_url) = final_url {
            if !same_host(url, &final_url) {
                return Err(FetchError::OffHostNavigation(final_url.to_string()));
            }
        }

        let html = page
            .content()
            .await
            .map_err(|e| FetchError::Browser(format!("Failed to read page content: {}", e)))?;
        if html.len() > self.fetch.max_response_bytes {
            return Err(FetchError::SizeExceeded(self.fetch.max_response_bytes));
        }

        progress.report(
            Stage::Rendering,
            &format!("Captured {} bytes of rendered HTML.", html.len()),
        );
        Ok(html)
    }
}

#[derive(Default)]
struct GuardState {
    blocked_navigation: Option<String>,
    document_status: Option<i64>,
}

/// Intercepts a page's requests for the lifetime of one render.
struct RequestGuard {
    state: Arc<StdMutex<GuardState>>,
    tasks: Vec<JoinHandle<()>>,
}

impl RequestGuard {
    async fn install(page: &Page, source: &Url) -> Result<Self, FetchError> {
        let cdp = |e: chromiumoxide::error::CdpError| {
            FetchError::Browser(format!("Failed to set up request interception: {}", e))
        };

        let main_frame = page.mainframe().await.map_err(cdp)?;
        let mut paused = page.event_listener::<EventRequestPaused>().await.map_err(cdp)?;
        let mut responses = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(cdp)?;
        page.execute(EnableParams::default()).await.map_err(cdp)?;

        let state = Arc::new(StdMutex::new(GuardState::default()));

        let intercept = {
            let page = page.clone();
            let source = source.clone();
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                while let Some(event) = paused.next().await {
                    let allowed = request_allowed(&source, &event.request.url, &event.resource_type);
                    let outcome = if allowed {
                        page.execute(ContinueRequestParams::new(event.request_id.clone()))
                            .await
                            .map(|_| ())
                    } else {
                        let top_level = event.resource_type == ResourceType::Document
                            && main_frame.as_ref() == Some(&event.frame_id);
                        if top_level {
                            if let Ok(mut state) = state.lock() {
                                state.blocked_navigation.get_or_insert(event.request.url.clone());
                            }
                        }
                        debug!(url = %event.request.url, "Blocked browser request");
                        page.execute(FailRequestParams::new(
                            event.request_id.clone(),
                            ErrorReason::BlockedByClient,
                        ))
                        .await
                        .map(|_| ())
                    };
                    if let Err(e) = outcome {
                        debug!("Request interception failed: {}", e);
                    }
                }
            })
        };

        let watch = {
            let source = source.clone();
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                while let Some(event) = responses.next().await {
                    if event.r#type != ResourceType::Document {
                        continue;
                    }
                    let on_source = Url::parse(&event.response.url)
                        .map(|u| same_host(&source, &u))
                        .unwrap_or(false);
                    if on_source {
                        if let Ok(mut state) = state.lock() {
                            state.document_status.get_or_insert(event.response.status);
                        }
                    }
                }
            })
        };

        Ok(Self {
            state,
            tasks: vec![intercept, watch],
        })
    }

    fn blocked_navigation(&self) -> Option<String> {
        self.state.lock().ok().and_then(|s| s.blocked_navigation.clone())
    }

    fn document_status(&self) -> Option<i64> {
        self.state.lock().ok().and_then(|s| s.document_status)
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Only same-host http(s) requests for essential resource types go through.
fn request_allowed(source: &Url, raw: &str, resource_type: &ResourceType) -> bool {
    if matches!(
        resource_type,
        ResourceType::Image | ResourceType::Media | ResourceType::Font | ResourceType::WebSocket
    ) {
        return false;
    }
    match Url::parse(raw) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && same_host(source, &url),
        Err(_) => false,
    }
}
