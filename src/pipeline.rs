//! One extraction run: validate, fetch, parse, extract, filter.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::app::Result;
use crate::dom::HtmlDocument;
use crate::domain::{Entry, ExtractionConfig};
use crate::extractor::Extractor;
use crate::fetcher::HtmlFetcher;
use crate::progress::{ChannelProgress, ProgressEvent, ProgressSink, Stage};

/// Fetch the source page for `config` and extract its entries.
///
/// Selector and rule validation happens before any network access.
pub async fn extract_feed_entries(
    config: &ExtractionConfig,
    fetcher: &dyn HtmlFetcher,
    progress: &dyn ProgressSink,
) -> Result<Vec<Entry>> {
    progress.report(Stage::Validating, "Checking selectors and filter rules.");
    let extractor = Extractor::new(config)?;

    progress.report(
        Stage::Fetching,
        &format!("Fetching {} in {} mode.", config.source_url, config.fetch_mode),
    );
    let html = fetcher
        .fetch(&config.source_url, config.fetch_mode, progress)
        .await?;

    let entries = extract_from_html(&extractor, &html, Utc::now(), progress)?;

    progress.report(Stage::Filtering, "Applying include and exclude rules.");
    let mut entries = extractor.filter().apply(entries);
    entries.truncate(config.max_items);

    progress.report(
        Stage::Complete,
        &format!("Prepared {} entries.", entries.len()),
    );
    debug!(url = %config.source_url, entries = entries.len(), "Extraction finished");
    Ok(entries)
}

/// Parse and extract synchronously; the parsed document never crosses an await.
fn extract_from_html(
    extractor: &Extractor<'_>,
    html: &str,
    now: DateTime<Utc>,
    progress: &dyn ProgressSink,
) -> Result<Vec<Entry>> {
    progress.report(Stage::Parsing, "Parsing the page.");
    let document = HtmlDocument::parse(html);
    extractor.extract(&document.root(), now, progress)
}

/// Run an extraction in the background and stream its progress.
///
/// The receiver yields every event in order and closes once the run ends;
/// the handle resolves to the run's result.
pub fn preview_stream(
    config: ExtractionConfig,
    fetcher: Arc<dyn HtmlFetcher>,
) -> (
    mpsc::UnboundedReceiver<ProgressEvent>,
    JoinHandle<Result<Vec<Entry>>>,
) {
    let (sink, rx) = ChannelProgress::new();
    let handle = tokio::spawn(async move {
        extract_feed_entries(&config, fetcher.as_ref(), &sink).await
    });
    (rx, handle)
}
