//! Observational progress reporting for the extraction pipeline.
//!
//! Sinks are called synchronously at fixed pipeline points and never alter
//! control flow or results.

use std::fmt;

use serde::Serialize;
use tokio::sync::mpsc;

/// Pipeline stage reported to a [`ProgressSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validating,
    Fetching,
    LaunchingBrowser,
    Rendering,
    Parsing,
    MatchingSelectors,
    Extracting,
    ExpandingLinks,
    Filtering,
    Complete,
}

impl Stage {
    pub fn title(&self) -> &'static str {
        match self {
            Self::Validating => "Validating request",
            Self::Fetching => "Fetching content",
            Self::LaunchingBrowser => "Launching browser",
            Self::Rendering => "Rendering page",
            Self::Parsing => "Analyzing document",
            Self::MatchingSelectors => "Matching selectors",
            Self::Extracting => "Extracting entries",
            Self::ExpandingLinks => "Expanding repeated links",
            Self::Filtering => "Applying filters",
            Self::Complete => "Preparing preview",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Receives (stage, detail) pairs during one extraction call.
pub trait ProgressSink: Send + Sync {
    fn report(&self, stage: Stage, detail: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(Stage, &str) + Send + Sync,
{
    fn report(&self, stage: Stage, detail: &str) {
        self(stage, detail)
    }
}

/// A no-op progress sink.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&self, _stage: Stage, _detail: &str) {}
}

/// Logs every stage at debug level.
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, stage: Stage, detail: &str) {
        tracing::debug!(stage = stage.title(), "{}", detail);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub title: &'static str,
    pub detail: String,
}

/// Forwards events into an unbounded channel.
///
/// The receiving end observes an ordered, finite stream that ends once every
/// sender clone is dropped, i.e. when the extraction call has returned.
#[derive(Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressSink for ChannelProgress {
    fn report(&self, stage: Stage, detail: &str) {
        tracing::debug!(stage = stage.title(), "{}", detail);
        // A dropped receiver only means nobody is watching any more.
        let _ = self.tx.send(ProgressEvent {
            stage,
            title: stage.title(),
            detail: detail.to_string(),
        });
    }
}

/// Whether a 1-based position falls on the reporting cadence:
/// the first, every 25th, and the last.
pub fn on_cadence(position: usize, total: usize) -> bool {
    position == 1 || position % 25 == 0 || position == total
}
