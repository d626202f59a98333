//! # Sitebridge
//!
//! Turns ordinary listing pages (forum indexes, release pages, blog
//! archives) into RSS feeds using CSS-selector extraction profiles.
//!
//! ## Architecture
//!
//! ```text
//! Fetcher → DOM → Extractor → Filter → Store → Publish
//!                                 ↑
//!                             Scheduler
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! # Try selectors against a page without saving anything
//! sitebridge preview --url https://example.com/forum --item-selector .topic-row
//!
//! # Save it as a profile
//! sitebridge add --url https://example.com/forum --item-selector .topic-row \
//!     --include "alpha OR beta" --exclude draft
//!
//! # Print the feed
//! sitebridge feed <token>
//!
//! # Keep due profiles refreshed
//! sitebridge run
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the store,
/// the fetchers and the refresher.
pub mod app;

/// Configuration loaded from `~/.config/sitebridge/config.toml`:
/// database location, public base URL, scheduler cadence, fetch limits
/// and browser options.
pub mod config;

/// Command-line interface using clap.
pub mod cli;

/// Core domain models.
///
/// - [`ExtractionConfig`](domain::ExtractionConfig): validated profile settings
/// - [`Profile`](domain::Profile): a stored profile with its refresh state
/// - [`Entry`](domain::Entry) and [`FeedItem`](domain::FeedItem): extracted and stored entries
pub mod domain;

/// Read-only DOM abstraction used by the extractor, with a `scraper` backend.
pub mod dom;

/// Include/exclude rule language.
///
/// One rule per line, `AND`/`OR` with parentheses and quoted phrases,
/// matched case-insensitively against entry titles.
pub mod filter;

/// Selector-based entry extraction, including link expansion for pages
/// whose item nodes are coarse containers.
pub mod extractor;

/// Stage-tagged progress reporting for long extractions.
pub mod progress;

/// Source page fetching.
///
/// - [`HtmlFetcher`](fetcher::HtmlFetcher): async trait over fetch modes
/// - [`HttpFetcher`](fetcher::http_fetcher::HttpFetcher): reqwest with same-host redirects only
/// - [`BrowserFetcher`](fetcher::browser::BrowserFetcher): headless Chromium via chromiumoxide
pub mod fetcher;

/// Validate, fetch, extract and filter in one call.
pub mod pipeline;

/// Due-time computation, per-profile refresh serialization and the
/// periodic background loop.
pub mod scheduler;

/// SQLite persistence layer.
///
/// - [`Store`](store::Store): Trait defining storage operations
/// - [`SqliteStore`](store::sqlite::SqliteStore): SQLite implementation
pub mod store;

/// RSS 2.0 rendering.
pub mod publish;
