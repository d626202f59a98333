//! Turns a parsed page into feed entries using a profile's selectors.
//!
//! Extraction runs a primary pass (one entry per item node) and, when that
//! pass finds almost nothing while item nodes hold several links, a
//! link-expansion pass that emits one entry per link instead.

mod inline;

pub use inline::inline_title;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use url::Url;

use crate::app::{BridgeError, Result};
use crate::dom::SelectorNode;
use crate::domain::{is_scope_selector, Entry, ExtractionConfig};
use crate::filter::EntryFilter;
use crate::progress::{on_cadence, ProgressSink, Stage};

/// The link-expansion pass is considered when the primary pass yields at
/// most this many entries.
pub const LINK_EXPANSION_THRESHOLD: usize = 1;

pub struct Extractor<'a> {
    config: &'a ExtractionConfig,
    filter: EntryFilter,
}

impl<'a> Extractor<'a> {
    /// Checks selectors and filter rules; nothing here touches a document.
    pub fn new(config: &'a ExtractionConfig) -> Result<Self> {
        config.validate_selectors()?;
        Ok(Self {
            config,
            filter: EntryFilter::from_config(config)?,
        })
    }

    pub fn filter(&self) -> &EntryFilter {
        &self.filter
    }

    /// Extract entries from `document`.
    ///
    /// Every returned link is absolute, http(s), on the source host and
    /// unique; at most `max_items` entries are returned, in document order.
    pub fn extract<N: SelectorNode>(
        &self,
        document: &N,
        now: DateTime<Utc>,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<Entry>> {
        progress.report(Stage::MatchingSelectors, "Locating item nodes in the page.");
        let items = select_scoped(document, &self.config.item_selector)?;
        if items.is_empty() {
            return Err(BridgeError::extraction(
                "No topic nodes matched the item selector.",
            ));
        }
        progress.report(
            Stage::MatchingSelectors,
            &format!("Matched {} item nodes.", items.len()),
        );

        progress.report(Stage::Extracting, "Reading titles and links from matched nodes.");
        let mut entries = self.primary_pass(&items, now, progress)?;

        if self.should_expand_links(&items, entries.len())? {
            progress.report(
                Stage::ExpandingLinks,
                "Matched nodes hold several links each. Expanding them into separate entries.",
            );
            let expanded = self.expand_links(&items, now, progress)?;
            if expanded.len() > entries.len() {
                tracing::debug!(
                    primary = entries.len(),
                    expanded = expanded.len(),
                    "Using link-expansion results"
                );
                entries = expanded;
            }
        }

        if entries.is_empty() {
            return Err(BridgeError::extraction(
                "Matched nodes did not contain usable titles and links.",
            ));
        }
        Ok(entries)
    }

    fn primary_pass<N: SelectorNode>(
        &self,
        items: &[N],
        now: DateTime<Utc>,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<Entry>> {
        let total = items.len();
        let mut seen = HashSet::new();
        let mut entries = Vec::new();

        for (index, item) in items.iter().enumerate() {
            let position = index + 1;
            if on_cadence(position, total) {
                progress.report(
                    Stage::Extracting,
                    &format!("Processed {} of {} matched nodes.", position, total),
                );
            }

            let title_node = select_one_scoped(item, &self.config.title_selector)?;
            let link_node = select_one_scoped(item, &self.config.link_selector)?;
            let (Some(title_node), Some(link_node)) = (title_node, link_node) else {
                continue;
            };

            let Some(entry) = self.build_entry(item, &title_node, &link_node, None, now)? else {
                continue;
            };
            if !self.filter.accepts(&entry) || !seen.insert(entry.link.clone()) {
                continue;
            }
            entries.push(entry);
            if entries.len() >= self.config.max_items {
                break;
            }
        }

        Ok(entries)
    }

    fn should_expand_links<N: SelectorNode>(&self, items: &[N], found: usize) -> Result<bool> {
        if found > LINK_EXPANSION_THRESHOLD {
            return Ok(false);
        }
        for item in items {
            if select_scoped(item, &self.config.link_selector)?.len() > 1 {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn expand_links<N: SelectorNode>(
        &self,
        items: &[N],
        now: DateTime<Utc>,
        progress: &dyn ProgressSink,
    ) -> Result<Vec<Entry>> {
        let mut groups = Vec::with_capacity(items.len());
        for item in items {
            groups.push((item, select_scoped(item, &self.config.link_selector)?));
        }
        let total: usize = groups.iter().map(|(_, links)| links.len()).sum();

        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        let mut processed = 0;

        for (item, links) in groups {
            for link in links {
                processed += 1;
                if on_cadence(processed, total) {
                    progress.report(
                        Stage::ExpandingLinks,
                        &format!("Processed {} of {} linked entries.", processed, total),
                    );
                }

                let title = self.expanded_title(&link)?;
                let Some(entry) = self.build_entry(item, &link, &link, Some(title), now)? else {
                    continue;
                };
                if seen.contains(&entry.link) || !self.filter.accepts(&entry) {
                    continue;
                }
                seen.insert(entry.link.clone());
                entries.push(entry);
                if entries.len() >= self.config.max_items {
                    return Ok(entries);
                }
            }
        }

        Ok(entries)
    }

    /// Title for one expanded link: a distinct title node inside the link,
    /// then surrounding inline text, then the anchor text itself.
    fn expanded_title<N: SelectorNode>(&self, link: &N) -> Result<String> {
        let title_selector = self.config.title_selector.trim();
        if !is_scope_selector(title_selector) && title_selector != self.config.link_selector.trim() {
            if let Some(node) = link.select_one(title_selector)? {
                let text = node.text();
                if !node.is_same_node(link) && !text.is_empty() {
                    return Ok(text);
                }
            }
        }

        let inline = inline_title(link);
        if !inline.is_empty() {
            return Ok(inline);
        }
        Ok(link.text())
    }

    fn build_entry<N: SelectorNode>(
        &self,
        container: &N,
        title_node: &N,
        link_node: &N,
        title: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Option<Entry>> {
        let Some(href) = link_node
            .attr("href")
            .map(|href| href.trim().to_string())
            .filter(|href| !href.is_empty())
        else {
            return Ok(None);
        };
        let link = resolve_link(&self.config.source_url, &href)?;

        let title = title
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| title_node.text());
        if title.is_empty() {
            return Ok(None);
        }

        let summary = match &self.config.summary_selector {
            Some(selector) => select_one_scoped(container, selector)
                .ok()
                .flatten()
                .map(|node| node.text())
                .unwrap_or_default(),
            None => String::new(),
        };

        Ok(Some(Entry::new(title, link, now).with_summary(summary)))
    }
}

/// Convenience wrapper for one-off extraction.
pub fn extract_entries<N: SelectorNode>(
    document: &N,
    config: &ExtractionConfig,
    now: DateTime<Utc>,
    progress: &dyn ProgressSink,
) -> Result<Vec<Entry>> {
    Extractor::new(config)?.extract(document, now, progress)
}

/// Resolve `href` against the source page and enforce the same-host policy.
pub fn resolve_link(source: &Url, href: &str) -> Result<String> {
    let not_http = || BridgeError::validation("Topic links must resolve to http or https URLs.");
    let link = source.join(href).map_err(|_| not_http())?;
    if !matches!(link.scheme(), "http" | "https") {
        return Err(not_http());
    }
    if link.host_str() != source.host_str() || link.port() != source.port() {
        return Err(BridgeError::validation(
            "Off-site topic links are blocked by default.",
        ));
    }
    Ok(link.to_string())
}

fn select_scoped<N: SelectorNode>(node: &N, selector: &str) -> Result<Vec<N>> {
    if is_scope_selector(selector) {
        return Ok(vec![node.clone()]);
    }
    node.select(selector)
}

fn select_one_scoped<N: SelectorNode>(node: &N, selector: &str) -> Result<Option<N>> {
    if is_scope_selector(selector) {
        return Ok(Some(node.clone()));
    }
    node.select_one(selector)
}
