//! DOM access used by the extractor.
//!
//! The extractor only needs a handful of queries, captured by
//! [`SelectorNode`]. [`HtmlDocument`] implements it on top of `scraper`;
//! tests can supply their own fixture trees.

mod html;

pub use html::{HtmlDocument, HtmlNode};

use crate::app::Result;

/// A DOM-like node: an element, a text node, or the document root.
pub trait SelectorNode: Clone {
    /// All descendants matching `selector`, in document order.
    fn select(&self, selector: &str) -> Result<Vec<Self>>;

    /// The first descendant matching `selector`.
    fn select_one(&self, selector: &str) -> Result<Option<Self>> {
        Ok(self.select(selector)?.into_iter().next())
    }

    /// Text content with whitespace runs collapsed to single spaces and trimmed.
    fn text(&self) -> String;

    fn attr(&self, name: &str) -> Option<String>;

    /// Lower-case tag name for elements, `None` for text and document nodes.
    fn tag_name(&self) -> Option<String>;

    fn parent(&self) -> Option<Self>;

    fn prev_sibling(&self) -> Option<Self>;

    fn next_sibling(&self) -> Option<Self>;

    /// Identity comparison, not structural equality.
    fn is_same_node(&self, other: &Self) -> bool;
}

/// Check CSS selector syntax without a document.
pub fn validate_selector(selector: &str) -> Result<()> {
    html::parse_selector(selector).map(|_| ())
}

/// Collapse whitespace runs the way rendered text reads.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
