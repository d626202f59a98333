use ego_tree::NodeRef;
use scraper::{ElementRef, Html, Node, Selector};

use crate::app::{BridgeError, Result};
use crate::dom::{collapse_whitespace, SelectorNode};

/// A parsed HTML document.
pub struct HtmlDocument {
    html: Html,
}

impl HtmlDocument {
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
        }
    }

    /// The document node itself, above `<html>`.
    pub fn root(&self) -> HtmlNode<'_> {
        HtmlNode {
            node: self.html.tree.root(),
        }
    }
}

/// A node borrowed from an [`HtmlDocument`].
#[derive(Clone, Copy)]
pub struct HtmlNode<'a> {
    node: NodeRef<'a, Node>,
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector.trim()).map_err(|e| {
        BridgeError::validation(format!("Invalid selector `{}`: {}", selector.trim(), e))
    })
}

impl std::fmt::Debug for HtmlNode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.node.value() {
            Node::Element(el) => write!(f, "<{}>", el.name()),
            Node::Text(text) => write!(f, "{:?}", &**text),
            _ => write!(f, "#node"),
        }
    }
}

impl<'a> SelectorNode for HtmlNode<'a> {
    fn select(&self, selector: &str) -> Result<Vec<Self>> {
        let parsed = parse_selector(selector)?;
        let scope = ElementRef::wrap(self.node);
        Ok(self
            .node
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .filter(|el| parsed.matches_with_scope(el, scope))
            .map(|el| HtmlNode { node: *el })
            .collect())
    }

    fn text(&self) -> String {
        let pieces: Vec<&str> = self
            .node
            .descendants()
            .filter_map(|n| n.value().as_text().map(|t| &**t))
            .collect();
        collapse_whitespace(&pieces.join(" "))
    }

    fn attr(&self, name: &str) -> Option<String> {
        self.node
            .value()
            .as_element()
            .and_then(|el| el.attr(name))
            .map(str::to_string)
    }

    fn tag_name(&self) -> Option<String> {
        self.node
            .value()
            .as_element()
            .map(|el| el.name().to_ascii_lowercase())
    }

    fn parent(&self) -> Option<Self> {
        self.node.parent().map(|node| HtmlNode { node })
    }

    fn prev_sibling(&self) -> Option<Self> {
        self.node.prev_sibling().map(|node| HtmlNode { node })
    }

    fn next_sibling(&self) -> Option<Self> {
        self.node.next_sibling().map(|node| HtmlNode { node })
    }

    fn is_same_node(&self, other: &Self) -> bool {
        self.node.id() == other.node.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <ul class="topics">
            <li class="topic"><a href="/t/1">First   topic</a> <span class="meta">by ann</span></li>
            <li class="topic"><a href="/t/2">Second topic</a></li>
          </ul>
        </body></html>
    "#;

    #[test]
    fn test_select_in_document_order() {
        let doc = HtmlDocument::parse(PAGE);
        let items = doc.root().select("li.topic").unwrap();
        assert_eq!(items.len(), 2);
        let first_link = items[0].select_one("a").unwrap().unwrap();
        assert_eq!(first_link.attr("href").as_deref(), Some("/t/1"));
        assert_eq!(first_link.text(), "First topic");
    }

    #[test]
    fn test_select_excludes_the_node_itself() {
        let doc = HtmlDocument::parse(PAGE);
        let item = doc.root().select_one("li.topic").unwrap().unwrap();
        assert!(item.select("li").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_selector_is_validation_error() {
        let doc = HtmlDocument::parse(PAGE);
        let err = doc.root().select("li[").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_validate_selector_without_document() {
        assert!(crate::dom::validate_selector("li.topic > a[href]").is_ok());
        assert!(crate::dom::validate_selector("p[").unwrap_err().is_validation());
    }

    #[test]
    fn test_sibling_traversal_includes_text_nodes() {
        let doc = HtmlDocument::parse(PAGE);
        let link = doc.root().select_one("a").unwrap().unwrap();
        let next = link.next_sibling().unwrap();
        assert_eq!(next.tag_name(), None);
        let span = next.next_sibling().unwrap();
        assert_eq!(span.tag_name().as_deref(), Some("span"));
        assert_eq!(span.text(), "by ann");
        assert!(link.parent().unwrap().is_same_node(&span.parent().unwrap()));
    }
}
