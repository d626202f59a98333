use crate::dom::{collapse_whitespace, SelectorNode};

/// Assemble a title from the text surrounding a link inside its parent.
///
/// Walks backward and then forward through the link's siblings, stopping in
/// each direction at a `<br>` or another `<a>`. Sibling text keeps its
/// position relative to the anchor text.
pub fn inline_title<N: SelectorNode>(link: &N) -> String {
    let anchor_text = link.text();
    if link.parent().is_none() {
        return anchor_text;
    }

    let mut parts = Vec::new();
    let mut cursor = link.prev_sibling();
    while let Some(node) = cursor {
        if is_boundary(&node) {
            break;
        }
        let text = node.text();
        if !text.is_empty() {
            parts.push(text);
        }
        cursor = node.prev_sibling();
    }
    parts.reverse();

    if !anchor_text.is_empty() {
        parts.push(anchor_text.clone());
    }

    let mut cursor = link.next_sibling();
    while let Some(node) = cursor {
        if is_boundary(&node) {
            break;
        }
        let text = node.text();
        if !text.is_empty() {
            parts.push(text);
        }
        cursor = node.next_sibling();
    }

    let title = collapse_whitespace(&parts.join(" "));
    if title.is_empty() {
        anchor_text
    } else {
        title
    }
}

fn is_boundary<N: SelectorNode>(node: &N) -> bool {
    matches!(node.tag_name().as_deref(), Some("br") | Some("a"))
}
