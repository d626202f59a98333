use regex::{Regex, RegexBuilder};

use crate::app::{BridgeError, Result};

/// A single term of a filter expression, matched against entry titles.
#[derive(Debug, Clone)]
pub struct Term {
    text: String,
    matcher: TermMatcher,
}

#[derive(Debug, Clone)]
enum TermMatcher {
    /// Case-insensitive substring containment.
    Contains(String),
    /// `*` / `?` wildcard pattern, anchored on both ends after padding.
    Glob(Regex),
}

impl Term {
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(BridgeError::validation("Filter terms cannot be empty."));
        }
        let matcher = if text.contains(['*', '?']) {
            TermMatcher::Glob(glob_to_regex(&text)?)
        } else {
            TermMatcher::Contains(text.to_lowercase())
        };
        Ok(Self { text, matcher })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_glob(&self) -> bool {
        matches!(self.matcher, TermMatcher::Glob(_))
    }

    pub fn matches(&self, title: &str) -> bool {
        match &self.matcher {
            TermMatcher::Contains(needle) => title.to_lowercase().contains(needle.as_str()),
            TermMatcher::Glob(pattern) => pattern.is_match(title),
        }
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Term {}

/// Compile a wildcard term, padding it with `*` on whichever ends lack one.
fn glob_to_regex(glob: &str) -> Result<Regex> {
    let mut pattern = String::with_capacity(glob.len() + 8);
    pattern.push('^');
    if !glob.starts_with('*') {
        pattern.push_str(".*");
    }
    let mut literal = [0u8; 4];
    for ch in glob.chars() {
        match ch {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            _ => pattern.push_str(&regex::escape(ch.encode_utf8(&mut literal))),
        }
    }
    if !glob.ends_with('*') {
        pattern.push_str(".*");
    }
    pattern.push('$');

    RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .map_err(|e| BridgeError::validation(format!("Invalid wildcard filter `{}`: {}", glob, e)))
}

/// Parsed boolean filter expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterRule {
    Term(Term),
    And(Box<FilterRule>, Box<FilterRule>),
    Or(Box<FilterRule>, Box<FilterRule>),
}

impl FilterRule {
    pub fn term(text: impl Into<String>) -> Result<Self> {
        Ok(Self::Term(Term::new(text)?))
    }

    pub fn and(left: FilterRule, right: FilterRule) -> Self {
        Self::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: FilterRule, right: FilterRule) -> Self {
        Self::Or(Box::new(left), Box::new(right))
    }

    pub fn matches(&self, title: &str) -> bool {
        match self {
            Self::Term(term) => term.matches(title),
            Self::And(left, right) => left.matches(title) && right.matches(title),
            Self::Or(left, right) => left.matches(title) || right.matches(title),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substring_is_case_insensitive() {
        let term = Term::new("premium").unwrap();
        assert!(!term.is_glob());
        assert!(term.matches("Product Alpha Premium Edition"));
        assert!(!term.matches("Generic baseline package"));
    }

    #[test]
    fn test_glob_is_padded_on_both_ends() {
        let term = Term::new("build-2?*").unwrap();
        assert!(term.is_glob());
        assert!(term.matches("Toolkit build-21 candidate"));
        assert!(!term.matches("Toolkit build-2"));
        assert!(!term.matches("Toolkit build-31 candidate"));
    }

    #[test]
    fn test_glob_anchored_when_wildcards_present_at_edges() {
        let term = Term::new("*alpha").unwrap();
        assert!(term.matches("release ALPHA"));
        // leading `*` is kept, trailing one is added
        assert!(term.matches("alpha-release premium"));
    }

    #[test]
    fn test_glob_escapes_regex_metacharacters() {
        let term = Term::new("v1.0?").unwrap();
        assert!(term.matches("Release v1.0a is out"));
        assert!(!term.matches("Release v100a is out"));
    }

    #[test]
    fn test_empty_term_rejected() {
        assert!(Term::new("  ").unwrap_err().is_validation());
    }

    #[test]
    fn test_boolean_evaluation() {
        let term = |t: &str| FilterRule::term(t).unwrap();
        let rule = FilterRule::and(
            FilterRule::or(term("alpha"), term("gamma")),
            term("premium"),
        );
        assert!(rule.matches("Package Alpha Premium"));
        assert!(rule.matches("Bundle Gamma Premium"));
        assert!(!rule.matches("Package Alpha Trial"));
        assert!(!rule.matches("Bundle Delta Premium"));
    }
}
