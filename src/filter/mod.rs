//! Boolean filter rules evaluated against entry titles.
//!
//! Rule text is newline-delimited; each non-blank line is parsed into its own
//! [`FilterRule`] tree and a [`RuleSet`] matches when any line does.
//! Include rules are applied first, exclude rules after them.

mod parser;
mod rule;

pub use parser::parse_expression;
pub use rule::{FilterRule, Term};

use crate::app::Result;
use crate::domain::{Entry, ExtractionConfig};

/// Parsed rules from one rule text field, OR-ed across lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    rules: Vec<FilterRule>,
}

impl RuleSet {
    pub fn parse(text: &str) -> Result<Self> {
        let rules = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(parse_expression)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn rules(&self) -> &[FilterRule] {
        &self.rules
    }

    pub fn matches_any(&self, title: &str) -> bool {
        self.rules.iter().any(|rule| rule.matches(title))
    }
}

/// Include and exclude rule sets for one profile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryFilter {
    include: RuleSet,
    exclude: RuleSet,
}

impl EntryFilter {
    pub fn new(include: RuleSet, exclude: RuleSet) -> Self {
        Self { include, exclude }
    }

    pub fn from_config(config: &ExtractionConfig) -> Result<Self> {
        Ok(Self::new(
            RuleSet::parse(&config.include_filter_rules)?,
            RuleSet::parse(&config.exclude_filter_rules)?,
        ))
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn accepts(&self, entry: &Entry) -> bool {
        if !self.include.is_empty() && !self.include.matches_any(&entry.title) {
            return false;
        }
        if !self.exclude.is_empty() && self.exclude.matches_any(&entry.title) {
            return false;
        }
        true
    }

    pub fn apply(&self, entries: Vec<Entry>) -> Vec<Entry> {
        if self.is_empty() {
            return entries;
        }
        entries.into_iter().filter(|e| self.accepts(e)).collect()
    }
}
