use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::app::{BridgeError, Result};
use crate::dom::validate_selector;
use crate::filter::RuleSet;

pub const MAX_ITEMS_LIMIT: usize = 100;
pub const MAX_REFRESH_INTERVAL_MINUTES: u32 = 1440;

/// Selector values that refer to the node being searched from rather than a descendant.
pub const SCOPE_SELECTORS: [&str; 2] = [":scope", "self"];

pub fn is_scope_selector(selector: &str) -> bool {
    SCOPE_SELECTORS.contains(&selector.trim())
}

/// How the source page is retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    #[default]
    Http,
    Browser,
}

impl FetchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Browser => "browser",
        }
    }
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FetchMode {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "" | "http" => Ok(Self::Http),
            "browser" => Ok(Self::Browser),
            _ => Err(BridgeError::validation("Fetch mode must be http or browser.")),
        }
    }
}

/// Unvalidated profile settings as they arrive from the CLI or a TOML file.
///
/// Every field is loosely typed; [`ExtractionConfig::from_raw`] is the only
/// way to turn this into something the extractor accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RawExtractionConfig {
    pub feed_title: String,
    pub source_url: String,
    pub item_selector: String,
    pub title_selector: String,
    pub link_selector: String,
    pub summary_selector: String,
    pub max_items: String,
    pub refresh_interval_minutes: String,
    pub fetch_mode: String,
    pub include_filter_rules: String,
    pub exclude_filter_rules: String,
}

impl Default for RawExtractionConfig {
    fn default() -> Self {
        Self {
            feed_title: "Example Topic Feed".to_string(),
            source_url: String::new(),
            item_selector: "article, li, .topic-row".to_string(),
            title_selector: "a".to_string(),
            link_selector: "a".to_string(),
            summary_selector: String::new(),
            max_items: "25".to_string(),
            refresh_interval_minutes: "60".to_string(),
            fetch_mode: "http".to_string(),
            include_filter_rules: String::new(),
            exclude_filter_rules: String::new(),
        }
    }
}

/// Validated settings for one extraction profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub feed_title: String,
    pub source_url: Url,
    pub item_selector: String,
    pub title_selector: String,
    pub link_selector: String,
    pub summary_selector: Option<String>,
    pub max_items: usize,
    pub refresh_interval_minutes: u32,
    pub fetch_mode: FetchMode,
    /// Newline-delimited include rules, blank lines already removed.
    pub include_filter_rules: String,
    /// Newline-delimited exclude rules, blank lines already removed.
    pub exclude_filter_rules: String,
}

impl ExtractionConfig {
    pub fn from_raw(raw: &RawExtractionConfig) -> Result<Self> {
        let source_url = parse_source_url(&raw.source_url)?;
        let fetch_mode = raw.fetch_mode.parse::<FetchMode>()?;

        let summary_selector = raw.summary_selector.trim();
        let config = Self {
            feed_title: require_text(&raw.feed_title, "Feed title")?,
            source_url,
            item_selector: require_text(&raw.item_selector, "Item selector")?,
            title_selector: require_text(&raw.title_selector, "Title selector")?,
            link_selector: require_text(&raw.link_selector, "Link selector")?,
            summary_selector: (!summary_selector.is_empty()).then(|| summary_selector.to_string()),
            max_items: parse_max_items(&raw.max_items)?,
            refresh_interval_minutes: parse_refresh_interval(&raw.refresh_interval_minutes)?,
            fetch_mode,
            include_filter_rules: normalize_filter_rules(&raw.include_filter_rules),
            exclude_filter_rules: normalize_filter_rules(&raw.exclude_filter_rules),
        };

        config.validate_selectors()?;
        // Rules are parsed here only to reject malformed text early.
        RuleSet::parse(&config.include_filter_rules)?;
        RuleSet::parse(&config.exclude_filter_rules)?;

        Ok(config)
    }

    /// Check the syntax of every selector; scope selectors are always valid.
    pub fn validate_selectors(&self) -> Result<()> {
        let selectors = [
            Some(&self.item_selector),
            Some(&self.title_selector),
            Some(&self.link_selector),
            self.summary_selector.as_ref(),
        ];
        for selector in selectors.into_iter().flatten() {
            if !is_scope_selector(selector) {
                validate_selector(selector)?;
            }
        }
        Ok(())
    }

    /// Back to the loosely typed form, e.g. to prefill a clone.
    pub fn to_raw(&self) -> RawExtractionConfig {
        RawExtractionConfig {
            feed_title: self.feed_title.clone(),
            source_url: self.source_url.to_string(),
            item_selector: self.item_selector.clone(),
            title_selector: self.title_selector.clone(),
            link_selector: self.link_selector.clone(),
            summary_selector: self.summary_selector.clone().unwrap_or_default(),
            max_items: self.max_items.to_string(),
            refresh_interval_minutes: self.refresh_interval_minutes.to_string(),
            fetch_mode: self.fetch_mode.to_string(),
            include_filter_rules: self.include_filter_rules.clone(),
            exclude_filter_rules: self.exclude_filter_rules.clone(),
        }
    }

    /// Manual-only profiles are never picked up by the scheduler.
    pub fn is_manual_only(&self) -> bool {
        self.refresh_interval_minutes == 0
    }
}

pub fn parse_source_url(raw: &str) -> Result<Url> {
    let invalid = || BridgeError::validation("Source URL must be a full http or https URL.");
    let url = Url::parse(raw.trim()).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none_or(str::is_empty) {
        return Err(invalid());
    }
    Ok(url)
}

fn require_text(value: &str, label: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(BridgeError::validation(format!("{} is required.", label)));
    }
    Ok(value.to_string())
}

fn parse_max_items(raw: &str) -> Result<usize> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| BridgeError::validation("Max items must be a number."))?;
    if !(1..=MAX_ITEMS_LIMIT as i64).contains(&value) {
        return Err(BridgeError::validation("Max items must be between 1 and 100."));
    }
    Ok(value as usize)
}

fn parse_refresh_interval(raw: &str) -> Result<u32> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| BridgeError::validation("Refresh interval must be a number of minutes."))?;
    if !(0..=MAX_REFRESH_INTERVAL_MINUTES as i64).contains(&value) {
        return Err(BridgeError::validation(
            "Refresh interval must be between 0 and 1440 minutes.",
        ));
    }
    Ok(value as u32)
}

/// Trim every line and drop the blank ones.
pub fn normalize_filter_rules(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(source_url: &str) -> RawExtractionConfig {
        RawExtractionConfig {
            feed_title: "Forum Feed".into(),
            source_url: source_url.into(),
            item_selector: ".topic".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_rejects_non_http_source_url() {
        for url in [
            "javascript:alert(1)",
            "ftp://example.com/forum",
            "file:///etc/passwd",
            "example.com/forum",
            "",
        ] {
            let err = ExtractionConfig::from_raw(&raw(url)).unwrap_err();
            assert!(err.is_validation(), "{url} should be rejected");
        }
    }

    #[test]
    fn test_accepts_http_and_https() {
        assert!(ExtractionConfig::from_raw(&raw("http://example.com/forum")).is_ok());
        let config = ExtractionConfig::from_raw(&raw("  https://example.com/forum  ")).unwrap();
        assert_eq!(config.source_url.as_str(), "https://example.com/forum");
    }

    #[test]
    fn test_defaults_follow_compose_form() {
        let config = ExtractionConfig::from_raw(&raw("https://example.com/forum")).unwrap();
        assert_eq!(config.max_items, 25);
        assert_eq!(config.refresh_interval_minutes, 60);
        assert_eq!(config.fetch_mode, FetchMode::Http);
        assert_eq!(config.summary_selector, None);
        assert_eq!(config.title_selector, "a");
    }

    #[test]
    fn test_required_selectors() {
        let mut input = raw("https://example.com/forum");
        input.link_selector = "   ".into();
        let err = ExtractionConfig::from_raw(&input).unwrap_err();
        assert_eq!(err.to_string(), "Link selector is required.");

        let mut input = raw("https://example.com/forum");
        input.feed_title = String::new();
        let err = ExtractionConfig::from_raw(&input).unwrap_err();
        assert_eq!(err.to_string(), "Feed title is required.");
    }

    #[test]
    fn test_max_items_range() {
        let mut input = raw("https://example.com/forum");
        input.max_items = "0".into();
        assert!(ExtractionConfig::from_raw(&input).is_err());
        input.max_items = "101".into();
        assert!(ExtractionConfig::from_raw(&input).is_err());
        input.max_items = "many".into();
        assert_eq!(
            ExtractionConfig::from_raw(&input).unwrap_err().to_string(),
            "Max items must be a number."
        );
        input.max_items = "100".into();
        assert_eq!(ExtractionConfig::from_raw(&input).unwrap().max_items, 100);
    }

    #[test]
    fn test_refresh_interval_range() {
        let mut input = raw("https://example.com/forum");
        input.refresh_interval_minutes = "-1".into();
        assert!(ExtractionConfig::from_raw(&input).is_err());
        input.refresh_interval_minutes = "1441".into();
        assert!(ExtractionConfig::from_raw(&input).is_err());
        input.refresh_interval_minutes = "0".into();
        let config = ExtractionConfig::from_raw(&input).unwrap();
        assert!(config.is_manual_only());
    }

    #[test]
    fn test_fetch_mode_values() {
        let mut input = raw("https://example.com/forum");
        input.fetch_mode = "browser".into();
        assert_eq!(
            ExtractionConfig::from_raw(&input).unwrap().fetch_mode,
            FetchMode::Browser
        );
        input.fetch_mode = "curl".into();
        assert_eq!(
            ExtractionConfig::from_raw(&input).unwrap_err().to_string(),
            "Fetch mode must be http or browser."
        );
    }

    #[test]
    fn test_filter_rules_are_normalized() {
        let mut input = raw("https://example.com/forum");
        input.include_filter_rules = "  premium \n\n   \nbuild-2?*\n".into();
        let config = ExtractionConfig::from_raw(&input).unwrap();
        assert_eq!(config.include_filter_rules, "premium\nbuild-2?*");
    }

    #[test]
    fn test_malformed_filter_rule_rejected() {
        let mut input = raw("https://example.com/forum");
        input.exclude_filter_rules = "(alpha OR premium".into();
        let err = ExtractionConfig::from_raw(&input).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_invalid_selector_syntax_rejected() {
        let err = ExtractionConfig::from_raw(&RawExtractionConfig {
            item_selector: "li[".into(),
            ..raw("https://example.com/forum")
        })
        .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("li["));

        let err = ExtractionConfig::from_raw(&RawExtractionConfig {
            summary_selector: "p[".into(),
            ..raw("https://example.com/forum")
        })
        .unwrap_err();
        assert!(err.is_validation());

        let scoped = ExtractionConfig::from_raw(&RawExtractionConfig {
            title_selector: "self".into(),
            link_selector: ":scope".into(),
            ..raw("https://example.com/forum")
        });
        assert!(scoped.is_ok());
    }

    #[test]
    fn test_scope_selectors() {
        assert!(is_scope_selector(":scope"));
        assert!(is_scope_selector(" self "));
        assert!(!is_scope_selector("a"));
    }

    #[test]
    fn test_round_trip_through_raw_form() {
        let mut input = raw("https://example.com/forum");
        input.summary_selector = ".excerpt".into();
        let config = ExtractionConfig::from_raw(&input).unwrap();
        let again = ExtractionConfig::from_raw(&config.to_raw()).unwrap();
        assert_eq!(config, again);
    }
}
