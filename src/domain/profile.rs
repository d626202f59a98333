use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::app::{BridgeError, Result};
use crate::domain::ExtractionConfig;

/// Last known refresh outcome of a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileStatus {
    #[default]
    Idle,
    Ok,
    Error,
    Disabled,
}

impl ProfileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Disabled => "disabled",
        }
    }
}

impl fmt::Display for ProfileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileStatus {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "idle" => Ok(Self::Idle),
            "ok" => Ok(Self::Ok),
            "error" => Ok(Self::Error),
            "disabled" => Ok(Self::Disabled),
            other => Err(BridgeError::Other(format!("Unknown profile status: {}", other))),
        }
    }
}

/// A persisted extraction profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    /// Public identity used in feed URLs.
    pub token: String,
    pub config: ExtractionConfig,
    pub active: bool,
    pub status: ProfileStatus,
    /// Empty unless `status` is `Error`.
    pub last_error: String,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    /// Due-time anchor, moved independently of `last_refreshed_at` on enable.
    pub refresh_anchor_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub item_count: usize,
}

impl Profile {
    pub fn display_title(&self) -> &str {
        &self.config.feed_title
    }
}

/// A status transition to persist atomically.
///
/// `None` timestamp or flag fields leave the stored value untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: ProfileStatus,
    pub last_error: String,
    pub active: Option<bool>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
    pub refresh_anchor_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl StatusUpdate {
    /// A refresh attempt finished and its entries were stored.
    pub fn succeeded(now: DateTime<Utc>) -> Self {
        Self {
            status: ProfileStatus::Ok,
            last_error: String::new(),
            active: None,
            last_refreshed_at: Some(now),
            refresh_anchor_at: Some(now),
            updated_at: now,
        }
    }

    /// A refresh attempt failed. Timestamps still advance so the next attempt
    /// waits a full interval.
    pub fn failed(message: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            status: ProfileStatus::Error,
            last_error: message.into(),
            active: None,
            last_refreshed_at: Some(now),
            refresh_anchor_at: Some(now),
            updated_at: now,
        }
    }

    pub fn disabled(now: DateTime<Utc>) -> Self {
        Self {
            status: ProfileStatus::Disabled,
            last_error: String::new(),
            active: Some(false),
            last_refreshed_at: None,
            refresh_anchor_at: None,
            updated_at: now,
        }
    }

    /// Re-enabling moves the anchor to `now` so the profile is not due at once.
    pub fn enabled(now: DateTime<Utc>) -> Self {
        Self {
            status: ProfileStatus::Idle,
            last_error: String::new(),
            active: Some(true),
            last_refreshed_at: None,
            refresh_anchor_at: Some(now),
            updated_at: now,
        }
    }

    /// Back to idle after an edit or purge; inactive profiles stay disabled.
    pub fn reset(now: DateTime<Utc>) -> Self {
        Self {
            status: ProfileStatus::Idle,
            last_error: String::new(),
            active: None,
            last_refreshed_at: None,
            refresh_anchor_at: None,
            updated_at: now,
        }
    }
}

static COPY_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?P<base>.*?)(?: copy(?: (?P<suffix>\d+))?)?$").unwrap());

/// Pick a title for a cloned profile that does not collide with `existing`.
///
/// "Feed" becomes "Feed copy"; when that is taken, numbered copies follow,
/// continuing from the number already carried by `original`.
pub fn clone_title<'a, I>(original: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let taken: Vec<String> = existing.into_iter().map(str::to_lowercase).collect();
    let is_taken = |candidate: &str| taken.iter().any(|t| *t == candidate.to_lowercase());

    let original = original.trim();
    let captures = COPY_SUFFIX.captures(original);
    let base_name = captures
        .as_ref()
        .and_then(|c| c.name("base"))
        .map(|m| m.as_str().trim())
        .unwrap_or(original);
    let base_title = format!("{} copy", base_name);
    if !is_taken(&base_title) {
        return base_title;
    }

    let mut suffix = captures
        .as_ref()
        .and_then(|c| c.name("suffix"))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .map(|n| n + 1)
        .unwrap_or(1);
    loop {
        let candidate = format!("{} {}", base_title, suffix);
        if !is_taken(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            ProfileStatus::Idle,
            ProfileStatus::Ok,
            ProfileStatus::Error,
            ProfileStatus::Disabled,
        ] {
            assert_eq!(status.as_str().parse::<ProfileStatus>().unwrap(), status);
        }
        assert!("paused".parse::<ProfileStatus>().is_err());
    }

    #[test]
    fn test_failed_update_advances_both_timestamps() {
        let now = Utc::now();
        let update = StatusUpdate::failed("boom", now);
        assert_eq!(update.status, ProfileStatus::Error);
        assert_eq!(update.last_refreshed_at, Some(now));
        assert_eq!(update.refresh_anchor_at, Some(now));
        assert_eq!(update.active, None);
    }

    #[test]
    fn test_disable_leaves_timestamps_alone() {
        let update = StatusUpdate::disabled(Utc::now());
        assert_eq!(update.active, Some(false));
        assert_eq!(update.last_refreshed_at, None);
        assert_eq!(update.refresh_anchor_at, None);
        assert!(update.last_error.is_empty());
    }

    #[test]
    fn test_enable_moves_only_the_anchor() {
        let now = Utc::now();
        let update = StatusUpdate::enabled(now);
        assert_eq!(update.status, ProfileStatus::Idle);
        assert_eq!(update.active, Some(true));
        assert_eq!(update.last_refreshed_at, None);
        assert_eq!(update.refresh_anchor_at, Some(now));
    }

    #[test]
    fn test_clone_title_plain() {
        assert_eq!(clone_title("Forum Feed", ["Forum Feed"]), "Forum Feed copy");
    }

    #[test]
    fn test_clone_title_increments_existing_copy_suffix() {
        assert_eq!(
            clone_title("Forum Feed copy", ["Forum Feed copy"]),
            "Forum Feed copy 1"
        );
    }

    #[test]
    fn test_clone_title_increments_numbered_copy_suffix() {
        assert_eq!(
            clone_title("Forum Feed copy 1", ["Forum Feed copy", "Forum Feed copy 1"]),
            "Forum Feed copy 2"
        );
    }

    #[test]
    fn test_clone_title_is_case_insensitive() {
        assert_eq!(
            clone_title("News", ["news COPY", "News copy 1"]),
            "News copy 2"
        );
    }
}
