pub mod sqlite;

use chrono::{DateTime, Utc};

use crate::app::Result;
use crate::domain::{Entry, ExtractionConfig, FeedItem, Profile, StatusUpdate};

pub use sqlite::SqliteStore;

pub trait Store {
    // Profile operations
    fn create_profile(&self, config: &ExtractionConfig, now: DateTime<Utc>) -> Result<Profile>;
    /// Rewrite a profile's configuration; status returns to idle.
    fn update_profile(&self, id: i64, config: &ExtractionConfig, now: DateTime<Utc>) -> Result<Profile>;
    fn get_profile(&self, id: i64) -> Result<Option<Profile>>;
    fn get_profile_by_token(&self, token: &str) -> Result<Option<Profile>>;
    /// All profiles, newest first.
    fn list_profiles(&self) -> Result<Vec<Profile>>;
    fn list_active_profiles(&self) -> Result<Vec<Profile>>;
    fn delete_profile(&self, id: i64) -> Result<bool>;
    fn update_status(&self, id: i64, update: &StatusUpdate) -> Result<()>;

    // Item operations
    /// Insert new links and update title/summary of known ones.
    fn upsert_items(&self, profile_id: i64, entries: &[Entry], now: DateTime<Utc>) -> Result<usize>;
    /// Upsert a refresh's entries and record its status in one transaction.
    fn commit_refresh(&self, profile_id: i64, entries: &[Entry], update: &StatusUpdate) -> Result<usize>;
    /// Remove every stored item; status returns to idle.
    fn purge_items(&self, profile_id: i64, now: DateTime<Utc>) -> Result<usize>;
    /// Stored items, most recently discovered first.
    fn list_items(&self, profile_id: i64, limit: usize) -> Result<Vec<FeedItem>>;
}
