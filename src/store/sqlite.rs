use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use rusqlite_migration::{Migrations, M};
use url::Url;

use crate::app::{BridgeError, Result};
use crate::domain::{
    Entry, ExtractionConfig, FeedItem, FetchMode, Profile, ProfileStatus, StatusUpdate,
};
use crate::store::Store;

const TOKEN_LENGTH: usize = 24;

const PROFILE_COLUMNS: &str = "p.id, p.token, p.feed_title, p.source_url, p.item_selector,
    p.title_selector, p.link_selector, p.summary_selector, p.max_items,
    p.refresh_interval_minutes, p.fetch_mode, p.include_filter_rules, p.exclude_filter_rules,
    p.active, p.status, p.last_error, p.last_refreshed_at, p.refresh_anchor_at,
    p.created_at, p.updated_at,
    (SELECT COUNT(*) FROM feed_items i WHERE i.profile_id = p.id)";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        migrations
            .to_latest(&mut conn)
            .map_err(|e| BridgeError::Migration(e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            BridgeError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    fn query_profile(&self, filter: &str, value: &dyn rusqlite::ToSql) -> Result<Option<Profile>> {
        let conn = self.conn()?;
        let profile = conn
            .query_row(
                &format!("SELECT {} FROM profiles p WHERE {}", PROFILE_COLUMNS, filter),
                [value],
                row_to_profile,
            )
            .optional()?;
        Ok(profile)
    }

    fn query_profiles(&self, filter: &str) -> Result<Vec<Profile>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM profiles p {} ORDER BY p.created_at DESC, p.id DESC",
            PROFILE_COLUMNS, filter
        ))?;
        let profiles = stmt
            .query_map([], row_to_profile)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(profiles)
    }

    fn require_profile(&self, id: i64) -> Result<Profile> {
        self.get_profile(id)?
            .ok_or_else(|| BridgeError::ProfileNotFound(id.to_string()))
    }
}

impl Store for SqliteStore {
    fn create_profile(&self, config: &ExtractionConfig, now: DateTime<Utc>) -> Result<Profile> {
        let id = {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO profiles (token, feed_title, source_url, item_selector, title_selector,
                    link_selector, summary_selector, max_items, refresh_interval_minutes, fetch_mode,
                    include_filter_rules, exclude_filter_rules, active, status, last_error,
                    created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 1, 'idle', '', ?13, ?13)",
                params![
                    generate_token(),
                    config.feed_title,
                    config.source_url.as_str(),
                    config.item_selector,
                    config.title_selector,
                    config.link_selector,
                    config.summary_selector,
                    config.max_items as i64,
                    config.refresh_interval_minutes,
                    config.fetch_mode.as_str(),
                    config.include_filter_rules,
                    config.exclude_filter_rules,
                    timestamp(now),
                ],
            )?;
            conn.last_insert_rowid()
        };

        self.require_profile(id)
    }

    fn update_profile(&self, id: i64, config: &ExtractionConfig, now: DateTime<Utc>) -> Result<Profile> {
        let changed = self.conn()?.execute(
            "UPDATE profiles SET feed_title = ?1, source_url = ?2, item_selector = ?3,
                title_selector = ?4, link_selector = ?5, summary_selector = ?6, max_items = ?7,
                refresh_interval_minutes = ?8, fetch_mode = ?9, include_filter_rules = ?10,
                exclude_filter_rules = ?11, last_error = '', updated_at = ?12,
                status = CASE WHEN active = 0 THEN 'disabled' ELSE 'idle' END
             WHERE id = ?13",
            params![
                config.feed_title,
                config.source_url.as_str(),
                config.item_selector,
                config.title_selector,
                config.link_selector,
                config.summary_selector,
                config.max_items as i64,
                config.refresh_interval_minutes,
                config.fetch_mode.as_str(),
                config.include_filter_rules,
                config.exclude_filter_rules,
                timestamp(now),
                id,
            ],
        )?;
        if changed == 0 {
            return Err(BridgeError::ProfileNotFound(id.to_string()));
        }

        self.require_profile(id)
    }

    fn get_profile(&self, id: i64) -> Result<Option<Profile>> {
        self.query_profile("p.id = ?1", &id)
    }

    fn get_profile_by_token(&self, token: &str) -> Result<Option<Profile>> {
        self.query_profile("p.token = ?1", &token)
    }

    fn list_profiles(&self) -> Result<Vec<Profile>> {
        self.query_profiles("")
    }

    fn list_active_profiles(&self) -> Result<Vec<Profile>> {
        self.query_profiles("WHERE p.active = 1")
    }

    fn delete_profile(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM profiles WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    fn update_status(&self, id: i64, update: &StatusUpdate) -> Result<()> {
        let conn = self.conn()?;
        apply_status(&conn, id, update)
    }

    fn upsert_items(&self, profile_id: i64, entries: &[Entry], now: DateTime<Utc>) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let count = upsert_in(&tx, profile_id, entries, now)?;
        tx.commit()?;
        Ok(count)
    }

    fn commit_refresh(&self, profile_id: i64, entries: &[Entry], update: &StatusUpdate) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let count = upsert_in(&tx, profile_id, entries, update.updated_at)?;
        apply_status(&tx, profile_id, update)?;
        tx.commit()?;
        Ok(count)
    }

    fn purge_items(&self, profile_id: i64, now: DateTime<Utc>) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM feed_items WHERE profile_id = ?1",
            params![profile_id],
        )?;
        apply_status(&tx, profile_id, &StatusUpdate::reset(now))?;
        tx.commit()?;
        Ok(removed)
    }

    fn list_items(&self, profile_id: i64, limit: usize) -> Result<Vec<FeedItem>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, profile_id, title, link, summary, discovered_at, updated_at
             FROM feed_items WHERE profile_id = ?1
             ORDER BY discovered_at DESC, rowid ASC
             LIMIT ?2",
        )?;

        let items = stmt
            .query_map(params![profile_id, limit as i64], |row| {
                Ok(FeedItem {
                    id: row.get(0)?,
                    profile_id: row.get(1)?,
                    title: row.get(2)?,
                    link: row.get(3)?,
                    summary: row.get(4)?,
                    discovered_at: required_datetime(row, 5)?,
                    updated_at: required_datetime(row, 6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(items)
    }
}

fn upsert_in(tx: &Transaction<'_>, profile_id: i64, entries: &[Entry], now: DateTime<Utc>) -> Result<usize> {
    let token: String = tx
        .query_row(
            "SELECT token FROM profiles WHERE id = ?1",
            params![profile_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| BridgeError::ProfileNotFound(profile_id.to_string()))?;

    let mut stmt = tx.prepare_cached(
        "INSERT INTO feed_items (id, profile_id, title, link, summary, discovered_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT (profile_id, link) DO UPDATE SET
            title = excluded.title,
            summary = excluded.summary,
            updated_at = excluded.updated_at",
    )?;

    let mut count = 0;
    for entry in entries {
        count += stmt.execute(params![
            entry.storage_id(&token),
            profile_id,
            entry.title,
            entry.link,
            entry.summary,
            timestamp(entry.discovered_at),
            timestamp(now),
        ])?;
    }
    Ok(count)
}

fn apply_status(conn: &Connection, id: i64, update: &StatusUpdate) -> Result<()> {
    let changed = conn.execute(
        "UPDATE profiles SET
            status = CASE WHEN ?1 = 'idle' AND COALESCE(?3, active) = 0 THEN 'disabled' ELSE ?1 END,
            last_error = ?2,
            active = COALESCE(?3, active),
            last_refreshed_at = COALESCE(?4, last_refreshed_at),
            refresh_anchor_at = COALESCE(?5, refresh_anchor_at),
            updated_at = ?6
         WHERE id = ?7",
        params![
            update.status.as_str(),
            update.last_error,
            update.active,
            update.last_refreshed_at.map(timestamp),
            update.refresh_anchor_at.map(timestamp),
            timestamp(update.updated_at),
            id,
        ],
    )?;
    if changed == 0 {
        return Err(BridgeError::ProfileNotFound(id.to_string()));
    }
    Ok(())
}

fn row_to_profile(row: &Row<'_>) -> rusqlite::Result<Profile> {
    let source_url: String = row.get(3)?;
    let source_url = Url::parse(&source_url).map_err(|e| conversion_error(3, e))?;
    let fetch_mode = row
        .get::<_, String>(10)?
        .parse::<FetchMode>()
        .map_err(|e| conversion_error(10, e))?;
    let status = row
        .get::<_, String>(14)?
        .parse::<ProfileStatus>()
        .map_err(|e| conversion_error(14, e))?;

    Ok(Profile {
        id: row.get(0)?,
        token: row.get(1)?,
        config: ExtractionConfig {
            feed_title: row.get(2)?,
            source_url,
            item_selector: row.get(4)?,
            title_selector: row.get(5)?,
            link_selector: row.get(6)?,
            summary_selector: row.get(7)?,
            max_items: row.get::<_, i64>(8)? as usize,
            refresh_interval_minutes: row.get(9)?,
            fetch_mode,
            include_filter_rules: row.get(11)?,
            exclude_filter_rules: row.get(12)?,
        },
        active: row.get(13)?,
        status,
        last_error: row.get(15)?,
        last_refreshed_at: optional_datetime(row, 16)?,
        refresh_anchor_at: optional_datetime(row, 17)?,
        created_at: optional_datetime(row, 18)?,
        updated_at: optional_datetime(row, 19)?,
        item_count: row.get::<_, i64>(20)? as usize,
    })
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Fixed-width RFC 3339 so stored timestamps sort as text.
fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| s.parse::<DateTime<Utc>>().ok())
}

fn optional_datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    Ok(row
        .get::<_, Option<String>>(idx)?
        .filter(|s| !s.is_empty())
        .and_then(|s| parse_datetime(&s)))
}

fn required_datetime(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_datetime(&raw).ok_or_else(|| {
        conversion_error(
            idx,
            BridgeError::Other(format!("Invalid timestamp: {}", raw)),
        )
    })
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RawExtractionConfig;
    use chrono::Duration;

    fn config(title: &str) -> ExtractionConfig {
        ExtractionConfig::from_raw(&RawExtractionConfig {
            feed_title: title.to_string(),
            source_url: "https://example.com/forums".to_string(),
            summary_selector: ".excerpt".to_string(),
            include_filter_rules: "premium".to_string(),
            ..RawExtractionConfig::default()
        })
        .unwrap()
    }

    fn entry(n: u32, now: DateTime<Utc>) -> Entry {
        Entry::new(
            format!("Topic {}", n),
            format!("https://example.com/t/{}", n),
            now,
        )
    }

    #[test]
    fn test_create_and_get_profile() {
        let store = SqliteStore::in_memory().unwrap();
        let now = Utc::now();
        let created = store.create_profile(&config("Forum"), now).unwrap();

        assert_eq!(created.token.len(), TOKEN_LENGTH);
        assert!(created.token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(created.active);
        assert_eq!(created.status, ProfileStatus::Idle);
        assert_eq!(created.config, config("Forum"));
        assert!(created.last_refreshed_at.is_none());
        assert!(created.refresh_anchor_at.is_none());
        assert_eq!(created.created_at.map(timestamp), Some(timestamp(now)));

        let by_token = store.get_profile_by_token(&created.token).unwrap().unwrap();
        assert_eq!(by_token.id, created.id);
        assert!(store.get_profile(created.id + 1).unwrap().is_none());
    }

    #[test]
    fn test_list_profiles_newest_first_with_counts() {
        let store = SqliteStore::in_memory().unwrap();
        let now = Utc::now();
        let older = store.create_profile(&config("Older"), now - Duration::minutes(5)).unwrap();
        let newer = store.create_profile(&config("Newer"), now).unwrap();
        store.upsert_items(older.id, &[entry(1, now), entry(2, now)], now).unwrap();

        let profiles = store.list_profiles().unwrap();
        let ids: Vec<i64> = profiles.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
        assert_eq!(profiles[1].item_count, 2);
        assert_eq!(profiles[0].item_count, 0);
    }

    #[test]
    fn test_upsert_same_link_updates_instead_of_duplicating() {
        let store = SqliteStore::in_memory().unwrap();
        let first = Utc::now() - Duration::hours(1);
        let second = Utc::now();
        let profile = store.create_profile(&config("Forum"), first).unwrap();

        store.upsert_items(profile.id, &[entry(1, first)], first).unwrap();
        let renamed = Entry::new("Topic 1 (edited)", "https://example.com/t/1", second)
            .with_summary("now with summary");
        store.upsert_items(profile.id, &[renamed], second).unwrap();

        let items = store.list_items(profile.id, 10).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Topic 1 (edited)");
        assert_eq!(items[0].summary, "now with summary");
        assert_eq!(timestamp(items[0].discovered_at), timestamp(first));
        assert_eq!(items[0].id, entry(1, first).storage_id(&profile.token));
    }

    #[test]
    fn test_list_items_newest_batch_first_in_document_order() {
        let store = SqliteStore::in_memory().unwrap();
        let earlier = Utc::now() - Duration::hours(1);
        let later = Utc::now();
        let profile = store.create_profile(&config("Forum"), earlier).unwrap();

        store.upsert_items(profile.id, &[entry(1, earlier), entry(2, earlier)], earlier).unwrap();
        store.upsert_items(profile.id, &[entry(9, later), entry(3, later)], later).unwrap();

        let links: Vec<String> = store
            .list_items(profile.id, 3)
            .unwrap()
            .into_iter()
            .map(|i| i.link)
            .collect();
        assert_eq!(
            links,
            vec![
                "https://example.com/t/9",
                "https://example.com/t/3",
                "https://example.com/t/1",
            ]
        );
    }

    #[test]
    fn test_commit_refresh_records_success() {
        let store = SqliteStore::in_memory().unwrap();
        let now = Utc::now();
        let profile = store.create_profile(&config("Forum"), now).unwrap();

        let count = store
            .commit_refresh(profile.id, &[entry(1, now)], &StatusUpdate::succeeded(now))
            .unwrap();
        assert_eq!(count, 1);

        let stored = store.get_profile(profile.id).unwrap().unwrap();
        assert_eq!(stored.status, ProfileStatus::Ok);
        assert_eq!(stored.item_count, 1);
        assert_eq!(stored.last_refreshed_at.map(timestamp), Some(timestamp(now)));
        assert_eq!(stored.refresh_anchor_at.map(timestamp), Some(timestamp(now)));
    }

    #[test]
    fn test_failed_status_leaves_items_untouched() {
        let store = SqliteStore::in_memory().unwrap();
        let now = Utc::now();
        let profile = store.create_profile(&config("Forum"), now).unwrap();
        store.commit_refresh(profile.id, &[entry(1, now)], &StatusUpdate::succeeded(now)).unwrap();

        store
            .update_status(profile.id, &StatusUpdate::failed("Upstream HTTP error: 500", now))
            .unwrap();

        let stored = store.get_profile(profile.id).unwrap().unwrap();
        assert_eq!(stored.status, ProfileStatus::Error);
        assert_eq!(stored.last_error, "Upstream HTTP error: 500");
        assert_eq!(store.list_items(profile.id, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_disable_keeps_timestamps() {
        let store = SqliteStore::in_memory().unwrap();
        let now = Utc::now();
        let profile = store.create_profile(&config("Forum"), now).unwrap();
        store.update_status(profile.id, &StatusUpdate::succeeded(now)).unwrap();

        let later = now + Duration::minutes(3);
        store.update_status(profile.id, &StatusUpdate::disabled(later)).unwrap();

        let stored = store.get_profile(profile.id).unwrap().unwrap();
        assert!(!stored.active);
        assert_eq!(stored.status, ProfileStatus::Disabled);
        assert_eq!(stored.last_refreshed_at.map(timestamp), Some(timestamp(now)));
        assert!(store.list_active_profiles().unwrap().is_empty());
    }

    #[test]
    fn test_update_profile_resets_status() {
        let store = SqliteStore::in_memory().unwrap();
        let now = Utc::now();
        let profile = store.create_profile(&config("Forum"), now).unwrap();
        store.update_status(profile.id, &StatusUpdate::failed("boom", now)).unwrap();

        let updated = store.update_profile(profile.id, &config("Renamed"), now).unwrap();
        assert_eq!(updated.config.feed_title, "Renamed");
        assert_eq!(updated.status, ProfileStatus::Idle);
        assert_eq!(updated.last_error, "");
        assert_eq!(updated.token, profile.token);

        assert!(matches!(
            store.update_profile(profile.id + 100, &config("Nope"), now),
            Err(BridgeError::ProfileNotFound(_))
        ));
    }

    #[test]
    fn test_purge_items() {
        let store = SqliteStore::in_memory().unwrap();
        let now = Utc::now();
        let profile = store.create_profile(&config("Forum"), now).unwrap();
        store.commit_refresh(profile.id, &[entry(1, now), entry(2, now)], &StatusUpdate::succeeded(now)).unwrap();

        assert_eq!(store.purge_items(profile.id, now).unwrap(), 2);
        let stored = store.get_profile(profile.id).unwrap().unwrap();
        assert_eq!(stored.item_count, 0);
        assert_eq!(stored.status, ProfileStatus::Idle);
    }

    #[test]
    fn test_edit_and_purge_keep_disabled_profiles_disabled() {
        let store = SqliteStore::in_memory().unwrap();
        let now = Utc::now();
        let profile = store.create_profile(&config("Forum"), now).unwrap();
        store.upsert_items(profile.id, &[entry(1, now)], now).unwrap();
        store.update_status(profile.id, &StatusUpdate::disabled(now)).unwrap();

        let edited = store.update_profile(profile.id, &config("Renamed"), now).unwrap();
        assert!(!edited.active);
        assert_eq!(edited.status, ProfileStatus::Disabled);

        store.purge_items(profile.id, now).unwrap();
        let purged = store.get_profile(profile.id).unwrap().unwrap();
        assert!(!purged.active);
        assert_eq!(purged.status, ProfileStatus::Disabled);

        store.update_status(profile.id, &StatusUpdate::enabled(now)).unwrap();
        let enabled = store.get_profile(profile.id).unwrap().unwrap();
        assert_eq!(enabled.status, ProfileStatus::Idle);
    }

    #[test]
    fn test_delete_cascades_to_items() {
        let store = SqliteStore::in_memory().unwrap();
        let now = Utc::now();
        let profile = store.create_profile(&config("Forum"), now).unwrap();
        store.upsert_items(profile.id, &[entry(1, now)], now).unwrap();

        assert!(store.delete_profile(profile.id).unwrap());
        assert!(!store.delete_profile(profile.id).unwrap());
        assert!(store.list_items(profile.id, 10).unwrap().is_empty());
    }

    #[test]
    fn test_commit_refresh_for_missing_profile_writes_nothing() {
        let store = SqliteStore::in_memory().unwrap();
        let now = Utc::now();
        let err = store
            .commit_refresh(42, &[entry(1, now)], &StatusUpdate::succeeded(now))
            .unwrap_err();
        assert!(matches!(err, BridgeError::ProfileNotFound(_)));
    }
}
