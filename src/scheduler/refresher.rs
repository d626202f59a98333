use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::app::{BridgeError, Result};
use crate::domain::{FeedItem, Profile, StatusUpdate};
use crate::fetcher::{FetchError, HtmlFetcher};
use crate::pipeline::extract_feed_entries;
use crate::progress::TracingProgress;
use crate::scheduler::due::should_refresh;
use crate::store::Store;

/// Outcome counts of one pass over due profiles.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSummary {
    pub refreshed: usize,
    pub failed: usize,
    /// Due but already being refreshed elsewhere.
    pub skipped: usize,
}

impl RefreshSummary {
    pub fn attempted(&self) -> usize {
        self.refreshed + self.failed + self.skipped
    }
}

/// A profile together with the items it publishes.
#[derive(Debug, Clone)]
pub struct PublishedFeed {
    pub profile: Profile,
    pub items: Vec<FeedItem>,
}

/// Runs refreshes, allowing at most one at a time per profile.
pub struct Refresher<S: Store + Send + Sync + 'static> {
    store: Arc<S>,
    fetcher: Arc<dyn HtmlFetcher>,
    extraction_timeout: Duration,
    guards: StdMutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl<S: Store + Send + Sync + 'static> Refresher<S> {
    pub fn new(store: Arc<S>, fetcher: Arc<dyn HtmlFetcher>, extraction_timeout: Duration) -> Self {
        Self {
            store,
            fetcher,
            extraction_timeout,
            guards: StdMutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn fetcher(&self) -> &Arc<dyn HtmlFetcher> {
        &self.fetcher
    }

    /// Refresh one profile now, waiting for any refresh already running on it.
    ///
    /// Extraction failures are recorded on the profile and returned.
    pub async fn refresh_profile(&self, id: i64) -> Result<usize> {
        let guard = self.guard(id);
        let _held = guard.lock().await;
        self.refresh_locked(id).await
    }

    /// Refresh every due active profile, continuing past failures.
    pub async fn refresh_due_profiles(&self, now: DateTime<Utc>) -> Result<RefreshSummary> {
        let mut summary = RefreshSummary::default();

        for profile in self.store.list_active_profiles()? {
            if !should_refresh(&profile, now) {
                continue;
            }

            let guard = self.guard(profile.id);
            let Ok(_held) = guard.try_lock() else {
                debug!(profile_id = profile.id, "Refresh already in progress, skipping");
                summary.skipped += 1;
                continue;
            };

            match self.refresh_locked(profile.id).await {
                Ok(_) => summary.refreshed += 1,
                Err(e) if e.is_refresh_failure() => summary.failed += 1,
                Err(e) => {
                    warn!(profile_id = profile.id, "Refresh could not run: {}", e);
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Load a published feed, refreshing it first when due.
    ///
    /// Unknown and disabled profiles yield `None`. A failed refresh is
    /// recorded on the profile and the stored items are served anyway.
    pub async fn load_feed(&self, token: &str) -> Result<Option<PublishedFeed>> {
        let Some(profile) = self.store.get_profile_by_token(token)? else {
            return Ok(None);
        };
        if !profile.active {
            return Ok(None);
        }

        if should_refresh(&profile, Utc::now()) {
            let guard = self.guard(profile.id);
            let _held = guard.lock().await;
            // Another caller may have refreshed while we waited.
            let due = self
                .store
                .get_profile(profile.id)?
                .is_some_and(|p| should_refresh(&p, Utc::now()));
            if due {
                if let Err(e) = self.refresh_locked(profile.id).await {
                    debug!(profile_id = profile.id, "Serving stored items after failed refresh: {}", e);
                }
            }
        }

        let Some(profile) = self.store.get_profile(profile.id)? else {
            return Ok(None);
        };
        let items = self.store.list_items(profile.id, profile.config.max_items)?;
        Ok(Some(PublishedFeed { profile, items }))
    }

    /// Enable or disable a profile.
    pub fn set_active(&self, id: i64, active: bool) -> Result<Profile> {
        let now = Utc::now();
        let update = if active {
            StatusUpdate::enabled(now)
        } else {
            StatusUpdate::disabled(now)
        };
        self.store.update_status(id, &update)?;
        info!(profile_id = id, active, "Profile activity changed");
        self.store
            .get_profile(id)?
            .ok_or_else(|| BridgeError::ProfileNotFound(id.to_string()))
    }

    fn guard(&self, id: i64) -> Arc<Mutex<()>> {
        let mut guards = self.guards.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(guards.entry(id).or_default())
    }

    async fn refresh_locked(&self, id: i64) -> Result<usize> {
        let profile = self
            .store
            .get_profile(id)?
            .ok_or_else(|| BridgeError::ProfileNotFound(id.to_string()))?;
        if !profile.active {
            return Err(BridgeError::ProfileDisabled);
        }

        let outcome = tokio::time::timeout(
            self.extraction_timeout,
            extract_feed_entries(&profile.config, self.fetcher.as_ref(), &TracingProgress),
        )
        .await
        .unwrap_or_else(|_| Err(FetchError::Timeout(self.extraction_timeout).into()));

        let now = Utc::now();
        match outcome {
            Ok(entries) => {
                let stored = self
                    .store
                    .commit_refresh(id, &entries, &StatusUpdate::succeeded(now))?;
                info!(profile_id = id, entries = stored, "Profile refreshed");
                Ok(stored)
            }
            Err(e) => {
                warn!(profile_id = id, url = %profile.config.source_url, "Refresh failed: {}", e);
                self.store
                    .update_status(id, &StatusUpdate::failed(e.to_string(), now))?;
                Err(e)
            }
        }
    }
}
