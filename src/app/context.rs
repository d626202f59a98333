use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::{BridgeError, Result};
use crate::config::AppConfig;
use crate::fetcher::{HtmlFetcher, SourceFetcher};
use crate::scheduler::{Refresher, Scheduler};
use crate::store::sqlite::SqliteStore;

pub struct AppContext {
    pub config: AppConfig,
    pub store: Arc<SqliteStore>,
    pub fetcher: Arc<SourceFetcher>,
    pub refresher: Arc<Refresher<SqliteStore>>,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Result<Self> {
        let db_path = match &config.database_path {
            Some(p) => p.clone(),
            None => Self::default_db_path()?,
        };
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let store = Arc::new(SqliteStore::new(&db_path)?);
        Self::with_store(config, store)
    }

    pub fn in_memory(config: AppConfig) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        Self::with_store(config, store)
    }

    fn with_store(config: AppConfig, store: Arc<SqliteStore>) -> Result<Self> {
        let fetcher = Arc::new(SourceFetcher::new(&config.fetch, &config.browser)?);
        let shared: Arc<dyn HtmlFetcher> = fetcher.clone();
        let refresher = Arc::new(Refresher::new(
            store.clone(),
            shared,
            config.scheduler.extraction_timeout(),
        ));

        Ok(Self {
            config,
            store,
            fetcher,
            refresher,
        })
    }

    /// Start the background scheduler with the configured cadence.
    pub fn start_scheduler(&self) -> Scheduler {
        Scheduler::start(self.refresher.clone(), self.config.scheduler.tick())
    }

    /// Release the shared browser, if one was launched.
    pub async fn shutdown(&self) {
        self.fetcher.shutdown().await;
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| BridgeError::Config("Could not find data directory".into()))?;
        Ok(data_dir.join("sitebridge").join("sitebridge.db"))
    }
}
