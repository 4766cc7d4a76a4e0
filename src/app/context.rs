use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::app::error::{NexaError, Result};
use crate::config::Config;
use crate::executor::FetchExecutor;
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::parser::{FeedParser, FeedRsParser};
use crate::reconciler::Reconciler;
use crate::scheduler::Scheduler;
use crate::service::FeedService;
use crate::store::SqliteStore;

pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub executor: Arc<FetchExecutor>,
}

impl AppContext {
    /// Opens the database at `db_path`, or the configured path, or the
    /// default under the user's data directory.
    pub fn new(config: Config, db_path: Option<PathBuf>) -> Result<Self> {
        let db_path = match db_path.or_else(|| config.database.path.clone()) {
            Some(p) => p,
            None => Self::default_db_path()?,
        };

        let store = Arc::new(SqliteStore::new(&db_path)?);
        Self::with_store(config, store)
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        Self::with_store(config, store)
    }

    fn with_store(config: Config, store: Arc<SqliteStore>) -> Result<Self> {
        let fetcher: Arc<dyn Fetcher + Send + Sync> = Arc::new(HttpFetcher::with_options(
            Duration::from_secs(config.fetch.timeout_secs),
            &config.fetch.user_agent,
        )?);
        let parser: Arc<dyn FeedParser + Send + Sync> = Arc::new(FeedRsParser::new());
        let executor = Arc::new(FetchExecutor::new(
            store.clone(),
            fetcher,
            parser,
            Reconciler::new(config.summary.max_chars),
        ));

        Ok(Self {
            config,
            store,
            executor,
        })
    }

    /// Write path. Without a scheduler, fetches run inline.
    pub fn service(&self, scheduler: Option<Arc<Scheduler>>) -> FeedService {
        FeedService::new(self.store.clone(), self.executor.clone(), scheduler)
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| NexaError::Config("Could not find data directory".into()))?;
        let nexa_dir = data_dir.join("nexa");
        std::fs::create_dir_all(&nexa_dir)?;
        Ok(nexa_dir.join("nexa.db"))
    }
}
