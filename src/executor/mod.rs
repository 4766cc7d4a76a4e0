//! One fetch-parse-reconcile-persist cycle for a single feed.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::app::NexaError;
use crate::domain::FeedUpdate;
use crate::fetcher::{FetchError, Fetcher};
use crate::parser::{FeedParser, ParseError};
use crate::reconciler::Reconciler;
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Fetch,
    Parse,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::Fetch => "fetch",
            Stage::Parse => "parse",
            Stage::Persist => "persist",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum FetchFailure {
    #[error("failed to load feed {feed_id}: {source}")]
    Load { feed_id: String, source: NexaError },

    #[error("failed to fetch {link}: {source}")]
    Fetch {
        feed_id: String,
        link: String,
        source: FetchError,
    },

    #[error("failed to parse feed {feed_id}: {source}")]
    Parse { feed_id: String, source: ParseError },

    #[error("failed to persist feed {feed_id}: {source}")]
    Persist { feed_id: String, source: NexaError },
}

impl FetchFailure {
    pub fn stage(&self) -> Stage {
        match self {
            FetchFailure::Load { .. } => Stage::Load,
            FetchFailure::Fetch { .. } => Stage::Fetch,
            FetchFailure::Parse { .. } => Stage::Parse,
            FetchFailure::Persist { .. } => Stage::Persist,
        }
    }

    pub fn feed_id(&self) -> &str {
        match self {
            FetchFailure::Load { feed_id, .. }
            | FetchFailure::Fetch { feed_id, .. }
            | FetchFailure::Parse { feed_id, .. }
            | FetchFailure::Persist { feed_id, .. } => feed_id,
        }
    }
}

/// Outcome of a successful cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchReport {
    /// Entries present in the upstream document.
    pub entries: usize,
    /// Items that were not stored before this cycle.
    pub new_items: usize,
}

pub struct FetchExecutor {
    store: Arc<dyn Store + Send + Sync>,
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    parser: Arc<dyn FeedParser + Send + Sync>,
    reconciler: Reconciler,
}

impl FetchExecutor {
    pub fn new(
        store: Arc<dyn Store + Send + Sync>,
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        parser: Arc<dyn FeedParser + Send + Sync>,
        reconciler: Reconciler,
    ) -> Self {
        Self {
            store,
            fetcher,
            parser,
            reconciler,
        }
    }

    pub async fn run(&self, feed_id: &str) -> Result<FetchReport, FetchFailure> {
        let feed = match self.store.get_feed(feed_id) {
            Ok(Some(feed)) => feed,
            Ok(None) => {
                return Err(FetchFailure::Load {
                    feed_id: feed_id.to_string(),
                    source: NexaError::FeedNotFound(feed_id.to_string()),
                })
            }
            Err(source) => {
                return Err(FetchFailure::Load {
                    feed_id: feed_id.to_string(),
                    source,
                })
            }
        };

        debug!(feed_id, link = %feed.link, "Fetching feed");
        let body = self
            .fetcher
            .fetch(&feed.link)
            .await
            .map_err(|source| FetchFailure::Fetch {
                feed_id: feed_id.to_string(),
                link: feed.link.clone(),
                source,
            })?;

        let parsed = self
            .parser
            .parse(&body)
            .map_err(|source| FetchFailure::Parse {
                feed_id: feed_id.to_string(),
                source,
            })?;

        let reconciled = self.reconciler.reconcile(&feed, parsed);
        let entries = reconciled.items.len();

        let persist = |source| FetchFailure::Persist {
            feed_id: feed_id.to_string(),
            source,
        };
        let new_items = self
            .store
            .insert_items_if_absent(&reconciled.items)
            .map_err(persist)?;
        if !self
            .store
            .update_feed(feed_id, &FeedUpdate::from(&reconciled.feed))
            .map_err(persist)?
        {
            debug!(feed_id, "Feed removed while fetching");
        }

        info!(
            feed_id,
            link = %feed.link,
            entries,
            new_items,
            "Fetched {}",
            reconciled.feed.display_title()
        );

        Ok(FetchReport { entries, new_items })
    }
}
