//! Create/edit/delete/refresh operations over feeds and items.
//!
//! Every write to a feed's subscription-relevant fields goes through here so
//! the scheduler registry follows the stored `suspended` flag and schedule.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{error, info, warn};
use url::Url;

use crate::app::{NexaError, Result};
use crate::domain::identity;
use crate::domain::{Feed, FeedSettings, FeedWithUnreadCount, Item, ItemFilter, ItemStateUpdate, TagCount};
use crate::executor::{FetchExecutor, FetchReport};
use crate::scheduler::{Recurrence, Scheduler};
use crate::store::Store;

pub const DEFAULT_SCHEDULE: &str = "0 */30 * * * *";

/// Input for creating a feed.
#[derive(Debug, Clone)]
pub struct NewFeed {
    pub link: String,
    pub description: String,
    pub schedule: String,
    pub suspended: bool,
    pub tags: BTreeSet<String>,
}

impl NewFeed {
    pub fn new(link: impl Into<String>) -> Self {
        Self {
            link: link.into(),
            description: String::new(),
            schedule: DEFAULT_SCHEDULE.to_string(),
            suspended: false,
            tags: BTreeSet::new(),
        }
    }
}

/// Editable feed fields. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default)]
pub struct FeedEdit {
    pub link: Option<String>,
    pub description: Option<String>,
    pub schedule: Option<String>,
    pub suspended: Option<bool>,
    pub tags: Option<BTreeSet<String>>,
}

/// Page of items plus the unpaged total.
#[derive(Debug, Clone)]
pub struct ItemPage {
    pub items: Vec<Item>,
    pub total: i64,
}

pub struct FeedService {
    store: Arc<dyn Store + Send + Sync>,
    executor: Arc<FetchExecutor>,
    /// Absent in one-shot mode: fetches then run inline.
    scheduler: Option<Arc<Scheduler>>,
}

pub fn validate_link(link: &str) -> Result<()> {
    let url = Url::parse(link.trim())
        .map_err(|e| NexaError::Validation(format!("invalid feed url {:?}: {}", link, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(NexaError::Validation(format!(
            "invalid feed url scheme {:?}",
            other
        ))),
    }
}

pub fn validate_schedule(schedule: &str) -> Result<()> {
    Recurrence::parse(schedule).map(|_| ())
}

impl FeedService {
    pub fn new(
        store: Arc<dyn Store + Send + Sync>,
        executor: Arc<FetchExecutor>,
        scheduler: Option<Arc<Scheduler>>,
    ) -> Self {
        Self {
            store,
            executor,
            scheduler,
        }
    }

    pub async fn add_feed(&self, request: NewFeed) -> Result<Feed> {
        validate_link(&request.link)?;
        validate_schedule(&request.schedule)?;

        let link = request.link.trim().to_string();
        let id = identity::feed_id(&link)?;
        if self.store.get_feed(&id)?.is_some() {
            return Err(NexaError::Validation(format!("feed already exists: {}", link)));
        }

        let mut feed = Feed::new(id, link, request.schedule.trim().to_string());
        feed.description = request.description;
        feed.suspended = request.suspended;
        feed.tags = request.tags;

        self.store.save_feed(&feed)?;
        info!(feed_id = %feed.id, link = %feed.link, "Feed added");

        if !feed.suspended {
            self.activate(&feed).await;
        }

        Ok(feed)
    }

    pub async fn update_feed(&self, id: &str, edit: FeedEdit) -> Result<Feed> {
        if let Some(link) = &edit.link {
            validate_link(link)?;
        }
        if let Some(schedule) = &edit.schedule {
            validate_schedule(schedule)?;
        }

        let mut feed = self
            .store
            .get_feed(id)?
            .ok_or_else(|| NexaError::FeedNotFound(id.to_string()))?;

        if let Some(link) = edit.link {
            feed.link = link.trim().to_string();
        }
        if let Some(description) = edit.description {
            feed.description = description;
        }
        if let Some(schedule) = edit.schedule {
            feed.schedule = schedule.trim().to_string();
        }
        if let Some(suspended) = edit.suspended {
            feed.suspended = suspended;
        }
        if let Some(tags) = edit.tags {
            feed.tags = tags;
        }

        // A feed deleted since it was loaded stays deleted.
        if !self.store.edit_feed(id, &FeedSettings::from(&feed))? {
            return Err(NexaError::FeedNotFound(id.to_string()));
        }
        let feed = self
            .store
            .get_feed(id)?
            .ok_or_else(|| NexaError::FeedNotFound(id.to_string()))?;
        info!(feed_id = %feed.id, "Feed updated");

        if let Some(scheduler) = &self.scheduler {
            if feed.suspended {
                scheduler.unsubscribe(&feed.id)?;
            } else {
                scheduler.replace(&feed)?;
            }
        }

        Ok(feed)
    }

    pub fn delete_feed(&self, id: &str) -> Result<()> {
        if self.store.get_feed(id)?.is_none() {
            return Err(NexaError::FeedNotFound(id.to_string()));
        }
        self.store.delete_feed(id)?;
        if let Some(scheduler) = &self.scheduler {
            scheduler.unsubscribe(id)?;
        }
        info!(feed_id = id, "Feed deleted");
        Ok(())
    }

    /// On-demand refresh. With a scheduler the fetches are queued; without
    /// one they run inline and failures are logged.
    pub async fn refresh(&self, ids: &[String]) -> Result<()> {
        match &self.scheduler {
            Some(scheduler) => {
                for id in ids {
                    scheduler.fetch_now(id).await?;
                }
            }
            None => {
                let runs = ids.iter().map(|id| self.executor.run(id));
                for result in futures::future::join_all(runs).await {
                    if let Err(e) = result {
                        error!(feed_id = e.feed_id(), stage = %e.stage(), "{}", e);
                    }
                }
            }
        }
        Ok(())
    }

    /// Run one fetch cycle inline and report it to the caller.
    pub async fn fetch(&self, id: &str) -> Result<FetchReport> {
        Ok(self.executor.run(id).await?)
    }

    pub fn list_feeds(&self, tags: &[String]) -> Result<Vec<FeedWithUnreadCount>> {
        self.store.filter_feeds(tags)
    }

    pub fn list_tags(&self) -> Result<Vec<TagCount>> {
        self.store.list_tags()
    }

    pub fn list_items(&self, filter: &ItemFilter) -> Result<ItemPage> {
        let total = self.store.count_items(filter)?;
        let items = self.store.filter_items(filter)?;
        Ok(ItemPage { items, total })
    }

    pub fn get_item(&self, id: &str) -> Result<Item> {
        self.store
            .get_item(id)?
            .ok_or_else(|| NexaError::ItemNotFound(id.to_string()))
    }

    pub fn mark_item(&self, id: &str, update: ItemStateUpdate) -> Result<Item> {
        if !self.store.update_item(id, &update)? {
            return Err(NexaError::ItemNotFound(id.to_string()));
        }
        self.get_item(id)
    }

    async fn activate(&self, feed: &Feed) {
        match &self.scheduler {
            Some(scheduler) => {
                if let Err(e) = scheduler.subscribe(feed) {
                    warn!(feed_id = %feed.id, "Subscribe failed: {}", e);
                }
                if let Err(e) = scheduler.fetch_now(&feed.id).await {
                    warn!(feed_id = %feed.id, "Initial fetch not queued: {}", e);
                }
            }
            None => {
                if let Err(e) = self.executor.run(&feed.id).await {
                    error!(feed_id = %feed.id, stage = %e.stage(), "{}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::executor::Stage;
    use crate::parser::FeedRsParser;
    use crate::reconciler::Reconciler;
    use crate::scheduler::{Dispatcher, Limiter};
    use crate::store::SqliteStore;
    use crate::test_support::{rss_document, MockFetcher};

    const LINK: &str = "https://example.test/rss";

    struct Harness {
        store: Arc<SqliteStore>,
        fetcher: MockFetcher,
        scheduler: Arc<Scheduler>,
        service: FeedService,
    }

    fn harness() -> Harness {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let fetcher = MockFetcher::new();
        fetcher.respond(LINK, Ok(rss_document("Example", &["one", "two"])));

        let executor = Arc::new(FetchExecutor::new(
            store.clone(),
            Arc::new(fetcher.clone()),
            Arc::new(FeedRsParser::new()),
            Reconciler::default(),
        ));
        let (scheduler, rx) = Scheduler::new(64);
        let scheduler = Arc::new(scheduler);
        Dispatcher::new(rx, Limiter::new(4), executor.clone()).spawn();

        let service = FeedService::new(store.clone(), executor, Some(scheduler.clone()));
        Harness {
            store,
            fetcher,
            scheduler,
            service,
        }
    }

    fn one_shot() -> (Arc<SqliteStore>, FeedService) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let fetcher = MockFetcher::new();
        fetcher.respond(LINK, Ok(rss_document("Example", &["one", "two"])));
        let executor = Arc::new(FetchExecutor::new(
            store.clone(),
            Arc::new(fetcher),
            Arc::new(FeedRsParser::new()),
            Reconciler::default(),
        ));
        (store.clone(), FeedService::new(store, executor, None))
    }

    fn new_feed() -> NewFeed {
        NewFeed {
            schedule: "*/30 * * * * *".into(),
            ..NewFeed::new(LINK)
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_fetch_refetch_scenario() {
        let h = harness();
        let feed = h.service.add_feed(new_feed()).await.unwrap();
        settle().await;

        assert_eq!(feed.id, identity::feed_id(LINK).unwrap());
        assert!(h.scheduler.is_subscribed(&feed.id));
        assert_eq!(h.service.list_feeds(&[]).unwrap().len(), 1);

        let page = h.service.list_items(&ItemFilter::default()).unwrap();
        assert_eq!(page.total, 2);
        assert!(page.items.iter().all(|i| !i.read));

        h.service.refresh(&[feed.id.clone()]).await.unwrap();
        settle().await;

        assert!(h.fetcher.calls() >= 2);
        assert_eq!(h.service.list_items(&ItemFilter::default()).unwrap().total, 2);
        assert_eq!(
            h.store.get_feed(&feed.id).unwrap().unwrap().title,
            "Example"
        );
    }

    #[tokio::test]
    async fn test_add_rejects_bad_scheme_and_schedule() {
        let h = harness();

        let err = h
            .service
            .add_feed(NewFeed::new("ftp://example.test/rss"))
            .await
            .unwrap_err();
        assert!(matches!(err, NexaError::Validation(_)));

        let bad_schedule = NewFeed {
            schedule: "*/5 * * * *".into(),
            ..NewFeed::new(LINK)
        };
        let err = h.service.add_feed(bad_schedule).await.unwrap_err();
        assert!(matches!(err, NexaError::InvalidSchedule { .. }));

        assert!(h.service.list_feeds(&[]).unwrap().is_empty());
        assert!(h.scheduler.subscribed().is_empty());
    }

    #[tokio::test]
    async fn test_add_duplicate_link_rejected() {
        let (_store, service) = one_shot();
        service.add_feed(new_feed()).await.unwrap();
        let err = service.add_feed(new_feed()).await.unwrap_err();
        assert!(matches!(err, NexaError::Validation(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_suspended_feed_is_not_subscribed_or_fetched() {
        let h = harness();
        let feed = h
            .service
            .add_feed(NewFeed {
                suspended: true,
                ..new_feed()
            })
            .await
            .unwrap();
        settle().await;

        assert!(!h.scheduler.is_subscribed(&feed.id));
        assert_eq!(h.fetcher.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_suspend_unsubscribes_and_resume_resubscribes() {
        let h = harness();
        let feed = h.service.add_feed(new_feed()).await.unwrap();
        settle().await;
        assert!(h.scheduler.is_subscribed(&feed.id));

        h.service
            .update_feed(
                &feed.id,
                FeedEdit {
                    suspended: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!h.scheduler.is_subscribed(&feed.id));

        let calls = h.fetcher.calls();
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(h.fetcher.calls(), calls);

        h.service
            .update_feed(
                &feed.id,
                FeedEdit {
                    suspended: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(h.scheduler.is_subscribed(&feed.id));
    }

    /// Store whose feed disappears between an edit's load and its write.
    struct DeletedDuringEdit(Arc<SqliteStore>);

    impl Store for DeletedDuringEdit {
        fn get_feed(&self, id: &str) -> Result<Option<Feed>> {
            self.0.get_feed(id)
        }
        fn save_feed(&self, feed: &Feed) -> Result<()> {
            self.0.save_feed(feed)
        }
        fn edit_feed(&self, id: &str, settings: &FeedSettings) -> Result<bool> {
            self.0.delete_feed(id)?;
            self.0.edit_feed(id, settings)
        }
        fn update_feed(&self, id: &str, update: &crate::domain::FeedUpdate) -> Result<bool> {
            self.0.update_feed(id, update)
        }
        fn delete_feed(&self, id: &str) -> Result<()> {
            self.0.delete_feed(id)
        }
        fn filter_feeds(&self, tags: &[String]) -> Result<Vec<FeedWithUnreadCount>> {
            self.0.filter_feeds(tags)
        }
        fn list_tags(&self) -> Result<Vec<TagCount>> {
            self.0.list_tags()
        }
        fn insert_items_if_absent(&self, items: &[Item]) -> Result<usize> {
            self.0.insert_items_if_absent(items)
        }
        fn get_item(&self, id: &str) -> Result<Option<Item>> {
            self.0.get_item(id)
        }
        fn filter_items(&self, filter: &ItemFilter) -> Result<Vec<Item>> {
            self.0.filter_items(filter)
        }
        fn count_items(&self, filter: &ItemFilter) -> Result<i64> {
            self.0.count_items(filter)
        }
        fn update_item(&self, id: &str, update: &ItemStateUpdate) -> Result<bool> {
            self.0.update_item(id, update)
        }
    }

    #[tokio::test]
    async fn test_edit_racing_delete_leaves_feed_deleted() {
        let inner = Arc::new(SqliteStore::in_memory().unwrap());
        let feed = Feed::new("f".into(), LINK.into(), "*/30 * * * * *".into());
        inner.save_feed(&feed).unwrap();

        let executor = Arc::new(FetchExecutor::new(
            inner.clone(),
            Arc::new(MockFetcher::new()),
            Arc::new(FeedRsParser::new()),
            Reconciler::default(),
        ));
        let (scheduler, _queue) = Scheduler::new(8);
        let scheduler = Arc::new(scheduler);
        let service = FeedService::new(
            Arc::new(DeletedDuringEdit(inner.clone())),
            executor,
            Some(scheduler.clone()),
        );

        let err = service
            .update_feed(
                "f",
                FeedEdit {
                    description: Some("edited".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, NexaError::FeedNotFound(_)));
        assert!(inner.get_feed("f").unwrap().is_none());
        assert!(!scheduler.is_subscribed("f"));
    }

    #[tokio::test]
    async fn test_edit_does_not_revert_fetched_title() {
        let (store, service) = one_shot();
        let feed = service.add_feed(new_feed()).await.unwrap();
        store
            .update_feed(
                &feed.id,
                &crate::domain::FeedUpdate {
                    title: "Renamed upstream".into(),
                    last_build_date: None,
                },
            )
            .unwrap();

        let edited = service
            .update_feed(
                &feed.id,
                FeedEdit {
                    description: Some("mine".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(edited.title, "Renamed upstream");
        assert_eq!(edited.description, "mine");
    }

    #[tokio::test]
    async fn test_update_keeps_identity_and_validates() {
        let (store, service) = one_shot();
        let feed = service.add_feed(new_feed()).await.unwrap();

        let tags = BTreeSet::from(["news".to_string()]);
        let updated = service
            .update_feed(
                &feed.id,
                FeedEdit {
                    link: Some("https://example.test/other".into()),
                    tags: Some(tags.clone()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.id, feed.id);
        assert_eq!(store.get_feed(&feed.id).unwrap().unwrap().tags, tags);

        let err = service
            .update_feed(
                &feed.id,
                FeedEdit {
                    schedule: Some("soon".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, NexaError::InvalidSchedule { .. }));

        let err = service
            .update_feed("missing", FeedEdit::default())
            .await
            .unwrap_err();
        assert!(matches!(err, NexaError::FeedNotFound(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_removes_feed_items_and_trigger() {
        let h = harness();
        let feed = h.service.add_feed(new_feed()).await.unwrap();
        settle().await;

        h.service.delete_feed(&feed.id).unwrap();

        assert!(h.store.get_feed(&feed.id).unwrap().is_none());
        assert_eq!(h.service.list_items(&ItemFilter::default()).unwrap().total, 0);
        assert!(!h.scheduler.is_subscribed(&feed.id));
        assert!(matches!(
            h.service.delete_feed(&feed.id),
            Err(NexaError::FeedNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_one_shot_add_fetches_inline() {
        let (store, service) = one_shot();
        let feed = service.add_feed(new_feed()).await.unwrap();

        let page = service.list_items(&ItemFilter::default()).unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(store.get_feed(&feed.id).unwrap().unwrap().title, "Example");

        let report = service.fetch(&feed.id).await.unwrap();
        assert_eq!(report.new_items, 0);
    }

    #[tokio::test]
    async fn test_fetch_reports_failure_stage() {
        let (_store, service) = one_shot();
        let err = service.fetch("missing").await.unwrap_err();
        match err {
            NexaError::Fetch(failure) => assert_eq!(failure.stage(), Stage::Load),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_mark_item() {
        let (_store, service) = one_shot();
        service.add_feed(new_feed()).await.unwrap();
        let item = service.list_items(&ItemFilter::default()).unwrap().items[0].clone();

        let marked = service
            .mark_item(
                &item.id,
                ItemStateUpdate {
                    read: Some(true),
                    starred: Some(true),
                    liked: None,
                },
            )
            .unwrap();
        assert!(marked.read && marked.starred && !marked.liked);

        let unread = ItemFilter {
            unread: Some(true),
            ..Default::default()
        };
        assert_eq!(service.list_items(&unread).unwrap().total, 1);

        assert!(matches!(
            service.mark_item("missing", ItemStateUpdate::default()),
            Err(NexaError::ItemNotFound(_))
        ));
    }
}
