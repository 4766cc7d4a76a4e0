pub mod sqlite;

use crate::app::Result;
use crate::domain::{
    Feed, FeedSettings, FeedUpdate, FeedWithUnreadCount, Item, ItemFilter, ItemStateUpdate, TagCount,
};

pub use sqlite::SqliteStore;

/// Persistence port for feeds, tags and items.
///
/// Multi-row operations (feed save with its tags, feed delete with its items,
/// item batches) are atomic.
pub trait Store {
    // Feed operations
    fn get_feed(&self, id: &str) -> Result<Option<Feed>>;
    /// Upsert by id, replacing the feed's tag set.
    fn save_feed(&self, feed: &Feed) -> Result<()>;
    /// Writes only the user-owned columns and the tag set. Returns false if
    /// the feed is gone.
    fn edit_feed(&self, id: &str, settings: &FeedSettings) -> Result<bool>;
    /// Writes only the fetch-owned columns. Returns false if the feed is gone.
    fn update_feed(&self, id: &str, update: &FeedUpdate) -> Result<bool>;
    /// Removes the feed together with its items and tags.
    fn delete_feed(&self, id: &str) -> Result<()>;
    /// Feeds carrying any of `tags` (all feeds when empty), with unread counts.
    fn filter_feeds(&self, tags: &[String]) -> Result<Vec<FeedWithUnreadCount>>;
    fn list_tags(&self) -> Result<Vec<TagCount>>;

    // Item operations
    /// Inserts items whose id is not stored yet; existing rows are left
    /// untouched. Returns the number of new rows.
    fn insert_items_if_absent(&self, items: &[Item]) -> Result<usize>;
    fn get_item(&self, id: &str) -> Result<Option<Item>>;
    fn filter_items(&self, filter: &ItemFilter) -> Result<Vec<Item>>;
    fn count_items(&self, filter: &ItemFilter) -> Result<i64>;
    /// Returns false if no such item exists.
    fn update_item(&self, id: &str, update: &ItemStateUpdate) -> Result<bool>;
}
