pub mod feed;
pub mod identity;
pub mod item;

pub use feed::{Feed, FeedSettings, FeedUpdate, FeedWithUnreadCount, TagCount};
pub use item::{Item, ItemFilter, ItemStateUpdate};
