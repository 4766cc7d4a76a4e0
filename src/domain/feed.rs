use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub id: String,
    pub link: String,
    pub title: String,
    pub description: String,
    /// Six-field cron expression (seconds first).
    pub schedule: String,
    pub suspended: bool,
    pub tags: BTreeSet<String>,
    pub last_build_date: Option<DateTime<Utc>>,
}

impl Feed {
    pub fn new(id: String, link: String, schedule: String) -> Self {
        Self {
            id,
            link,
            title: String::new(),
            description: String::new(),
            schedule,
            suspended: false,
            tags: BTreeSet::new(),
            last_build_date: None,
        }
    }

    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.link
        } else {
            &self.title
        }
    }
}

/// The fields a fetch is allowed to write back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedUpdate {
    pub title: String,
    pub last_build_date: Option<DateTime<Utc>>,
}

impl From<&Feed> for FeedUpdate {
    fn from(feed: &Feed) -> Self {
        Self {
            title: feed.title.clone(),
            last_build_date: feed.last_build_date,
        }
    }
}

/// The fields an edit is allowed to write back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedSettings {
    pub link: String,
    pub description: String,
    pub schedule: String,
    pub suspended: bool,
    pub tags: BTreeSet<String>,
}

impl From<&Feed> for FeedSettings {
    fn from(feed: &Feed) -> Self {
        Self {
            link: feed.link.clone(),
            description: feed.description.clone(),
            schedule: feed.schedule.clone(),
            suspended: feed.suspended,
            tags: feed.tags.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedWithUnreadCount {
    #[serde(flatten)]
    pub feed: Feed,
    pub unread_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub feeds: i64,
}
