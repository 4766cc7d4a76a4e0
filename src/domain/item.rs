use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub feed_id: String,
    pub title: String,
    pub content: String,
    pub description: String,
    pub image: Option<String>,
    pub link: String,
    /// Upstream identifier, advisory only.
    pub guid: String,
    pub pub_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    // User state. Only the item service writes these.
    pub read: bool,
    pub starred: bool,
    pub liked: bool,
}

impl Item {
    pub fn new(id: String, feed_id: String) -> Self {
        Self {
            id,
            feed_id,
            title: String::new(),
            content: String::new(),
            description: String::new(),
            image: None,
            link: String::new(),
            guid: String::new(),
            pub_date: None,
            created_at: Utc::now(),
            read: false,
            starred: false,
            liked: false,
        }
    }

    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            "(Untitled)"
        } else {
            &self.title
        }
    }

    /// Get the best available content for display
    pub fn display_content(&self) -> &str {
        if self.content.is_empty() {
            &self.description
        } else {
            &self.content
        }
    }
}

/// Query over stored items. Unset fields do not filter.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub feed_ids: Vec<String>,
    pub unread: Option<bool>,
    pub starred: Option<bool>,
    pub liked: Option<bool>,
    pub since: Option<DateTime<Utc>>,
    pub query: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Partial update of the user-state flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct ItemStateUpdate {
    pub read: Option<bool>,
    pub starred: Option<bool>,
    pub liked: Option<bool>,
}

impl ItemStateUpdate {
    pub fn is_empty(&self) -> bool {
        self.read.is_none() && self.starred.is_none() && self.liked.is_none()
    }
}
