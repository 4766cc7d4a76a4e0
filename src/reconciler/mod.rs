//! Maps parsed upstream entries onto feed and item records.
//!
//! Reconciliation is pure and infallible. It does not look at stored items:
//! duplicates are absorbed downstream by identity plus insert-if-absent.

pub mod summary;

use chrono::Utc;

use crate::domain::identity;
use crate::domain::{Feed, Item};
use crate::parser::{ParsedFeed, RawEntry};

pub use summary::{summarize, DEFAULT_SUMMARY_CHARS};

#[derive(Debug, Clone)]
pub struct Reconciled {
    pub feed: Feed,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    summary_chars: usize,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(DEFAULT_SUMMARY_CHARS)
    }
}

impl Reconciler {
    pub fn new(summary_chars: usize) -> Self {
        Self { summary_chars }
    }

    /// Returns `feed` with the fetch-owned fields (`title`, `last_build_date`)
    /// replaced, and one candidate item per entry in document order.
    pub fn reconcile(&self, feed: &Feed, parsed: ParsedFeed) -> Reconciled {
        let mut updated = feed.clone();
        updated.title = parsed.title;
        updated.last_build_date = parsed.updated_at;

        let seen_at = Utc::now();
        let items = parsed
            .entries
            .into_iter()
            .map(|entry| {
                let mut item = self.item_from_entry(&feed.id, entry);
                item.created_at = seen_at;
                item
            })
            .collect();

        Reconciled {
            feed: updated,
            items,
        }
    }

    fn item_from_entry(&self, feed_id: &str, entry: RawEntry) -> Item {
        let id = identity::item_id(feed_id, &entry.link, &entry.title, entry.published_at);
        let mut item = Item::new(id, feed_id.to_string());

        item.description = if entry.description.is_empty() {
            summarize(&entry.content, self.summary_chars)
        } else {
            entry.description
        };
        item.guid = if entry.guid.is_empty() {
            identity::hash(&format!("{}{}", entry.title, entry.link))
        } else {
            entry.guid
        };
        item.title = entry.title;
        item.content = entry.content;
        item.link = entry.link;
        item.image = entry.image_url;
        item.pub_date = entry.published_at;

        item
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::TimeZone;

    use super::*;

    fn feed() -> Feed {
        let mut feed = Feed::new(
            "feed-1".into(),
            "https://example.test/rss".into(),
            "*/30 * * * * *".into(),
        );
        feed.title = "Old title".into();
        feed.description = "Mine".into();
        feed.tags = BTreeSet::from(["news".to_string(), "tech".to_string()]);
        feed.suspended = true;
        feed
    }

    fn entry(link: &str) -> RawEntry {
        RawEntry {
            title: format!("Title {}", link),
            content: "<p>Some <em>body</em> text</p>".into(),
            link: link.into(),
            guid: format!("guid-{}", link),
            published_at: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            ..Default::default()
        }
    }

    fn parsed(entries: Vec<RawEntry>) -> ParsedFeed {
        ParsedFeed {
            title: "New title".into(),
            updated_at: Some(Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap()),
            entries,
        }
    }

    #[test]
    fn test_only_fetch_owned_fields_change() {
        let before = feed();
        let out = Reconciler::default().reconcile(&before, parsed(vec![]));

        assert_eq!(out.feed.title, "New title");
        assert_eq!(
            out.feed.last_build_date,
            Some(Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap())
        );
        assert_eq!(out.feed.tags, before.tags);
        assert_eq!(out.feed.suspended, before.suspended);
        assert_eq!(out.feed.schedule, before.schedule);
        assert_eq!(out.feed.link, before.link);
        assert_eq!(out.feed.description, before.description);
        assert_eq!(out.feed.id, before.id);
    }

    #[test]
    fn test_identities_are_stable_across_runs() {
        let reconciler = Reconciler::default();
        let first = reconciler.reconcile(&feed(), parsed(vec![entry("a"), entry("b")]));
        let second = reconciler.reconcile(&feed(), parsed(vec![entry("a"), entry("b")]));

        let ids = |r: &Reconciled| r.items.iter().map(|i| i.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
        assert_ne!(first.items[0].id, first.items[1].id);
    }

    #[test]
    fn test_synthesizes_missing_description() {
        let out = Reconciler::new(9).reconcile(&feed(), parsed(vec![entry("a")]));
        assert_eq!(out.items[0].description, "Some body...");
    }

    #[test]
    fn test_keeps_upstream_description() {
        let mut e = entry("a");
        e.description = "Upstream".into();
        let out = Reconciler::default().reconcile(&feed(), parsed(vec![e]));
        assert_eq!(out.items[0].description, "Upstream");
    }

    #[test]
    fn test_minimal_entry_yields_minimal_item() {
        let out = Reconciler::default().reconcile(&feed(), parsed(vec![RawEntry::default()]));

        let item = &out.items[0];
        assert_eq!(item.feed_id, "feed-1");
        assert_eq!(item.title, "");
        assert_eq!(item.description, "");
        assert!(item.pub_date.is_none());
        assert!(item.image.is_none());
        assert_eq!(item.guid.len(), 64);
        assert!(!item.read && !item.starred && !item.liked);
    }

    #[test]
    fn test_items_preserve_document_order() {
        let out = Reconciler::default().reconcile(
            &feed(),
            parsed(vec![entry("c"), entry("a"), entry("b")]),
        );
        let links: Vec<_> = out.items.iter().map(|i| i.link.as_str()).collect();
        assert_eq!(links, vec!["c", "a", "b"]);
    }
}
