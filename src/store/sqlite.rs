use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{NexaError, Result};
use crate::domain::{
    Feed, FeedSettings, FeedUpdate, FeedWithUnreadCount, Item, ItemFilter, ItemStateUpdate, TagCount,
};
use crate::store::Store;

const FEED_COLUMNS: &str = "f.id, f.link, f.title, f.description, f.schedule, f.suspended, f.last_build_date";

const ITEM_COLUMNS: &str = "id, feed_id, title, content, description, image, link, guid, pub_date, created_at, read, starred, liked";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migrations.to_latest(&mut conn)?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| NexaError::Other(format!("Database lock poisoned: {}", e)))
    }

    fn format_datetime(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    fn feed_from_row(row: &Row<'_>) -> rusqlite::Result<Feed> {
        Ok(Feed {
            id: row.get(0)?,
            link: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            schedule: row.get(4)?,
            suspended: row.get(5)?,
            tags: Default::default(),
            last_build_date: row
                .get::<_, Option<String>>(6)?
                .and_then(|s| Self::parse_datetime(&s)),
        })
    }

    fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
        Ok(Item {
            id: row.get(0)?,
            feed_id: row.get(1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            description: row.get(4)?,
            image: row.get(5)?,
            link: row.get(6)?,
            guid: row.get(7)?,
            pub_date: row
                .get::<_, Option<String>>(8)?
                .and_then(|s| Self::parse_datetime(&s)),
            created_at: row
                .get::<_, String>(9)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
            read: row.get(10)?,
            starred: row.get(11)?,
            liked: row.get(12)?,
        })
    }

    fn load_tags(conn: &Connection, feed: &mut Feed) -> Result<()> {
        let mut stmt = conn.prepare_cached("SELECT tag FROM feed_tags WHERE feed_id = ?1")?;
        feed.tags = stmt
            .query_map(params![feed.id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<BTreeSet<String>>>()?;
        Ok(())
    }

    fn placeholders(n: usize) -> String {
        vec!["?"; n].join(", ")
    }

    /// WHERE clause and its positional arguments for an item filter.
    fn item_conditions(filter: &ItemFilter) -> (String, Vec<Box<dyn ToSql>>) {
        let mut clauses: Vec<String> = Vec::new();
        let mut args: Vec<Box<dyn ToSql>> = Vec::new();

        if !filter.feed_ids.is_empty() {
            clauses.push(format!(
                "feed_id IN ({})",
                Self::placeholders(filter.feed_ids.len())
            ));
            for id in &filter.feed_ids {
                args.push(Box::new(id.clone()));
            }
        }
        if let Some(unread) = filter.unread {
            clauses.push("read = ?".into());
            args.push(Box::new(!unread));
        }
        if let Some(starred) = filter.starred {
            clauses.push("starred = ?".into());
            args.push(Box::new(starred));
        }
        if let Some(liked) = filter.liked {
            clauses.push("liked = ?".into());
            args.push(Box::new(liked));
        }
        if let Some(since) = filter.since {
            clauses.push("pub_date >= ?".into());
            args.push(Box::new(Self::format_datetime(&since)));
        }
        if let Some(query) = filter.query.as_deref().filter(|q| !q.is_empty()) {
            clauses.push("(title LIKE ? OR description LIKE ? OR content LIKE ?)".into());
            let pattern = format!("%{}%", query);
            for _ in 0..3 {
                args.push(Box::new(pattern.clone()));
            }
        }

        let sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        (sql, args)
    }
}

impl Store for SqliteStore {
    fn get_feed(&self, id: &str) -> Result<Option<Feed>> {
        let conn = self.conn()?;

        let feed = conn
            .query_row(
                &format!("SELECT {} FROM feeds f WHERE f.id = ?1", FEED_COLUMNS),
                params![id],
                Self::feed_from_row,
            )
            .optional()?;

        match feed {
            Some(mut feed) => {
                Self::load_tags(&conn, &mut feed)?;
                Ok(Some(feed))
            }
            None => Ok(None),
        }
    }

    fn save_feed(&self, feed: &Feed) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO feeds (id, link, title, description, schedule, suspended, last_build_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                link = excluded.link,
                title = excluded.title,
                description = excluded.description,
                schedule = excluded.schedule,
                suspended = excluded.suspended,
                last_build_date = excluded.last_build_date",
            params![
                feed.id,
                feed.link,
                feed.title,
                feed.description,
                feed.schedule,
                feed.suspended,
                feed.last_build_date.as_ref().map(Self::format_datetime),
            ],
        )?;

        tx.execute("DELETE FROM feed_tags WHERE feed_id = ?1", params![feed.id])?;
        for tag in &feed.tags {
            tx.execute(
                "INSERT OR IGNORE INTO feed_tags (feed_id, tag) VALUES (?1, ?2)",
                params![feed.id, tag],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn edit_feed(&self, id: &str, settings: &FeedSettings) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let changed = tx.execute(
            "UPDATE feeds SET link = ?1, description = ?2, schedule = ?3, suspended = ?4
             WHERE id = ?5",
            params![
                settings.link,
                settings.description,
                settings.schedule,
                settings.suspended,
                id
            ],
        )?;
        if changed == 0 {
            return Ok(false);
        }

        tx.execute("DELETE FROM feed_tags WHERE feed_id = ?1", params![id])?;
        for tag in &settings.tags {
            tx.execute(
                "INSERT OR IGNORE INTO feed_tags (feed_id, tag) VALUES (?1, ?2)",
                params![id, tag],
            )?;
        }

        tx.commit()?;
        Ok(true)
    }

    fn update_feed(&self, id: &str, update: &FeedUpdate) -> Result<bool> {
        let conn = self.conn()?;

        let changed = conn.execute(
            "UPDATE feeds SET title = ?1, last_build_date = ?2 WHERE id = ?3",
            params![
                update.title,
                update.last_build_date.as_ref().map(Self::format_datetime),
                id
            ],
        )?;

        Ok(changed > 0)
    }

    fn delete_feed(&self, id: &str) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        // Explicit, so the cascade does not depend on PRAGMA foreign_keys.
        tx.execute("DELETE FROM items WHERE feed_id = ?1", params![id])?;
        tx.execute("DELETE FROM feed_tags WHERE feed_id = ?1", params![id])?;
        tx.execute("DELETE FROM feeds WHERE id = ?1", params![id])?;

        tx.commit()?;
        Ok(())
    }

    fn filter_feeds(&self, tags: &[String]) -> Result<Vec<FeedWithUnreadCount>> {
        let conn = self.conn()?;

        let mut sql = format!(
            "SELECT {}, (SELECT COUNT(*) FROM items i WHERE i.feed_id = f.id AND i.read = 0)
             FROM feeds f",
            FEED_COLUMNS
        );
        if !tags.is_empty() {
            sql.push_str(&format!(
                " WHERE EXISTS (SELECT 1 FROM feed_tags t WHERE t.feed_id = f.id AND t.tag IN ({}))",
                Self::placeholders(tags.len())
            ));
        }
        sql.push_str(" ORDER BY f.title, f.link");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(tags.iter()), |row| {
                Ok(FeedWithUnreadCount {
                    feed: Self::feed_from_row(row)?,
                    unread_count: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut feeds = rows;
        for entry in &mut feeds {
            Self::load_tags(&conn, &mut entry.feed)?;
        }

        Ok(feeds)
    }

    fn list_tags(&self) -> Result<Vec<TagCount>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT tag, COUNT(*) FROM feed_tags GROUP BY tag ORDER BY tag",
        )?;

        let tags = stmt
            .query_map([], |row| {
                Ok(TagCount {
                    tag: row.get(0)?,
                    feeds: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(tags)
    }

    fn insert_items_if_absent(&self, items: &[Item]) -> Result<usize> {
        let mut conn = self.conn()?;

        let tx = conn.transaction()?;
        let mut count = 0;

        {
            // User-state columns are left to their defaults on insert.
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO items
                    (id, feed_id, title, content, description, image, link, guid, pub_date, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;

            for item in items {
                count += stmt.execute(params![
                    item.id,
                    item.feed_id,
                    item.title,
                    item.content,
                    item.description,
                    item.image,
                    item.link,
                    item.guid,
                    item.pub_date.as_ref().map(Self::format_datetime),
                    Self::format_datetime(&item.created_at),
                ])?;
            }
        }

        tx.commit()?;
        Ok(count)
    }

    fn get_item(&self, id: &str) -> Result<Option<Item>> {
        let conn = self.conn()?;

        let result = conn
            .query_row(
                &format!("SELECT {} FROM items WHERE id = ?1", ITEM_COLUMNS),
                params![id],
                Self::item_from_row,
            )
            .optional()?;

        Ok(result)
    }

    fn filter_items(&self, filter: &ItemFilter) -> Result<Vec<Item>> {
        let conn = self.conn()?;

        let (conditions, mut args) = Self::item_conditions(filter);
        let mut sql = format!(
            "SELECT {} FROM items{} ORDER BY pub_date DESC, created_at DESC",
            ITEM_COLUMNS, conditions
        );
        if filter.limit.is_some() || filter.offset.is_some() {
            sql.push_str(" LIMIT ? OFFSET ?");
            args.push(Box::new(filter.limit.map(|l| l as i64).unwrap_or(-1)));
            args.push(Box::new(filter.offset.unwrap_or(0) as i64));
        }

        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_from_iter(args.iter()), Self::item_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(items)
    }

    fn count_items(&self, filter: &ItemFilter) -> Result<i64> {
        let conn = self.conn()?;

        let (conditions, args) = Self::item_conditions(filter);
        let count = conn.query_row(
            &format!("SELECT COUNT(*) FROM items{}", conditions),
            params_from_iter(args.iter()),
            |row| row.get(0),
        )?;

        Ok(count)
    }

    fn update_item(&self, id: &str, update: &ItemStateUpdate) -> Result<bool> {
        let conn = self.conn()?;

        if update.is_empty() {
            let exists: i64 = conn.query_row(
                "SELECT COUNT(*) FROM items WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )?;
            return Ok(exists > 0);
        }

        let mut sets = Vec::new();
        let mut args: Vec<Box<dyn ToSql>> = Vec::new();
        for (column, value) in [
            ("read", update.read),
            ("starred", update.starred),
            ("liked", update.liked),
        ] {
            if let Some(value) = value {
                sets.push(format!("{} = ?", column));
                args.push(Box::new(value));
            }
        }
        args.push(Box::new(id.to_string()));

        let changed = conn.execute(
            &format!("UPDATE items SET {} WHERE id = ?", sets.join(", ")),
            params_from_iter(args.iter()),
        )?;

        Ok(changed > 0)
    }
}
