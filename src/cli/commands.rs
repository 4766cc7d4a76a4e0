use std::collections::BTreeSet;

use serde::Serialize;

use crate::app::{NexaError, Result};
use crate::cli::{toggle, EditArgs, MarkArgs};
use crate::domain::{ItemFilter, ItemStateUpdate};
use crate::service::{FeedEdit, FeedService, NewFeed};

pub async fn add_feed(
    service: &FeedService,
    url: &str,
    schedule: String,
    tags: Vec<String>,
    description: String,
    suspended: bool,
) -> Result<()> {
    let feed = service
        .add_feed(NewFeed {
            link: url.to_string(),
            description,
            schedule,
            suspended,
            tags: tags.into_iter().collect(),
        })
        .await?;

    println!("Added feed: {}", feed.link);
    println!("  id: {}", feed.id);
    if feed.suspended {
        println!("  suspended, not fetched");
    } else {
        let stored = service
            .list_items(&ItemFilter {
                feed_ids: vec![feed.id.clone()],
                ..Default::default()
            })?
            .total;
        println!("Fetched {} items", stored);
    }

    Ok(())
}

pub async fn edit_feed(service: &FeedService, args: EditArgs) -> Result<()> {
    let tags = if args.clear_tags {
        Some(BTreeSet::new())
    } else if args.tags.is_empty() {
        None
    } else {
        Some(args.tags.into_iter().collect())
    };

    let feed = service
        .update_feed(
            &args.id,
            FeedEdit {
                link: args.url,
                description: args.description,
                schedule: args.schedule,
                suspended: toggle(args.suspend, args.resume),
                tags,
            },
        )
        .await?;

    println!("Updated feed: {}", feed.display_title());
    Ok(())
}

pub fn remove_feed(service: &FeedService, id: &str) -> Result<()> {
    service.delete_feed(id)?;
    println!("Removed feed: {}", id);
    Ok(())
}

pub async fn fetch_feed(service: &FeedService, id: &str) -> Result<()> {
    let report = service.fetch(id).await?;
    println!(
        "Fetched {} entries, {} new items",
        report.entries, report.new_items
    );
    Ok(())
}

pub fn list_feeds(service: &FeedService, tags: &[String], json: bool) -> Result<()> {
    let feeds = service.list_feeds(tags)?;

    if json {
        return print_json(&feeds);
    }

    if feeds.is_empty() {
        println!("No feeds");
        return Ok(());
    }

    for entry in feeds {
        let feed = &entry.feed;
        let marker = if feed.suspended { " [suspended]" } else { "" };
        println!(
            "{} ({} unread){}\n  {}\n  id: {}  schedule: {}",
            feed.display_title(),
            entry.unread_count,
            marker,
            feed.link,
            feed.id,
            feed.schedule
        );
        if !feed.tags.is_empty() {
            let tags: Vec<&str> = feed.tags.iter().map(String::as_str).collect();
            println!("  tags: {}", tags.join(", "));
        }
    }

    Ok(())
}

pub fn list_tags(service: &FeedService) -> Result<()> {
    let tags = service.list_tags()?;

    if tags.is_empty() {
        println!("No tags");
        return Ok(());
    }

    for tag in tags {
        println!("{} ({} feeds)", tag.tag, tag.feeds);
    }

    Ok(())
}

pub fn list_items(service: &FeedService, filter: &ItemFilter, json: bool) -> Result<()> {
    let page = service.list_items(filter)?;

    if json {
        return print_json(&page.items);
    }

    if page.items.is_empty() {
        println!("No items");
        return Ok(());
    }

    for item in &page.items {
        let read_marker = if item.read { " " } else { "●" };
        let star = if item.starred { "*" } else { " " };

        let date = item
            .pub_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "          ".to_string());

        println!(
            "{}{} {} {}  {}",
            read_marker,
            star,
            date,
            item.display_title(),
            item.id
        );
    }

    if page.total > page.items.len() as i64 {
        println!("({} of {} items)", page.items.len(), page.total);
    }

    Ok(())
}

pub fn mark_item(service: &FeedService, args: MarkArgs) -> Result<()> {
    let update = ItemStateUpdate {
        read: toggle(args.read, args.unread),
        starred: toggle(args.star, args.unstar),
        liked: toggle(args.like, args.unlike),
    };
    if update.is_empty() {
        return Err(NexaError::Validation(
            "nothing to mark: pass --read, --star, --like or their opposites".into(),
        ));
    }

    let item = service.mark_item(&args.id, update)?;
    println!(
        "{}: read={} starred={} liked={}",
        item.display_title(),
        item.read,
        item.starred,
        item.liked
    );
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).map_err(|e| NexaError::Other(e.to_string()))?;
    println!("{}", out);
    Ok(())
}
