pub mod commands;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::service::DEFAULT_SCHEDULE;

#[derive(Parser)]
#[command(name = "nexa")]
#[command(about = "Scheduled RSS/Atom feed ingestion", long_about = None)]
pub struct Cli {
    /// Number of feeds fetched concurrently (overrides the config file)
    #[arg(short, long, global = true)]
    pub workers: Option<usize>,

    /// SQLite database path (overrides the config file)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the scheduler until interrupted
    Serve,
    /// Add a new feed and fetch it once
    Add {
        /// URL of the feed to add
        url: String,

        /// Six-field cron schedule (sec min hour day month weekday)
        #[arg(long = "cron", default_value = DEFAULT_SCHEDULE)]
        schedule: String,

        /// Tag to attach (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        /// Free-form description
        #[arg(long = "desc", default_value = "")]
        description: String,

        /// Store the feed without scheduling it
        #[arg(long)]
        suspended: bool,
    },
    /// Change a feed's link, schedule, tags or suspension
    Edit(EditArgs),
    /// Remove a feed and its items
    Remove {
        /// Feed id
        id: String,
    },
    /// Fetch one feed now and report what was stored
    Fetch {
        /// Feed id
        id: String,
    },
    /// List feeds with unread counts
    Feeds {
        /// Only feeds carrying one of these tags
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        #[arg(long)]
        json: bool,
    },
    /// List tags with feed counts
    Tags,
    /// List items, newest first
    Items {
        /// Only items of these feeds
        #[arg(short, long = "feed")]
        feeds: Vec<String>,

        #[arg(long)]
        unread: bool,

        #[arg(long)]
        starred: bool,

        #[arg(short, long, default_value_t = 50)]
        limit: usize,

        #[arg(long)]
        json: bool,
    },
    /// Set read/starred/liked flags on an item
    Mark(MarkArgs),
}

#[derive(Args)]
pub struct EditArgs {
    /// Feed id
    pub id: String,

    #[arg(long)]
    pub url: Option<String>,

    #[arg(long = "cron")]
    pub schedule: Option<String>,

    /// Replace the feed's tags (repeatable)
    #[arg(short, long = "tag", conflicts_with = "clear_tags")]
    pub tags: Vec<String>,

    /// Remove every tag
    #[arg(long)]
    pub clear_tags: bool,

    #[arg(long = "desc")]
    pub description: Option<String>,

    #[arg(long, conflicts_with = "resume")]
    pub suspend: bool,

    #[arg(long)]
    pub resume: bool,
}

#[derive(Args)]
pub struct MarkArgs {
    /// Item id
    pub id: String,

    #[arg(long, conflicts_with = "unread")]
    pub read: bool,
    #[arg(long)]
    pub unread: bool,

    #[arg(long, conflicts_with = "unstar")]
    pub star: bool,
    #[arg(long)]
    pub unstar: bool,

    #[arg(long, conflicts_with = "unlike")]
    pub like: bool,
    #[arg(long)]
    pub unlike: bool,
}

/// `Some(true)` for the set flag, `Some(false)` for the clear flag, `None`
/// when neither was given.
pub(crate) fn toggle(set: bool, clear: bool) -> Option<bool> {
    match (set, clear) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}
