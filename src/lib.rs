//! # nexa
//!
//! Scheduled RSS/Atom ingestion: every feed carries its own cron schedule,
//! fetches run under a shared concurrency budget, and repeated fetches never
//! duplicate items or overwrite user state.
//!
//! ## Architecture
//!
//! ```text
//! Scheduler → queue → Dispatcher → Limiter → Executor
//!                                              ├─ Fetcher
//!                                              ├─ Parser
//!                                              ├─ Reconciler
//!                                              └─ Store
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! # Add a feed, fetched every 30 minutes
//! nexa add https://blog.rust-lang.org/feed.xml --cron "0 */30 * * * *"
//!
//! # Run the scheduler
//! nexa serve
//!
//! # Unread items
//! nexa items --unread
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the store,
/// fetcher, parser and executor.
pub mod app;

/// Command-line interface using clap.
///
/// - `serve` - Run the scheduler daemon
/// - `add <url>` / `edit <id>` / `remove <id>` - Manage feeds
/// - `fetch <id>` - Fetch one feed now
/// - `feeds` / `tags` / `items` - List stored data
/// - `mark <item>` - Set read/starred/liked flags
pub mod cli;

/// Configuration loaded from `~/.config/nexa/config.toml`.
pub mod config;

/// The long-running scheduler process behind `nexa serve`.
pub mod daemon;

/// Core domain models.
///
/// - [`Feed`](domain::Feed): subscription with its schedule and tags
/// - [`Item`](domain::Item): one entry with a SHA-256 identity
pub mod domain;

/// Fetch one feed end to end: load, fetch, parse, reconcile, persist.
pub mod executor;

/// HTTP fetching.
///
/// - [`Fetcher`](fetcher::Fetcher): async trait for downloading a feed document
/// - [`HttpFetcher`](fetcher::HttpFetcher): reqwest-based implementation
pub mod fetcher;

/// Feed document parsing via feed-rs.
pub mod parser;

/// Merges a parsed document into stored feed state.
pub mod reconciler;

/// Per-feed cron triggers, the fetch queue, and the concurrency limiter.
pub mod scheduler;

/// Create, edit, delete and refresh feeds; mark items.
pub mod service;

/// SQLite persistence layer.
///
/// - [`Store`](store::Store): trait defining storage operations
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;

#[cfg(test)]
pub(crate) mod test_support;
