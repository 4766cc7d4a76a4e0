//! Long-running scheduler process.
//!
//! Restores every active feed's trigger on start, keeps the trigger registry
//! in sync with the database, and stops on SIGINT/SIGTERM.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info, warn};

use crate::app::{AppContext, Result};
use crate::config::Config;
use crate::domain::Feed;
use crate::scheduler::{Dispatcher, Limiter, Recurrence, Scheduler, SyncReport};
use crate::store::Store;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Concurrent fetch slots
    pub workers: usize,
    /// Fetch requests buffered between triggers and the dispatcher
    pub queue_size: usize,
    /// How often the trigger registry is reconciled against the database
    pub registry_sync: Duration,
}

impl From<&Config> for DaemonConfig {
    fn from(config: &Config) -> Self {
        Self {
            workers: config.scheduler.workers,
            queue_size: config.scheduler.queue_size,
            registry_sync: Duration::from_secs(config.scheduler.registry_sync_secs),
        }
    }
}

/// Daemon runner
pub struct Daemon {
    ctx: Arc<AppContext>,
    config: DaemonConfig,
}

impl Daemon {
    pub fn new(ctx: Arc<AppContext>, config: DaemonConfig) -> Self {
        Self { ctx, config }
    }

    /// Run until SIGINT or SIGTERM.
    pub async fn run(&self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let (scheduler, queue) = Scheduler::new(self.config.queue_size);
        let scheduler = Arc::new(scheduler);
        let dispatcher = Dispatcher::new(
            queue,
            Limiter::new(self.config.workers),
            self.ctx.executor.clone(),
        )
        .spawn();

        let restored = restore(self.ctx.store.as_ref(), &scheduler).await?;
        info!(
            feeds = restored,
            workers = self.config.workers,
            pid = std::process::id(),
            "nexa daemon started"
        );

        let mut timer = interval(self.config.registry_sync);
        timer.tick().await; // Skip the first immediate tick

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = timer.tick() => {
                    if let Err(e) = sync_registry(self.ctx.store.as_ref(), &scheduler) {
                        error!("Registry sync failed: {}", e);
                    }
                }
            }
        }

        info!("Daemon shutting down...");
        drop(scheduler);
        if let Err(e) = dispatcher.await {
            warn!("Dispatcher ended abnormally: {}", e);
        }

        Ok(())
    }
}

/// Queue an immediate fetch for every active feed and subscribe it. Feeds
/// whose schedule does not parse are skipped.
pub async fn restore(store: &dyn Store, scheduler: &Scheduler) -> Result<usize> {
    let mut restored = 0;
    for feed in active_feeds(store)? {
        if let Err(e) = Recurrence::parse(&feed.schedule) {
            warn!(feed_id = %feed.id, link = %feed.link, "Skipping feed: {}", e);
            continue;
        }
        scheduler.fetch_now(&feed.id).await?;
        scheduler.subscribe(&feed)?;
        restored += 1;
    }
    Ok(restored)
}

/// Bring the trigger registry in line with the stored feeds.
pub fn sync_registry(store: &dyn Store, scheduler: &Scheduler) -> Result<SyncReport> {
    let feeds: Vec<Feed> = store
        .filter_feeds(&[])?
        .into_iter()
        .map(|f| f.feed)
        .collect();
    let report = scheduler.sync(&feeds)?;
    if report != SyncReport::default() {
        info!(
            subscribed = report.subscribed,
            replaced = report.replaced,
            unsubscribed = report.unsubscribed,
            failed = report.failed,
            "Registry synced"
        );
    }
    Ok(report)
}

fn active_feeds(store: &dyn Store) -> Result<Vec<Feed>> {
    Ok(store
        .filter_feeds(&[])?
        .into_iter()
        .map(|f| f.feed)
        .filter(|f| !f.suspended)
        .collect())
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {},
                _ = sigint.recv() => {},
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            warn!("Signal handlers unavailable, falling back to Ctrl-C: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(windows)]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
