//! Per-feed recurring triggers and the fetch queue they feed.
//!
//! Each subscribed feed owns one trigger task that sleeps until the next slot
//! of its [`Recurrence`] and then enqueues the feed id. Triggers never fetch;
//! the [`Dispatcher`] drains the queue and runs fetches through the
//! [`Limiter`].

pub mod dispatcher;
pub mod limiter;
pub mod recurrence;

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app::{NexaError, Result};
use crate::domain::Feed;

pub use dispatcher::Dispatcher;
pub use limiter::{Limiter, DEFAULT_WORKERS};
pub use recurrence::Recurrence;

pub const DEFAULT_QUEUE_SIZE: usize = 64;

struct Trigger {
    schedule: String,
    task: JoinHandle<()>,
}

impl Drop for Trigger {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Changes applied by [`Scheduler::sync`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub subscribed: usize,
    pub replaced: usize,
    pub unsubscribed: usize,
    pub failed: usize,
}

pub struct Scheduler {
    /// feed id -> active trigger. Only mutated under this lock.
    registry: Mutex<HashMap<String, Trigger>>,
    queue: mpsc::Sender<String>,
}

impl Scheduler {
    /// Create a scheduler and the receiving end of its fetch queue, to be
    /// handed to a [`Dispatcher`].
    pub fn new(queue_size: usize) -> (Self, mpsc::Receiver<String>) {
        let (queue, rx) = mpsc::channel(queue_size.max(1));
        let scheduler = Self {
            registry: Mutex::new(HashMap::new()),
            queue,
        };
        (scheduler, rx)
    }

    fn registry(&self) -> Result<MutexGuard<'_, HashMap<String, Trigger>>> {
        self.registry
            .lock()
            .map_err(|e| NexaError::Other(format!("Scheduler registry poisoned: {}", e)))
    }

    /// Register a recurring trigger for `feed`.
    ///
    /// Returns `Ok(false)` without touching anything if the feed already has
    /// a trigger. Fails with [`NexaError::InvalidSchedule`] if the schedule
    /// does not parse.
    pub fn subscribe(&self, feed: &Feed) -> Result<bool> {
        let mut registry = self.registry()?;
        if registry.contains_key(&feed.id) {
            return Ok(false);
        }

        let trigger = self.trigger(feed)?;
        registry.insert(feed.id.clone(), trigger);
        info!(feed_id = %feed.id, schedule = %feed.schedule, "Subscribed");
        Ok(true)
    }

    /// Drop the feed's trigger. Returns `Ok(false)` if there was none.
    pub fn unsubscribe(&self, feed_id: &str) -> Result<bool> {
        let removed = self.registry()?.remove(feed_id).is_some();
        if removed {
            info!(feed_id, "Unsubscribed");
        }
        Ok(removed)
    }

    /// Swap the feed's trigger for one built from its current schedule.
    ///
    /// The new schedule is validated first; on error the existing trigger is
    /// kept.
    pub fn replace(&self, feed: &Feed) -> Result<()> {
        let mut registry = self.registry()?;
        let trigger = self.trigger(feed)?;
        if registry.insert(feed.id.clone(), trigger).is_some() {
            info!(feed_id = %feed.id, schedule = %feed.schedule, "Rescheduled");
        } else {
            info!(feed_id = %feed.id, schedule = %feed.schedule, "Subscribed");
        }
        Ok(())
    }

    /// Enqueue a fetch of `feed_id` now, regardless of subscription state.
    pub async fn fetch_now(&self, feed_id: &str) -> Result<()> {
        self.queue
            .send(feed_id.to_string())
            .await
            .map_err(|_| NexaError::Other("Fetch queue closed".into()))?;
        debug!(feed_id, "Fetch requested");
        Ok(())
    }

    /// `false` if the registry lock is poisoned.
    pub fn is_subscribed(&self, feed_id: &str) -> bool {
        match self.registry() {
            Ok(registry) => registry.contains_key(feed_id),
            Err(e) => {
                warn!(feed_id, "Subscription lookup failed: {}", e);
                false
            }
        }
    }

    /// Sorted ids of subscribed feeds; empty if the registry lock is poisoned.
    pub fn subscribed(&self) -> Vec<String> {
        let mut ids: Vec<String> = match self.registry() {
            Ok(registry) => registry.keys().cloned().collect(),
            Err(e) => {
                warn!("Subscription listing failed: {}", e);
                Vec::new()
            }
        };
        ids.sort();
        ids
    }

    /// Bring the registry in line with a snapshot of the feed registry:
    /// exactly the non-suspended feeds end up subscribed, each on its current
    /// schedule. Feeds with an invalid schedule are skipped.
    pub fn sync(&self, feeds: &[Feed]) -> Result<SyncReport> {
        let mut registry = self.registry()?;
        let mut report = SyncReport::default();

        let wanted: HashMap<&str, &Feed> = feeds
            .iter()
            .filter(|f| !f.suspended)
            .map(|f| (f.id.as_str(), f))
            .collect();

        let stale: Vec<String> = registry
            .iter()
            .filter(|(id, trigger)| match wanted.get(id.as_str()) {
                Some(feed) => feed.schedule != trigger.schedule,
                None => true,
            })
            .map(|(id, _)| id.clone())
            .collect();

        let mut rescheduled = HashSet::new();
        for id in stale {
            registry.remove(&id);
            if wanted.contains_key(id.as_str()) {
                rescheduled.insert(id);
            } else {
                info!(feed_id = %id, "Unsubscribed");
                report.unsubscribed += 1;
            }
        }

        for feed in wanted.values() {
            if registry.contains_key(&feed.id) {
                continue;
            }
            match self.trigger(feed) {
                Ok(trigger) => {
                    registry.insert(feed.id.clone(), trigger);
                    if rescheduled.contains(&feed.id) {
                        info!(feed_id = %feed.id, schedule = %feed.schedule, "Rescheduled");
                        report.replaced += 1;
                    } else {
                        info!(feed_id = %feed.id, schedule = %feed.schedule, "Subscribed");
                        report.subscribed += 1;
                    }
                }
                Err(e) => {
                    warn!(feed_id = %feed.id, "Skipping feed: {}", e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    fn trigger(&self, feed: &Feed) -> Result<Trigger> {
        let recurrence = Recurrence::parse(&feed.schedule)?;
        let task = tokio::spawn(run_trigger(
            feed.id.clone(),
            recurrence,
            self.queue.clone(),
        ));
        Ok(Trigger {
            schedule: feed.schedule.clone(),
            task,
        })
    }
}

/// Trigger loop for one feed. Slots missed while the task was not running
/// are skipped, not replayed.
async fn run_trigger(feed_id: String, recurrence: Recurrence, queue: mpsc::Sender<String>) {
    let mut last = Utc::now();
    loop {
        let now = Utc::now().max(last);
        let Some(next) = recurrence.next_fire_after(now) else {
            debug!(feed_id = %feed_id, schedule = recurrence.spec(), "Schedule exhausted");
            return;
        };

        let wait = (next - now).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;
        last = next;

        if queue.send(feed_id.clone()).await.is_err() {
            debug!(feed_id = %feed_id, "Fetch queue closed, stopping trigger");
            return;
        }
    }
}
