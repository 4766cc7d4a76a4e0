use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::executor::FetchExecutor;
use crate::scheduler::Limiter;

/// Drains the fetch queue, spawning one task per request. Each task waits
/// for a [`Limiter`] slot before running the executor, so the queue keeps
/// draining while fetches are in flight.
///
/// At most one task per feed waits for a slot; requests for a feed that is
/// already waiting are dropped.
pub struct Dispatcher {
    queue: mpsc::Receiver<String>,
    limiter: Limiter,
    executor: Arc<FetchExecutor>,
    waiting: Arc<Mutex<HashSet<String>>>,
}

fn lock(waiting: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    // A poisoned set is still consistent.
    waiting.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Dispatcher {
    pub fn new(
        queue: mpsc::Receiver<String>,
        limiter: Limiter,
        executor: Arc<FetchExecutor>,
    ) -> Self {
        Self {
            queue,
            limiter,
            executor,
            waiting: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs until every sender of the queue is gone.
    pub async fn run(mut self) {
        info!(workers = self.limiter.capacity(), "Dispatcher started");

        while let Some(feed_id) = self.queue.recv().await {
            if !lock(&self.waiting).insert(feed_id.clone()) {
                debug!(feed_id = %feed_id, "Fetch already waiting, skipping");
                continue;
            }

            let limiter = self.limiter.clone();
            let executor = self.executor.clone();
            let waiting = self.waiting.clone();

            tokio::spawn(async move {
                let slot = limiter.acquire().await;
                lock(&waiting).remove(&feed_id);
                let _slot = match slot {
                    Ok(slot) => slot,
                    Err(e) => {
                        error!(feed_id = %feed_id, "Dropping fetch: {}", e);
                        return;
                    }
                };

                match executor.run(&feed_id).await {
                    Ok(report) => {
                        debug!(feed_id = %feed_id, new_items = report.new_items, "Fetch done");
                    }
                    Err(e) => {
                        error!(feed_id = %feed_id, stage = %e.stage(), "{}", e);
                    }
                }
            });
        }

        info!("Dispatcher stopped");
    }
}
