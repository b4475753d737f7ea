//! Online shard tracking and the poll cycles that drain the queues.

use std::{sync::Arc, time::Duration};

use {
    dashmap::DashMap,
    futures::future::BoxFuture,
    tokio::time::{self, MissedTickBehavior},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info},
};

use crate::{queue::WorkQueue, work_item::WorkItem};

/// One independently-connected partition of the remote-platform
/// connection. Implemented by the host's gateway client.
pub trait ShardConnection: Send + Sync {
    /// Index of this shard within the deployment's shard count.
    fn shard_id(&self) -> u32;
}

struct ShardHandle {
    conn: Arc<dyn ShardConnection>,
    cancel: CancellationToken,
}

/// Tracks online shards and runs one poll cycle per shard.
///
/// Each cycle dequeues at most one global and one local item, so a single
/// shard never starves the shared pool, and runs on a fixed delay rather
/// than a hot loop. FIFO holds within a queue; there is no ordering across
/// shards or between the global and local queues.
pub struct ShardPool {
    queue: Arc<WorkQueue>,
    shards: DashMap<u32, ShardHandle>,
    poll_interval: Duration,
}

impl ShardPool {
    #[must_use]
    pub fn new(queue: Arc<WorkQueue>, poll_interval: Duration) -> Self {
        Self {
            queue,
            shards: DashMap::new(),
            poll_interval,
        }
    }

    /// Register a (re)connected shard and start its poll cycle. An existing
    /// handle for the same id is replaced and its cycle stopped.
    pub fn register(&self, conn: Arc<dyn ShardConnection>) {
        let shard_id = conn.shard_id();
        let cancel = CancellationToken::new();
        if let Some(previous) = self.shards.insert(shard_id, ShardHandle {
            conn: Arc::clone(&conn),
            cancel: cancel.clone(),
        }) {
            previous.cancel.cancel();
        }
        info!(shard_id, "shard online, poll cycle started");

        let queue = Arc::clone(&self.queue);
        let interval = self.poll_interval;
        tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Some(item) = queue.take_global() {
                            run_item(item, &conn);
                        }
                        if let Some(item) = queue.take_for_shard(shard_id) {
                            run_item(item, &conn);
                        }
                    }
                }
            }
            debug!(shard_id, "poll cycle stopped");
        });
    }

    /// Remove a disconnected shard. Its local queue is discarded, not
    /// migrated; still-waiting items are left to their expiry timers.
    pub fn deregister(&self, shard_id: u32) {
        if let Some((_, handle)) = self.shards.remove(&shard_id) {
            handle.cancel.cancel();
            let dropped = self.queue.discard_shard(shard_id);
            info!(shard_id, dropped, "shard offline, local queue discarded");
        }
    }

    #[must_use]
    pub fn online_shards(&self) -> Vec<u32> {
        self.shards.iter().map(|entry| *entry.key()).collect()
    }

    #[must_use]
    pub fn is_online(&self, shard_id: u32) -> bool {
        self.shards.contains_key(&shard_id)
    }

    /// Fire-and-forget fan-out against every currently online shard.
    /// Nothing is enqueued and nobody waits: this is not a [`WorkItem`].
    pub fn broadcast<F>(&self, f: F)
    where
        F: Fn(Arc<dyn ShardConnection>) -> BoxFuture<'static, ()>,
    {
        for entry in self.shards.iter() {
            tokio::spawn(f(Arc::clone(&entry.conn)));
        }
    }
}

/// Claim and execute one dequeued item. Items that reached a terminal
/// status while queued are dropped here, never executed.
fn run_item(item: WorkItem, conn: &Arc<dyn ShardConnection>) {
    let Some(task) = item.claim() else {
        debug!(status = ?item.status(), "dropping dequeued item in terminal state");
        return;
    };
    let conn = Arc::clone(conn);
    tokio::spawn(async move {
        task(conn).await;
        item.finish();
    });
}
