//! Global and per-shard work queues.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    dashmap::DashMap,
    serde::{Deserialize, Serialize},
    tracing::debug,
};

use crate::work_item::{ShardTask, WorkItem};

/// Queue tuning consumed from host configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardQueueConfig {
    /// Seconds before an enqueued item expires while still waiting.
    /// Zero or negative disables expiry: items then wait indefinitely for
    /// a shard to become available.
    pub item_expiry_secs: i64,

    /// Fixed delay between poll cycles on each shard, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for ShardQueueConfig {
    fn default() -> Self {
        Self {
            item_expiry_secs: 0,
            poll_interval_ms: 1_000,
        }
    }
}

impl ShardQueueConfig {
    #[must_use]
    pub fn item_expiry(&self) -> Option<Duration> {
        u64::try_from(self.item_expiry_secs)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

type Slot = Arc<Mutex<VecDeque<WorkItem>>>;

fn lock(slot: &Slot) -> std::sync::MutexGuard<'_, VecDeque<WorkItem>> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

/// One unbounded global queue plus one unbounded queue per shard id,
/// created lazily on first reference.
pub struct WorkQueue {
    global: Slot,
    local: DashMap<u32, Slot>,
    expiry: Option<Duration>,
}

impl WorkQueue {
    #[must_use]
    pub fn new(config: &ShardQueueConfig) -> Self {
        Self {
            global: Slot::default(),
            local: DashMap::new(),
            expiry: config.item_expiry(),
        }
    }

    /// Enqueue a task any shard may pick up.
    pub fn queue_global(&self, task: ShardTask) -> WorkItem {
        let slot = Arc::clone(&self.global);
        self.enqueue(slot, task)
    }

    /// Enqueue a task for one specific shard.
    pub fn queue_for_shard(&self, shard_id: u32, task: ShardTask) -> WorkItem {
        let slot = self.local_slot(shard_id);
        self.enqueue(slot, task)
    }

    fn enqueue(&self, slot: Slot, task: ShardTask) -> WorkItem {
        let item = WorkItem::new(task);
        lock(&slot).push_back(item.clone());
        if let Some(expiry) = self.expiry {
            schedule_expiry(slot, item.clone(), expiry);
        }
        item
    }

    fn local_slot(&self, shard_id: u32) -> Slot {
        Arc::clone(&self.local.entry(shard_id).or_default())
    }

    /// Pop the oldest global item, claimed or not.
    pub(crate) fn take_global(&self) -> Option<WorkItem> {
        lock(&self.global).pop_front()
    }

    /// Pop the oldest item queued for `shard_id`. Never instantiates the
    /// shard's queue.
    pub(crate) fn take_for_shard(&self, shard_id: u32) -> Option<WorkItem> {
        let slot = self.local.get(&shard_id).map(|entry| Arc::clone(&entry))?;
        lock(&slot).pop_front()
    }

    /// Drop a shard's local queue, returning how many items it still held.
    /// The items themselves are left to their expiry timers.
    pub(crate) fn discard_shard(&self, shard_id: u32) -> usize {
        self.local
            .remove(&shard_id)
            .map(|(_, slot)| lock(&slot).len())
            .unwrap_or(0)
    }

    #[must_use]
    pub fn global_depth(&self) -> usize {
        lock(&self.global).len()
    }

    #[must_use]
    pub fn shard_depth(&self, shard_id: u32) -> usize {
        self.local
            .get(&shard_id)
            .map(|slot| lock(&slot).len())
            .unwrap_or(0)
    }
}

/// Independent per-item timer: if the item is still waiting when it fires,
/// transition to EXPIRED and pull it out of whatever queue holds it so it
/// can never be processed afterwards.
fn schedule_expiry(slot: Slot, item: WorkItem, expiry: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(expiry).await;
        if item.expire() {
            lock(&slot).retain(|queued| queued.id() != item.id());
            debug!(item = item.id(), "work item expired before being claimed");
        }
    });
}
