//! Units of shard-routed work with an observable status lifecycle.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

use {
    futures::future::BoxFuture,
    serde::{Deserialize, Serialize},
    tokio::sync::watch,
};

use crate::pool::ShardConnection;

/// Lifecycle status of a [`WorkItem`].
///
/// The lattice is forward-only: `Waiting → Processing → Finished`, or
/// `Waiting → Stopped` / `Waiting → Expired`. No transition leaves a
/// terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Waiting,
    Processing,
    Stopped,
    Expired,
    Finished,
}

impl Status {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Expired | Self::Finished)
    }
}

/// Payload executed against the connection of the shard that claims it.
pub type ShardTask = Box<dyn FnOnce(Arc<dyn ShardConnection>) -> BoxFuture<'static, ()> + Send>;

/// Callback invoked at every status transition.
pub type StatusListener = Box<dyn Fn(Status) + Send + Sync>;

static NEXT_ITEM_ID: AtomicU64 = AtomicU64::new(1);

struct ItemState {
    status: Status,
    task: Option<ShardTask>,
}

struct Inner {
    id: u64,
    state: Mutex<ItemState>,
    status_tx: watch::Sender<Status>,
    listeners: Mutex<Vec<StatusListener>>,
}

/// Handle to one enqueued unit of work. Cloning shares the same item.
#[derive(Clone)]
pub struct WorkItem {
    inner: Arc<Inner>,
}

impl WorkItem {
    pub(crate) fn new(task: ShardTask) -> Self {
        let (status_tx, _) = watch::channel(Status::Waiting);
        Self {
            inner: Arc::new(Inner {
                id: NEXT_ITEM_ID.fetch_add(1, Ordering::Relaxed),
                state: Mutex::new(ItemState {
                    status: Status::Waiting,
                    task: Some(task),
                }),
                status_tx,
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.inner.id
    }

    #[must_use]
    pub fn status(&self) -> Status {
        self.lock_state().status
    }

    /// Register a listener invoked at every subsequent status transition.
    pub fn on_status(&self, listener: impl Fn(Status) + Send + Sync + 'static) {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Box::new(listener));
    }

    /// Resolves at the first terminal status; immediately if already there.
    pub async fn completed(&self) -> Status {
        let mut rx = self.inner.status_tx.subscribe();
        match rx.wait_for(|status| status.is_terminal()).await {
            Ok(status) => *status,
            // The sender lives as long as this handle, so this arm only
            // covers a race with the very last transition.
            Err(_) => self.status(),
        }
    }

    /// Cancel a waiting item. Returns true on the `Waiting → Stopped`
    /// transition; false if the item was already claimed or terminal.
    pub fn cancel(&self) -> bool {
        self.transition_from_waiting(Status::Stopped)
    }

    /// Expire a waiting item; same rules as [`cancel`](Self::cancel).
    pub(crate) fn expire(&self) -> bool {
        self.transition_from_waiting(Status::Expired)
    }

    /// Claim the item for processing, handing back its payload.
    ///
    /// This is the only place cancellation and expiry are observed: an item
    /// in any terminal state yields `None` and must be dropped unprocessed.
    pub(crate) fn claim(&self) -> Option<ShardTask> {
        let task = {
            let mut state = self.lock_state();
            if state.status != Status::Waiting {
                return None;
            }
            state.status = Status::Processing;
            state.task.take()
        };
        self.notify(Status::Processing);
        task
    }

    /// Mark a processing item finished.
    pub(crate) fn finish(&self) {
        {
            let mut state = self.lock_state();
            if state.status != Status::Processing {
                return;
            }
            state.status = Status::Finished;
        }
        self.notify(Status::Finished);
    }

    fn transition_from_waiting(&self, to: Status) -> bool {
        {
            let mut state = self.lock_state();
            if state.status != Status::Waiting {
                return false;
            }
            state.status = to;
            state.task = None;
        }
        self.notify(to);
        true
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ItemState> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn notify(&self, status: Status) {
        self.inner.status_tx.send_replace(status);
        let listeners = self.inner.listeners.lock().unwrap_or_else(|e| e.into_inner());
        for listener in listeners.iter() {
            listener(status);
        }
    }
}

impl std::fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkItem")
            .field("id", &self.inner.id)
            .field("status", &self.status())
            .finish()
    }
}
