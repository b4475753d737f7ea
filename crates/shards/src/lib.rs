//! Sharded asynchronous work queues for herald.
//!
//! Reconciliation work is routed to the shard that owns a given remote
//! scope. A [`queue::WorkQueue`] holds one global queue plus one queue per
//! shard id; a [`pool::ShardPool`] drives a fixed-delay poll cycle for
//! every online shard, claiming at most one global and one local
//! [`work_item::WorkItem`] per cycle.

pub mod pool;
pub mod queue;
pub mod work_item;

pub use {
    pool::{ShardConnection, ShardPool},
    queue::{ShardQueueConfig, WorkQueue},
    work_item::{ShardTask, Status, WorkItem},
};
