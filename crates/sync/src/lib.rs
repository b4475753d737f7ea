//! Catalog synchronization for herald.
//!
//! Diffs the locally declared command catalog against the remotely hosted
//! one, per scope and down through the recursive option trees, and issues
//! create/update/delete reconciliation work routed to the shard that owns
//! each scope.

pub mod affinity;
pub mod diff;
pub mod error;
pub mod modes;
pub mod synchronizer;

pub use {
    affinity::shard_index,
    diff::{CatalogDiff, diff_catalog},
    error::{Error, Result},
    modes::ReconcileMode,
    synchronizer::{ReconcileOutcome, SyncBatch, SyncReport, Synchronizer},
};
