//! Reconciliation of the local catalog against the remote one.
//!
//! Destructive synchronization overwrites whole partitions; the
//! non-destructive path observes drift per scope and acts only on the
//! candidate sets its [`ReconcileMode`] enables. All remote work travels
//! as [`WorkItem`]s routed by [`shard_index`], so each scope's operations
//! execute on the shard that owns it.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use {
    futures::future::join_all,
    tracing::{debug, error, info, warn},
};

use {
    herald_common::{CatalogClient, Command, CommandSpec, RemoteCommand, Scope, ScopeId},
    herald_dispatch::CommandRegistry,
    herald_shards::{ShardConnection, ShardTask, Status, WorkItem, WorkQueue},
};

use crate::{
    affinity::shard_index,
    diff::{CatalogDiff, diff_catalog},
    error::{Error, Result},
    modes::ReconcileMode,
};

/// Aggregate outcome of one batch of reconciliation work.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// Partitions whose WorkItem ran to completion (the operation itself
    /// may still have failed remotely; see `failed`).
    pub finished: usize,
    /// Partitions that expired before any shard claimed them.
    pub expired: usize,
    /// Partitions cancelled before processing.
    pub stopped: usize,
    /// Operations that reached the remote catalog and were rejected, plus
    /// scopes whose listing could not be fetched.
    pub failed: usize,
}

/// Handle over one batch of enqueued reconciliation WorkItems.
///
/// Each partition carries its own completion signal; waiting on the batch
/// is the conjunction of them all. A failing partition never blocks or
/// rolls back its siblings.
pub struct SyncBatch {
    items: Vec<(Scope, WorkItem)>,
    failures: Arc<AtomicUsize>,
}

impl SyncBatch {
    #[must_use]
    pub fn items(&self) -> &[(Scope, WorkItem)] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Resolve once every partition reaches a terminal status.
    pub async fn wait(self) -> SyncReport {
        let statuses = join_all(self.items.iter().map(|(_, item)| item.completed())).await;
        let mut report = SyncReport {
            failed: self.failures.load(Ordering::Relaxed),
            ..SyncReport::default()
        };
        for status in statuses {
            match status {
                Status::Finished => report.finished += 1,
                Status::Expired => report.expired += 1,
                Status::Stopped => report.stopped += 1,
                Status::Waiting | Status::Processing => {},
            }
        }
        report
    }
}

/// Outcome of a non-destructive reconciliation pass.
pub struct ReconcileOutcome {
    /// What drifted, per scope, whether or not it was acted upon.
    pub diffs: Vec<(Scope, CatalogDiff)>,
    /// The work enqueued for the candidate sets the mode enables.
    pub batch: SyncBatch,
}

/// Diffs the declared catalog against the remote one and enqueues
/// corrective work.
pub struct Synchronizer {
    registry: Arc<CommandRegistry>,
    client: Arc<dyn CatalogClient>,
    queue: Arc<WorkQueue>,
    mode: ReconcileMode,
}

impl Synchronizer {
    #[must_use]
    pub fn new(
        registry: Arc<CommandRegistry>,
        client: Arc<dyn CatalogClient>,
        queue: Arc<WorkQueue>,
    ) -> Self {
        Self {
            registry,
            client,
            queue,
            mode: ReconcileMode::full(),
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: ReconcileMode) -> Self {
        self.mode = mode;
        self
    }

    /// Overwrite every partition of the remote catalog with the declared
    /// one: one bulk overwrite for the global set, one per scope, each
    /// routed to the shard that owns it.
    pub fn synchronize(&self, total_shards: u32) -> Result<SyncBatch> {
        if total_shards == 0 {
            return Err(Error::InvalidShardCount);
        }
        let (global, scoped) = self.partitions();
        let failures = Arc::new(AtomicUsize::new(0));
        let mut items = Vec::with_capacity(scoped.len() + 1);

        let item = self
            .queue
            .queue_global(self.overwrite_task(Scope::Global, global, &failures));
        items.push((Scope::Global, item));

        for (scope_id, commands) in scoped {
            let scope = Scope::Server(scope_id);
            let shard = shard_index(scope_id, total_shards);
            let item = self
                .queue
                .queue_for_shard(shard, self.overwrite_task(scope, commands, &failures));
            debug!(%scope, shard, "bulk overwrite enqueued");
            items.push((scope, item));
        }
        Ok(SyncBatch { items, failures })
    }

    /// Create-or-update one command in every scope it is declared in.
    pub fn upsert(&self, command: &Arc<Command>, total_shards: u32) -> Result<SyncBatch> {
        if total_shards == 0 {
            return Err(Error::InvalidShardCount);
        }
        let failures = Arc::new(AtomicUsize::new(0));
        let mut items = Vec::new();
        for scope in command_scopes(command) {
            let task = self.upsert_task(scope, Arc::clone(command), &failures);
            items.push((scope, self.route(scope, total_shards, task)));
        }
        Ok(SyncBatch { items, failures })
    }

    /// Delete one command from every scope it is declared in.
    pub fn delete(&self, command: &Arc<Command>, total_shards: u32) -> Result<SyncBatch> {
        if total_shards == 0 {
            return Err(Error::InvalidShardCount);
        }
        let failures = Arc::new(AtomicUsize::new(0));
        let mut items = Vec::new();
        for scope in command_scopes(command) {
            let task = self.delete_by_name_task(scope, Arc::clone(command), &failures);
            items.push((scope, self.route(scope, total_shards, task)));
        }
        Ok(SyncBatch { items, failures })
    }

    /// Compute the diff for one scope without acting on it.
    pub async fn observe(&self, scope: Scope) -> Result<CatalogDiff> {
        let local = self.local_for(scope);
        let remote = self.client.list_commands(scope).await?;
        Ok(diff_catalog(&local, &remote))
    }

    /// Observe every scope and enqueue corrective work for the candidate
    /// sets the mode enables; disabled sets are only logged. A scope whose
    /// listing cannot be fetched is skipped and counted as failed; it
    /// never aborts its siblings.
    pub async fn reconcile(&self, total_shards: u32) -> Result<ReconcileOutcome> {
        if total_shards == 0 {
            return Err(Error::InvalidShardCount);
        }
        let failures = Arc::new(AtomicUsize::new(0));
        let mut items = Vec::new();
        let mut diffs = Vec::new();

        let mut scopes = vec![Scope::Global];
        scopes.extend(self.declared_scopes().into_iter().map(Scope::Server));

        for scope in scopes {
            let local = self.local_for(scope);
            let remote = match self.client.list_commands(scope).await {
                Ok(remote) => remote,
                Err(e) => {
                    failures.fetch_add(1, Ordering::Relaxed);
                    warn!(%scope, "scope skipped, remote listing failed: {e}");
                    continue;
                },
            };
            let diff = diff_catalog(&local, &remote);
            if !diff.is_empty() {
                info!(
                    %scope,
                    create = diff.missing_remote.len(),
                    update = diff.changed.len(),
                    delete = diff.missing_local.len(),
                    "catalog drift observed"
                );
            }

            if self.mode.create {
                for command in &diff.missing_remote {
                    let task = self.create_task(scope, Arc::clone(command), &failures);
                    items.push((scope, self.route(scope, total_shards, task)));
                }
            } else if !diff.missing_remote.is_empty() {
                info!(%scope, count = diff.missing_remote.len(), "create candidates left alone");
            }

            if self.mode.update {
                for (command, rc) in &diff.changed {
                    let task = self.update_task(scope, Arc::clone(command), rc.clone(), &failures);
                    items.push((scope, self.route(scope, total_shards, task)));
                }
            } else if !diff.changed.is_empty() {
                info!(%scope, count = diff.changed.len(), "update candidates left alone");
            }

            if self.mode.delete {
                for rc in &diff.missing_local {
                    let task = self.delete_remote_task(scope, rc.clone(), &failures);
                    items.push((scope, self.route(scope, total_shards, task)));
                }
            } else if !diff.missing_local.is_empty() {
                info!(%scope, count = diff.missing_local.len(), "delete candidates left alone");
            }

            diffs.push((scope, diff));
        }

        Ok(ReconcileOutcome {
            diffs,
            batch: SyncBatch { items, failures },
        })
    }

    // ── Partitioning ─────────────────────────────────────────────────

    fn partitions(&self) -> (Vec<Arc<Command>>, Vec<(ScopeId, Vec<Arc<Command>>)>) {
        let mut global = Vec::new();
        let mut scoped: Vec<(ScopeId, Vec<Arc<Command>>)> = Vec::new();
        for command in self.registry.commands() {
            if command.is_global() {
                global.push(command);
                continue;
            }
            for scope in command.scope_ids() {
                match scoped.iter_mut().find(|(id, _)| *id == *scope) {
                    Some((_, commands)) => commands.push(Arc::clone(&command)),
                    None => scoped.push((*scope, vec![Arc::clone(&command)])),
                }
            }
        }
        (global, scoped)
    }

    fn declared_scopes(&self) -> Vec<ScopeId> {
        let mut scopes = Vec::new();
        for command in self.registry.commands() {
            for scope in command.scope_ids() {
                if !scopes.contains(scope) {
                    scopes.push(*scope);
                }
            }
        }
        scopes
    }

    fn local_for(&self, scope: Scope) -> Vec<Arc<Command>> {
        self.registry
            .commands()
            .into_iter()
            .filter(|command| match scope {
                Scope::Global => command.is_global(),
                Scope::Server(id) => command.scope_ids().contains(&id),
            })
            .collect()
    }

    fn route(&self, scope: Scope, total_shards: u32, task: ShardTask) -> WorkItem {
        match scope {
            Scope::Global => self.queue.queue_global(task),
            Scope::Server(id) => self
                .queue
                .queue_for_shard(shard_index(id, total_shards), task),
        }
    }

    // ── Payloads ─────────────────────────────────────────────────────

    fn overwrite_task(
        &self,
        scope: Scope,
        commands: Vec<Arc<Command>>,
        failures: &Arc<AtomicUsize>,
    ) -> ShardTask {
        let client = Arc::clone(&self.client);
        let registry = Arc::clone(&self.registry);
        let failures = Arc::clone(failures);
        Box::new(move |conn| {
            Box::pin(async move {
                let specs: Vec<CommandSpec> =
                    commands.iter().map(|c| CommandSpec::from(c.as_ref())).collect();
                match client.bulk_overwrite(scope, &specs).await {
                    Ok(remote_ids) => {
                        // Assigned ids come back in spec order.
                        for (command, remote_id) in commands.iter().zip(remote_ids) {
                            registry.map_remote(remote_id, command.id());
                        }
                        info!(
                            shard = conn.shard_id(),
                            %scope,
                            count = specs.len(),
                            "catalog partition overwritten"
                        );
                    },
                    Err(e) => {
                        failures.fetch_add(1, Ordering::Relaxed);
                        error!(shard = conn.shard_id(), %scope, "bulk overwrite failed: {e}");
                    },
                }
            })
        })
    }

    fn create_task(
        &self,
        scope: Scope,
        command: Arc<Command>,
        failures: &Arc<AtomicUsize>,
    ) -> ShardTask {
        let client = Arc::clone(&self.client);
        let registry = Arc::clone(&self.registry);
        let failures = Arc::clone(failures);
        Box::new(move |conn| {
            Box::pin(async move {
                let spec = CommandSpec::from(command.as_ref());
                match client.create(scope, &spec).await {
                    Ok(remote_id) => {
                        registry.map_remote(remote_id, command.id());
                        info!(shard = conn.shard_id(), %scope, command = %command.name(), "command created");
                    },
                    Err(e) => {
                        failures.fetch_add(1, Ordering::Relaxed);
                        error!(shard = conn.shard_id(), %scope, command = %command.name(), "create failed: {e}");
                    },
                }
            })
        })
    }

    fn update_task(
        &self,
        scope: Scope,
        command: Arc<Command>,
        remote: RemoteCommand,
        failures: &Arc<AtomicUsize>,
    ) -> ShardTask {
        let client = Arc::clone(&self.client);
        let registry = Arc::clone(&self.registry);
        let failures = Arc::clone(failures);
        Box::new(move |conn| {
            Box::pin(async move {
                let spec = CommandSpec::from(command.as_ref());
                match client.update(scope, remote.id, &spec).await {
                    Ok(()) => {
                        registry.map_remote(remote.id, command.id());
                        info!(shard = conn.shard_id(), %scope, command = %command.name(), "command updated");
                    },
                    Err(e) => {
                        failures.fetch_add(1, Ordering::Relaxed);
                        error!(shard = conn.shard_id(), %scope, command = %command.name(), "update failed: {e}");
                    },
                }
            })
        })
    }

    fn delete_remote_task(
        &self,
        scope: Scope,
        remote: RemoteCommand,
        failures: &Arc<AtomicUsize>,
    ) -> ShardTask {
        let client = Arc::clone(&self.client);
        let registry = Arc::clone(&self.registry);
        let failures = Arc::clone(failures);
        Box::new(move |conn| {
            Box::pin(async move {
                match client.delete(scope, remote.id).await {
                    Ok(()) => {
                        registry.unmap_remote(remote.id);
                        info!(shard = conn.shard_id(), %scope, command = %remote.name, "command deleted");
                    },
                    Err(e) => {
                        failures.fetch_add(1, Ordering::Relaxed);
                        error!(shard = conn.shard_id(), %scope, command = %remote.name, "delete failed: {e}");
                    },
                }
            })
        })
    }

    /// Resolve create-vs-update against one listing of the scope. The
    /// remote index only maps remote→internal, so the listing is the
    /// source of truth for the target id, the same self-healing approach
    /// live resolution uses.
    fn upsert_task(
        &self,
        scope: Scope,
        command: Arc<Command>,
        failures: &Arc<AtomicUsize>,
    ) -> ShardTask {
        let client = Arc::clone(&self.client);
        let registry = Arc::clone(&self.registry);
        let failures = Arc::clone(failures);
        Box::new(move |conn| {
            Box::pin(async move {
                let spec = CommandSpec::from(command.as_ref());
                let result = async {
                    let existing = client.list_commands(scope).await?;
                    match existing.iter().find(|rc| rc.name == command.name()) {
                        Some(rc) => {
                            client.update(scope, rc.id, &spec).await?;
                            registry.map_remote(rc.id, command.id());
                        },
                        None => {
                            let remote_id = client.create(scope, &spec).await?;
                            registry.map_remote(remote_id, command.id());
                        },
                    }
                    Ok::<(), herald_common::Error>(())
                }
                .await;
                match result {
                    Ok(()) => {
                        info!(shard = conn.shard_id(), %scope, command = %command.name(), "command upserted");
                    },
                    Err(e) => {
                        failures.fetch_add(1, Ordering::Relaxed);
                        error!(shard = conn.shard_id(), %scope, command = %command.name(), "upsert failed: {e}");
                    },
                }
            })
        })
    }

    fn delete_by_name_task(
        &self,
        scope: Scope,
        command: Arc<Command>,
        failures: &Arc<AtomicUsize>,
    ) -> ShardTask {
        let client = Arc::clone(&self.client);
        let registry = Arc::clone(&self.registry);
        let failures = Arc::clone(failures);
        Box::new(move |conn| {
            Box::pin(async move {
                let result = async {
                    let existing = client.list_commands(scope).await?;
                    if let Some(rc) = existing.iter().find(|rc| rc.name == command.name()) {
                        client.delete(scope, rc.id).await?;
                        registry.unmap_remote(rc.id);
                        info!(shard = conn.shard_id(), %scope, command = %command.name(), "command deleted");
                    } else {
                        debug!(%scope, command = %command.name(), "nothing to delete remotely");
                    }
                    Ok::<(), herald_common::Error>(())
                }
                .await;
                if let Err(e) = result {
                    failures.fetch_add(1, Ordering::Relaxed);
                    error!(shard = conn.shard_id(), %scope, command = %command.name(), "delete failed: {e}");
                }
            })
        })
    }
}

/// Scopes a command's reconciliation work targets: its declared scopes, or
/// the global partition for an unscoped command.
fn command_scopes(command: &Command) -> Vec<Scope> {
    if command.is_global() {
        vec![Scope::Global]
    } else {
        command.scope_ids().iter().copied().map(Scope::Server).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use herald_common::ScopeId;
    use herald_shards::ShardQueueConfig;

    use super::*;

    fn command(name: &str) -> Command {
        Command::builder(name, "A test command").build().unwrap()
    }

    fn scoped(name: &str, scope: u64) -> Command {
        Command::builder(name, "A test command")
            .scope(ScopeId(scope))
            .build()
            .unwrap()
    }

    struct NullCatalog;

    #[async_trait::async_trait]
    impl CatalogClient for NullCatalog {
        fn connected_shards(&self) -> Vec<u32> {
            vec![0]
        }

        async fn list_commands(&self, _: Scope) -> herald_common::Result<Vec<RemoteCommand>> {
            Ok(Vec::new())
        }

        async fn bulk_overwrite(
            &self,
            _: Scope,
            specs: &[CommandSpec],
        ) -> herald_common::Result<Vec<herald_common::RemoteId>> {
            Ok((0..specs.len() as u64).map(herald_common::RemoteId).collect())
        }

        async fn create(
            &self,
            _: Scope,
            _: &CommandSpec,
        ) -> herald_common::Result<herald_common::RemoteId> {
            Ok(herald_common::RemoteId(1))
        }

        async fn update(
            &self,
            _: Scope,
            _: herald_common::RemoteId,
            _: &CommandSpec,
        ) -> herald_common::Result<()> {
            Ok(())
        }

        async fn delete(&self, _: Scope, _: herald_common::RemoteId) -> herald_common::Result<()> {
            Ok(())
        }
    }

    fn synchronizer() -> (Arc<CommandRegistry>, Arc<WorkQueue>, Synchronizer) {
        let registry = Arc::new(CommandRegistry::new());
        let queue = Arc::new(WorkQueue::new(&ShardQueueConfig::default()));
        let sync = Synchronizer::new(
            Arc::clone(&registry),
            Arc::new(NullCatalog),
            Arc::clone(&queue),
        );
        (registry, queue, sync)
    }

    #[tokio::test]
    async fn zero_shards_is_rejected() {
        let (_registry, _queue, sync) = synchronizer();
        assert!(matches!(sync.synchronize(0), Err(Error::InvalidShardCount)));
    }

    #[tokio::test]
    async fn synchronize_routes_one_item_per_partition() {
        let (registry, queue, sync) = synchronizer();
        registry.add(command("ping")).unwrap();
        registry.add(scoped("admin", 42)).unwrap();

        let batch = sync.synchronize(4).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(queue.global_depth(), 1);
        let expected_shard = shard_index(ScopeId(42), 4);
        assert_eq!(queue.shard_depth(expected_shard), 1);
    }

    #[tokio::test]
    async fn commands_in_two_scopes_fan_out_per_scope() {
        let (registry, queue, sync) = synchronizer();
        let both = Command::builder("audit", "Audit log")
            .scope(ScopeId(1 << 22))
            .scope(ScopeId(2 << 22))
            .build()
            .unwrap();
        registry.add(both).unwrap();

        let batch = sync.synchronize(4).unwrap();
        // Global partition plus one item per declared scope.
        assert_eq!(batch.len(), 3);
        assert_eq!(queue.global_depth(), 1);
        assert_eq!(queue.shard_depth(1), 1);
        assert_eq!(queue.shard_depth(2), 1);
    }

    #[tokio::test]
    async fn upsert_targets_each_declared_scope() {
        let (registry, queue, sync) = synchronizer();
        let cmd = registry.add(scoped("admin", 5 << 22)).unwrap();

        let batch = sync.upsert(&cmd, 4).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.items()[0].0, Scope::Server(ScopeId(5 << 22)));
        assert_eq!(queue.shard_depth(shard_index(ScopeId(5 << 22), 4)), 1);
        assert_eq!(queue.global_depth(), 0);
    }

    #[tokio::test]
    async fn delete_of_a_global_command_uses_the_global_queue() {
        let (registry, queue, sync) = synchronizer();
        let cmd = registry.add(command("ping")).unwrap();

        let batch = sync.delete(&cmd, 4).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.items()[0].0, Scope::Global);
        assert_eq!(queue.global_depth(), 1);
    }

    #[tokio::test]
    async fn observe_reports_create_candidates() {
        let (registry, _queue, sync) = synchronizer();
        registry.add(command("ping")).unwrap();

        let diff = sync.observe(Scope::Global).await.unwrap();
        assert_eq!(diff.missing_remote.len(), 1);
        assert!(diff.missing_local.is_empty());
    }

    #[tokio::test]
    async fn watchdog_reconcile_enqueues_nothing() {
        let (registry, queue, sync) = synchronizer();
        registry.add(command("ping")).unwrap();
        let sync = sync.with_mode(ReconcileMode::watchdog());

        let outcome = sync.reconcile(4).await.unwrap();
        assert!(outcome.batch.is_empty());
        assert_eq!(outcome.diffs.len(), 1);
        assert_eq!(outcome.diffs[0].1.missing_remote.len(), 1);
        assert_eq!(queue.global_depth(), 0);
    }

    #[tokio::test]
    async fn create_only_reconcile_enqueues_create_work() {
        let (registry, queue, sync) = synchronizer();
        registry.add(command("ping")).unwrap();
        registry.add(scoped("admin", 42)).unwrap();
        let sync = sync.with_mode(ReconcileMode::create_only());

        let outcome = sync.reconcile(4).await.unwrap();
        assert_eq!(outcome.batch.len(), 2);
        assert_eq!(queue.global_depth(), 1);
        assert_eq!(queue.shard_depth(shard_index(ScopeId(42), 4)), 1);
    }
}
