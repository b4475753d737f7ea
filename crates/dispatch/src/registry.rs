//! In-memory command catalog.
//!
//! Commands are indexed three ways: by process-unique internal id, by the
//! id the remote platform assigned (rebuilt wholesale by [`reindex`], grown
//! lazily during live traffic), and by name within a namespace. Global
//! commands share one namespace; server-scoped commands share one per
//! scope id.
//!
//! [`reindex`]: CommandRegistry::reindex

use std::sync::Arc;

use {
    dashmap::{DashMap, mapref::entry::Entry},
    tracing::{debug, info},
};

use herald_common::{CatalogClient, Command, CommandId, RemoteId, Scope, ScopeId};

use crate::error::{Error, Result};

/// One command name within one namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct NameKey {
    name: String,
    scope: Option<ScopeId>,
}

/// Concurrent catalog of declared commands.
#[derive(Default)]
pub struct CommandRegistry {
    by_id: DashMap<CommandId, Arc<Command>>,
    by_remote: DashMap<RemoteId, CommandId>,
    by_name: DashMap<NameKey, CommandId>,
}

impl CommandRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command, enforcing name uniqueness per namespace.
    pub fn add(&self, command: Command) -> Result<Arc<Command>> {
        let command = Arc::new(command);
        let keys: Vec<NameKey> = if command.is_global() {
            vec![NameKey {
                name: command.name().to_string(),
                scope: None,
            }]
        } else {
            command
                .scope_ids()
                .iter()
                .map(|scope| NameKey {
                    name: command.name().to_string(),
                    scope: Some(*scope),
                })
                .collect()
        };

        let mut claimed: Vec<NameKey> = Vec::with_capacity(keys.len());
        for key in keys {
            // The entry guard must drop before any other access to the map.
            let taken = match self.by_name.entry(key.clone()) {
                Entry::Occupied(_) => false,
                Entry::Vacant(vacancy) => {
                    vacancy.insert(command.id());
                    true
                },
            };
            if !taken {
                // Roll back the namespaces claimed so far.
                for key in claimed {
                    self.by_name.remove(&key);
                }
                return Err(Error::DuplicateName {
                    name: key.name,
                    scope: key.scope.map_or(Scope::Global, Scope::Server),
                });
            }
            claimed.push(key);
        }
        self.by_id.insert(command.id(), Arc::clone(&command));
        debug!(command = %command.name(), id = %command.id(), "command registered");
        Ok(command)
    }

    /// Remove a command, dropping every index pointing at it.
    pub fn remove(&self, id: CommandId) -> Option<Arc<Command>> {
        let (_, command) = self.by_id.remove(&id)?;
        self.by_name.retain(|_, v| *v != id);
        self.by_remote.retain(|_, v| *v != id);
        Some(command)
    }

    #[must_use]
    pub fn by_internal_id(&self, id: CommandId) -> Option<Arc<Command>> {
        self.by_id.get(&id).map(|c| Arc::clone(&c))
    }

    #[must_use]
    pub fn by_remote_id(&self, id: RemoteId) -> Option<Arc<Command>> {
        let internal = self.by_remote.get(&id).map(|entry| *entry)?;
        self.by_internal_id(internal)
    }

    /// Look up by name. A scope match takes precedence over a global one.
    #[must_use]
    pub fn by_name(&self, name: &str, scope: Option<ScopeId>) -> Option<Arc<Command>> {
        if let Some(scope) = scope {
            let key = NameKey {
                name: name.to_string(),
                scope: Some(scope),
            };
            if let Some(entry) = self.by_name.get(&key) {
                return self.by_internal_id(*entry);
            }
        }
        let key = NameKey {
            name: name.to_string(),
            scope: None,
        };
        let entry = self.by_name.get(&key)?;
        self.by_internal_id(*entry)
    }

    /// Resolve an inbound invocation.
    ///
    /// A remote-index hit is O(1). On a miss the name+scope lookup is used
    /// and, when the platform supplied a remote id, recorded into the index
    /// so the next invocation resolves directly.
    #[must_use]
    pub fn resolve(
        &self,
        remote_id: Option<RemoteId>,
        name: &str,
        scope: Option<ScopeId>,
    ) -> Option<Arc<Command>> {
        if let Some(remote) = remote_id
            && let Some(command) = self.by_remote_id(remote)
        {
            return Some(command);
        }
        let command = self.by_name(name, scope)?;
        if let Some(remote) = remote_id {
            self.by_remote.insert(remote, command.id());
            debug!(command = %command.name(), remote = %remote, "remote id learned from live traffic");
        }
        Some(command)
    }

    /// Record one remote-id mapping (used as reconciliation ops complete).
    pub fn map_remote(&self, remote_id: RemoteId, command_id: CommandId) {
        self.by_remote.insert(remote_id, command_id);
    }

    /// Forget one remote-id mapping.
    pub fn unmap_remote(&self, remote_id: RemoteId) {
        self.by_remote.remove(&remote_id);
    }

    /// Rebuild the remote index from the live catalog.
    ///
    /// The index is cleared first and rebuilt from scratch — never merged —
    /// so catalog churn cannot leave stale cross-mappings behind. Fails
    /// without touching anything when no shard connection is online, since
    /// there is nothing to reconcile against.
    pub async fn reindex(&self, client: &dyn CatalogClient) -> Result<()> {
        if client.connected_shards().is_empty() {
            return Err(Error::NoShardsOnline);
        }
        self.by_remote.clear();

        let mut scopes = vec![Scope::Global];
        let mut seen: Vec<ScopeId> = Vec::new();
        for command in self.by_id.iter() {
            for scope in command.scope_ids() {
                if !seen.contains(scope) {
                    seen.push(*scope);
                    scopes.push(Scope::Server(*scope));
                }
            }
        }

        for scope in scopes {
            let remote = client.list_commands(scope).await?;
            let scope_id = match scope {
                Scope::Global => None,
                Scope::Server(id) => Some(id),
            };
            for entry in remote {
                if let Some(command) = self.by_name(&entry.name, scope_id) {
                    self.by_remote.insert(entry.id, command.id());
                }
            }
        }
        info!(mapped = self.by_remote.len(), "remote command index rebuilt");
        Ok(())
    }

    /// Snapshot of every registered command.
    #[must_use]
    pub fn commands(&self) -> Vec<Arc<Command>> {
        self.by_id.iter().map(|entry| Arc::clone(&entry)).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
