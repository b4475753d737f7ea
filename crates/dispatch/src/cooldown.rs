//! Per-user command cooldowns.
//!
//! Cooldowns are tracked per (command, user) pair and, within a pair, per
//! scope: the same user can be cooling down in one server while free to
//! invoke in another or in DMs. A window produces exactly one user-visible
//! notice; further attempts inside it are blocked silently until expiry.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use dashmap::DashMap;

use herald_common::{CommandId, ScopeId, UserId};

/// Cooldown bucket an invocation counts against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CooldownScope {
    /// Direct-context (DM) invocations.
    Direct,
    /// Invocations from one server.
    Server(ScopeId),
}

/// Outcome of a cooldown check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownVerdict {
    Allowed,
    /// First blocked attempt in this window; notify the user once.
    BlockedNotify { remaining_secs: u64 },
    /// Later blocked attempt; stay silent.
    BlockedSilent { remaining_secs: u64 },
}

#[derive(Debug, Clone, Copy)]
struct CooldownEntry {
    started: Instant,
    notified: bool,
}

/// Read-only view of one cooldown entry, for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct CooldownSnapshot {
    pub started: Instant,
    pub notified: bool,
}

/// Tracks cooldown state for every (command, user) pair.
///
/// The table is a concurrent map with per-key invariants only; entries for
/// different pairs never interact, so no coarse lock is needed.
#[derive(Debug, Default)]
pub struct RateLimiter {
    records: DashMap<(CommandId, UserId), HashMap<CooldownScope, CooldownEntry>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an invocation attempt and decide whether it may proceed.
    pub fn attempt(
        &self,
        command: CommandId,
        user: UserId,
        scope: CooldownScope,
        cooldown: Duration,
    ) -> CooldownVerdict {
        self.attempt_at(command, user, scope, cooldown, Instant::now())
    }

    fn attempt_at(
        &self,
        command: CommandId,
        user: UserId,
        scope: CooldownScope,
        cooldown: Duration,
        now: Instant,
    ) -> CooldownVerdict {
        let mut scopes = self.records.entry((command, user)).or_default();
        let fresh = CooldownEntry {
            started: now,
            notified: false,
        };
        let Some(entry) = scopes.get(&scope).copied() else {
            scopes.insert(scope, fresh);
            return CooldownVerdict::Allowed;
        };

        let deadline = entry.started + cooldown;
        if now >= deadline {
            // Window elapsed: drop the entry and start a fresh one.
            scopes.insert(scope, fresh);
            return CooldownVerdict::Allowed;
        }

        let remaining_secs = (deadline - now).as_secs();
        if entry.notified {
            CooldownVerdict::BlockedSilent { remaining_secs }
        } else {
            scopes.insert(scope, CooldownEntry {
                notified: true,
                ..entry
            });
            CooldownVerdict::BlockedNotify { remaining_secs }
        }
    }

    /// Raw cooldown record for one (command, user) pair, read-only.
    #[must_use]
    pub fn get(
        &self,
        command: CommandId,
        user: UserId,
    ) -> Option<HashMap<CooldownScope, CooldownSnapshot>> {
        self.records.get(&(command, user)).map(|scopes| {
            scopes
                .iter()
                .map(|(scope, entry)| {
                    (*scope, CooldownSnapshot {
                        started: entry.started,
                        notified: entry.notified,
                    })
                })
                .collect()
        })
    }
}
