//! Catalog drift detection.
//!
//! Local and remote commands are matched by name within one scope; a
//! matched pair is compared field by field, descending the option trees
//! recursively. The comparison is a pure fold: every call returns its own
//! verdict and nothing is accumulated through shared state. The remote API
//! only supports whole-command replacement, so a mismatch at any depth
//! marks the whole top-level command as changed; there is no partial
//! patch.

use std::sync::Arc;

use herald_common::{Command, CommandOption, OptionChoice, RemoteCommand};

/// Per-scope reconciliation candidates.
#[derive(Debug, Default)]
pub struct CatalogDiff {
    /// Local commands with no remote counterpart: create candidates.
    pub missing_remote: Vec<Arc<Command>>,
    /// Remote commands with no local counterpart: delete candidates.
    pub missing_local: Vec<RemoteCommand>,
    /// Name-matched pairs whose description, default-permission flag, or
    /// option tree differ: update candidates.
    pub changed: Vec<(Arc<Command>, RemoteCommand)>,
}

impl CatalogDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.missing_remote.is_empty() && self.missing_local.is_empty() && self.changed.is_empty()
    }
}

/// Diff one scope's local catalog against its remote listing.
#[must_use]
pub fn diff_catalog(local: &[Arc<Command>], remote: &[RemoteCommand]) -> CatalogDiff {
    let mut diff = CatalogDiff::default();
    for command in local {
        match remote.iter().find(|rc| rc.name == command.name()) {
            None => diff.missing_remote.push(Arc::clone(command)),
            Some(rc) => {
                if command_changed(command, rc) {
                    diff.changed.push((Arc::clone(command), rc.clone()));
                }
            },
        }
    }
    for rc in remote {
        if !local.iter().any(|command| command.name() == rc.name) {
            diff.missing_local.push(rc.clone());
        }
    }
    diff
}

/// Whole-command comparison for a name-matched pair.
#[must_use]
pub fn command_changed(local: &Command, remote: &RemoteCommand) -> bool {
    local.description() != remote.description
        || local.default_permission() != remote.default_permission
        || options_differ(local.options(), &remote.options)
}

/// Ordered, recursive option-tree comparison.
fn options_differ(local: &[CommandOption], remote: &[CommandOption]) -> bool {
    local.len() != remote.len()
        || local
            .iter()
            .zip(remote)
            .any(|(a, b)| option_differs(a, b))
}

fn option_differs(a: &CommandOption, b: &CommandOption) -> bool {
    !a.name.eq_ignore_ascii_case(&b.name)
        || a.description != b.description
        || a.required != b.required
        || a.kind != b.kind
        || choices_differ(&a.choices, &b.choices)
        || options_differ(&a.children, &b.children)
}

fn choices_differ(a: &[OptionChoice], b: &[OptionChoice]) -> bool {
    a.len() != b.len()
        || a.iter()
            .zip(b)
            .any(|(x, y)| x.name != y.name || x.value != y.value)
}
