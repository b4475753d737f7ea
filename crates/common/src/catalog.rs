//! Boundary to the host's remote catalog client.
//!
//! The engine never talks to the platform directly: every catalog read and
//! write goes through [`CatalogClient`], implemented by the host on top of
//! its gateway/REST stack. Connection management, request signing, and
//! transport-level retries all live behind this trait.

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
};

use crate::{
    command::Command,
    error::Result,
    ids::{RemoteId, Scope},
    option_tree::CommandOption,
};

/// Wire shape sent when creating or overwriting a remote command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub name: String,
    pub description: String,
    #[serde(default = "default_permission")]
    pub default_permission: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandOption>,
}

impl From<&Command> for CommandSpec {
    fn from(command: &Command) -> Self {
        Self {
            name: command.name().to_string(),
            description: command.description().to_string(),
            default_permission: command.default_permission(),
            options: command.options().to_vec(),
        }
    }
}

/// One command as reported by the remote catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCommand {
    pub id: RemoteId,
    pub name: String,
    pub description: String,
    #[serde(default = "default_permission")]
    pub default_permission: bool,
    #[serde(default)]
    pub options: Vec<CommandOption>,
}

fn default_permission() -> bool {
    true
}

/// Host-implemented client for the remotely hosted command catalog.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Shard ids with a live gateway connection right now.
    fn connected_shards(&self) -> Vec<u32>;

    /// Fetch the full catalog for one scope.
    async fn list_commands(&self, scope: Scope) -> Result<Vec<RemoteCommand>>;

    /// Replace the whole catalog for one scope. Returns the assigned remote
    /// ids in the same order as `specs`.
    async fn bulk_overwrite(&self, scope: Scope, specs: &[CommandSpec]) -> Result<Vec<RemoteId>>;

    async fn create(&self, scope: Scope, spec: &CommandSpec) -> Result<RemoteId>;

    async fn update(&self, scope: Scope, remote_id: RemoteId, spec: &CommandSpec) -> Result<()>;

    async fn delete(&self, scope: Scope, remote_id: RemoteId) -> Result<()>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::option_tree::OptionKind;

    #[test]
    fn spec_from_command_carries_all_fields() {
        let cmd = Command::builder("mark", "Mark a user")
            .default_permission(false)
            .option(CommandOption::new(OptionKind::User, "who", "Target").required())
            .build()
            .unwrap();
        let spec = CommandSpec::from(&cmd);
        assert_eq!(spec.name, "mark");
        assert_eq!(spec.description, "Mark a user");
        assert!(!spec.default_permission);
        assert_eq!(spec.options.len(), 1);
    }

    #[test]
    fn remote_command_defaults_permission_on() {
        let json = serde_json::json!({
            "id": 555,
            "name": "ping",
            "description": "Measure latency",
        });
        let remote: RemoteCommand = serde_json::from_value(json).unwrap();
        assert!(remote.default_permission);
        assert!(remote.options.is_empty());
    }

    #[test]
    fn spec_serializes_without_empty_options() {
        let cmd = Command::builder("ping", "Measure latency").build().unwrap();
        let json = serde_json::to_value(CommandSpec::from(&cmd)).unwrap();
        assert!(json.get("options").is_none());
    }
}
