use serde_json::Value;

use crate::ids::{InteractionId, RemoteId, Scope, ScopeId, UserId};

/// One inbound command invocation from the remote platform.
///
/// Carries just enough identity to resolve the command (remote id when the
/// platform supplied one, name plus origin scope otherwise) and to key the
/// rate limiter.
#[derive(Debug, Clone)]
pub struct Interaction {
    pub id: InteractionId,
    /// Invoked command name.
    pub command: String,
    /// Remote command id, when the platform included one.
    pub remote_command_id: Option<RemoteId>,
    pub user: UserId,
    /// Originating server, `None` for direct-context invocations.
    pub server: Option<ScopeId>,
    /// Raw argument payload as supplied by the platform.
    pub args: Value,
}

impl Interaction {
    #[must_use]
    pub fn new(id: InteractionId, command: impl Into<String>, user: UserId) -> Self {
        Self {
            id,
            command: command.into(),
            remote_command_id: None,
            user,
            server: None,
            args: Value::Null,
        }
    }

    #[must_use]
    pub fn from_server(mut self, server: ScopeId) -> Self {
        self.server = Some(server);
        self
    }

    #[must_use]
    pub fn with_remote_command(mut self, id: RemoteId) -> Self {
        self.remote_command_id = Some(id);
        self
    }

    #[must_use]
    pub fn with_args(mut self, args: Value) -> Self {
        self.args = args;
        self
    }

    /// Catalog scope this invocation originated from.
    #[must_use]
    pub fn scope(&self) -> Scope {
        self.server.map_or(Scope::Global, Scope::Server)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_context_maps_to_global_scope() {
        let interaction = Interaction::new(InteractionId(1), "ping", UserId(7));
        assert_eq!(interaction.scope(), Scope::Global);
    }

    #[test]
    fn server_origin_maps_to_server_scope() {
        let interaction =
            Interaction::new(InteractionId(1), "ping", UserId(7)).from_server(ScopeId(42));
        assert_eq!(interaction.scope(), Scope::Server(ScopeId(42)));
    }
}
