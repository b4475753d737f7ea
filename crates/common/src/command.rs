//! Declared commands and the validating builder that constructs them.
//!
//! A [`Command`] can only be obtained through [`CommandBuilder::build`],
//! which checks the metadata the remote platform would reject (missing or
//! malformed names and descriptions, malformed option trees) so that
//! misconfiguration surfaces at registration, not at first invocation.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{
    error::{Error, Result},
    ids::{CommandId, ScopeId},
    interaction::Interaction,
    option_tree::CommandOption,
};

/// Remote platforms cap command and option names at 32 characters.
pub const MAX_NAME_LEN: usize = 32;
/// Remote platforms cap descriptions at 100 characters.
pub const MAX_DESCRIPTION_LEN: usize = 100;

/// Host-authored behavior run when an invocation passes the pipeline.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn run(&self, interaction: &Interaction) -> anyhow::Result<()>;
}

/// A locally declared, remotely invokable command.
#[derive(Clone)]
pub struct Command {
    id: CommandId,
    name: String,
    description: String,
    cooldown: Duration,
    default_permission: bool,
    options: Vec<CommandOption>,
    scope_ids: Vec<ScopeId>,
    middleware: Vec<String>,
    afterware: Vec<String>,
    handler: Option<Arc<dyn CommandHandler>>,
}

impl Command {
    #[must_use]
    pub fn builder(name: impl Into<String>, description: impl Into<String>) -> CommandBuilder {
        CommandBuilder {
            name: name.into(),
            description: description.into(),
            cooldown: Duration::ZERO,
            default_permission: true,
            options: Vec::new(),
            scope_ids: Vec::new(),
            middleware: Vec::new(),
            afterware: Vec::new(),
            handler: None,
        }
    }

    #[must_use]
    pub fn id(&self) -> CommandId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    #[must_use]
    pub fn default_permission(&self) -> bool {
        self.default_permission
    }

    #[must_use]
    pub fn options(&self) -> &[CommandOption] {
        &self.options
    }

    /// Scopes this command is declared in; empty means global.
    #[must_use]
    pub fn scope_ids(&self) -> &[ScopeId] {
        &self.scope_ids
    }

    #[must_use]
    pub fn is_global(&self) -> bool {
        self.scope_ids.is_empty()
    }

    /// Ordered middleware names run before the handler.
    #[must_use]
    pub fn middleware(&self) -> &[String] {
        &self.middleware
    }

    /// Ordered afterware names run after the handler.
    #[must_use]
    pub fn afterware(&self) -> &[String] {
        &self.afterware
    }

    #[must_use]
    pub fn handler(&self) -> Option<&Arc<dyn CommandHandler>> {
        self.handler.as_ref()
    }
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("description", &self.description)
            .field("cooldown", &self.cooldown)
            .field("default_permission", &self.default_permission)
            .field("options", &self.options)
            .field("scope_ids", &self.scope_ids)
            .field("middleware", &self.middleware)
            .field("afterware", &self.afterware)
            .field("handler", &self.handler.as_ref().map(|_| "..."))
            .finish()
    }
}

/// Builder for [`Command`]. Validation happens once, in [`build`].
///
/// [`build`]: CommandBuilder::build
pub struct CommandBuilder {
    name: String,
    description: String,
    cooldown: Duration,
    default_permission: bool,
    options: Vec<CommandOption>,
    scope_ids: Vec<ScopeId>,
    middleware: Vec<String>,
    afterware: Vec<String>,
    handler: Option<Arc<dyn CommandHandler>>,
}

impl CommandBuilder {
    /// Per-user cooldown between invocations; zero disables it.
    #[must_use]
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    #[must_use]
    pub fn default_permission(mut self, enabled: bool) -> Self {
        self.default_permission = enabled;
        self
    }

    #[must_use]
    pub fn option(mut self, option: CommandOption) -> Self {
        self.options.push(option);
        self
    }

    /// Declare the command in one server scope. May be called repeatedly;
    /// a command with no scopes is global.
    #[must_use]
    pub fn scope(mut self, scope: ScopeId) -> Self {
        if !self.scope_ids.contains(&scope) {
            self.scope_ids.push(scope);
        }
        self
    }

    #[must_use]
    pub fn middleware(mut self, name: impl Into<String>) -> Self {
        self.middleware.push(name.into());
        self
    }

    #[must_use]
    pub fn afterware(mut self, name: impl Into<String>) -> Self {
        self.afterware.push(name.into());
        self
    }

    #[must_use]
    pub fn handler(mut self, handler: Arc<dyn CommandHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Validate the declaration and allocate its process-unique id.
    pub fn build(self) -> Result<Command> {
        validate_name("command name", &self.name)?;
        validate_description("command", &self.name, &self.description)?;
        validate_options(&self.name, &self.options)?;
        Ok(Command {
            id: CommandId::allocate(),
            name: self.name,
            description: self.description,
            cooldown: self.cooldown,
            default_permission: self.default_permission,
            options: self.options,
            scope_ids: self.scope_ids,
            middleware: self.middleware,
            afterware: self.afterware,
            handler: self.handler,
        })
    }
}

fn validate_name(what: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_command(format!("{what} is empty")));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(Error::invalid_command(format!(
            "{what} {name:?} exceeds {MAX_NAME_LEN} characters"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
    {
        return Err(Error::invalid_command(format!(
            "{what} {name:?} must be lowercase with no spaces"
        )));
    }
    Ok(())
}

fn validate_description(what: &str, name: &str, description: &str) -> Result<()> {
    if description.is_empty() {
        return Err(Error::invalid_command(format!(
            "{what} {name:?} has an empty description"
        )));
    }
    if description.len() > MAX_DESCRIPTION_LEN {
        return Err(Error::invalid_command(format!(
            "{what} {name:?} description exceeds {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_options(command: &str, options: &[CommandOption]) -> Result<()> {
    for (i, option) in options.iter().enumerate() {
        validate_name("option name", &option.name)?;
        validate_description("option", &option.name, &option.description)?;
        if !option.children.is_empty() && !option.kind.is_nesting() {
            return Err(Error::invalid_command(format!(
                "option {:?} of {command:?} nests children but is not a subcommand",
                option.name
            )));
        }
        if !option.choices.is_empty() && !option.kind.supports_choices() {
            return Err(Error::invalid_command(format!(
                "option {:?} of {command:?} carries choices but its kind does not allow them",
                option.name
            )));
        }
        if options[..i]
            .iter()
            .any(|other| other.name.eq_ignore_ascii_case(&option.name))
        {
            return Err(Error::invalid_command(format!(
                "duplicate option name {:?} in {command:?}",
                option.name
            )));
        }
        validate_options(command, &option.children)?;
    }
    Ok(())
}
