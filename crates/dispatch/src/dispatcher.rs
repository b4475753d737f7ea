//! The invocation path: registry match, middleware gate, cooldown check,
//! handler, afterwares.

use std::sync::Arc;

use tracing::{debug, error, info};

use herald_common::Interaction;

use crate::{
    cooldown::{CooldownScope, CooldownVerdict, RateLimiter},
    pipeline::Pipeline,
    registry::CommandRegistry,
};

/// What became of one inbound interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Handler and afterwares ran (the handler itself may have failed; that
    /// is logged, not propagated).
    Completed,
    /// No registered command matched the interaction.
    NotFound,
    /// A middleware halted the invocation before the handler.
    Halted { response: Option<String> },
    /// The per-user cooldown blocked the invocation. `notify` is true for
    /// the first blocked attempt in the window only.
    RateLimited { remaining_secs: u64, notify: bool },
}

/// Routes interactions through the pipeline to command handlers.
pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    pipeline: Pipeline,
    limiter: Arc<RateLimiter>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(registry: Arc<CommandRegistry>, pipeline: Pipeline) -> Self {
        Self {
            registry,
            pipeline,
            limiter: Arc::new(RateLimiter::new()),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    /// Shared rate limiter, also consultable from host-authored middleware.
    #[must_use]
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Run one interaction to completion.
    ///
    /// Strictly sequential within the invocation, since a later middleware
    /// must observe an earlier one's gate state; independent invocations
    /// run concurrently on the runtime.
    pub async fn dispatch(&self, interaction: &Interaction) -> DispatchOutcome {
        let Some(command) =
            self.registry
                .resolve(interaction.remote_command_id, &interaction.command, interaction.server)
        else {
            debug!(
                command = %interaction.command,
                interaction = %interaction.id,
                "no registered command matched"
            );
            return DispatchOutcome::NotFound;
        };

        if let Some(gate) = self.pipeline.run_middlewares(command.middleware(), interaction).await {
            return DispatchOutcome::Halted {
                response: gate.into_response(),
            };
        }

        if !command.cooldown().is_zero() {
            let scope = interaction.server.map_or(CooldownScope::Direct, CooldownScope::Server);
            match self.limiter.attempt(command.id(), interaction.user, scope, command.cooldown()) {
                CooldownVerdict::Allowed => {},
                CooldownVerdict::BlockedNotify { remaining_secs } => {
                    info!(
                        command = %command.name(),
                        user = %interaction.user,
                        remaining_secs,
                        "invocation blocked by cooldown"
                    );
                    return DispatchOutcome::RateLimited {
                        remaining_secs,
                        notify: true,
                    };
                },
                CooldownVerdict::BlockedSilent { remaining_secs } => {
                    return DispatchOutcome::RateLimited {
                        remaining_secs,
                        notify: false,
                    };
                },
            }
        }

        if let Some(handler) = command.handler() {
            if let Err(e) = handler.run(interaction).await {
                error!(command = %command.name(), "command handler failed: {e}");
            }
        }

        // Afterwares run regardless of the handler outcome so cleanup steps
        // are never skipped.
        if self.pipeline.run_afterwares(command.afterware(), interaction).await.is_some() {
            debug!(command = %command.name(), "afterware chain halted");
        }

        DispatchOutcome::Completed
    }
}
