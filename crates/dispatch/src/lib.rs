//! Command dispatch for herald.
//!
//! Matches inbound interactions against the [`registry::CommandRegistry`],
//! drives the [`pipeline::Pipeline`] of middlewares and afterwares with its
//! per-invocation [`gate::Gate`], and enforces per-user cooldowns through
//! the [`cooldown::RateLimiter`]. The [`dispatcher::Dispatcher`] ties the
//! pieces together into the invocation path.

pub mod cooldown;
pub mod dispatcher;
pub mod error;
pub mod gate;
pub mod pipeline;
pub mod registry;

pub use {
    cooldown::{CooldownScope, CooldownVerdict, RateLimiter},
    dispatcher::{DispatchOutcome, Dispatcher},
    error::{Error, Result},
    gate::Gate,
    pipeline::{Interceptor, Pipeline, PipelineBuilder},
    registry::CommandRegistry,
};
