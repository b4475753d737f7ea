//! Shared identity model and command catalog types for herald.
//!
//! Everything the dispatch, shard-queue, and synchronizer crates agree on
//! lives here: process-unique and remote identifiers, the declared
//! [`Command`] model with its recursive option tree, and the
//! [`CatalogClient`] boundary behind which the host's gateway/REST client
//! sits.

pub mod catalog;
pub mod command;
pub mod error;
pub mod ids;
pub mod interaction;
pub mod option_tree;

pub use {
    catalog::{CatalogClient, CommandSpec, RemoteCommand},
    command::{Command, CommandBuilder, CommandHandler},
    error::{Error, Result},
    ids::{CommandId, InteractionId, RemoteId, Scope, ScopeId, UserId},
    interaction::Interaction,
    option_tree::{ChoiceValue, CommandOption, OptionChoice, OptionKind},
};
