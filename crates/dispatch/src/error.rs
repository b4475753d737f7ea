use herald_common::Scope;

/// Errors raised by the dispatch layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A command's name collides with one already registered in the same
    /// namespace.
    #[error("command {name:?} already registered in {scope}")]
    DuplicateName { name: String, scope: Scope },

    /// A full catalog reindex was requested with no shard connections to
    /// reconcile against. There is no partial mode; retry once a shard is
    /// online.
    #[error("no shard connections are online")]
    NoShardsOnline,

    #[error(transparent)]
    Common(#[from] herald_common::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
