/// Errors raised by the synchronizer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Shard-affinity routing needs at least one shard.
    #[error("total shard count must be at least 1")]
    InvalidShardCount,

    #[error(transparent)]
    Catalog(#[from] herald_common::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
