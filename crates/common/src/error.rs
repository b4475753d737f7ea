use thiserror::Error;

/// Errors shared across the herald crates.
#[derive(Debug, Error)]
pub enum Error {
    /// A command failed validation at construction time.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// The remote catalog client reported a failure.
    #[error("catalog: {0}")]
    Catalog(String),
}

impl Error {
    #[must_use]
    pub fn invalid_command(msg: impl Into<String>) -> Self {
        Self::InvalidCommand(msg.into())
    }

    #[must_use]
    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
