//! Error types for the catalog store

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid connection config: {0}")]
    Config(#[source] sqlx::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("row iteration error: {0}")]
    RowIteration(#[source] sqlx::Error),
}

impl StoreError {
    /// Whether the underlying failure is a transport-level one (connection
    /// refused, broken pipe, pool timeout) as opposed to a server-side
    /// rejection such as "table already exists". Startup treats the former
    /// as fatal and the latter as a warning.
    pub fn is_network(&self) -> bool {
        match self {
            StoreError::Database(err) | StoreError::RowIteration(err) => matches!(
                err,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::Tls(_)
            ),
            StoreError::Config(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
