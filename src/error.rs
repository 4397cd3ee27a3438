//! Error types for the database reader agent
//!
//! Startup failures (`Config`, `Connection`, `Schema`) are fatal. Everything
//! that can go wrong inside a single turn is either a `Generation` error or an
//! [`ExecutionError`](crate::database::executor::QueryResult::ExecutionError)
//! value, and the interactive loop keeps running.

use thiserror::Error;

/// Result type alias for the agent
pub type Result<T> = std::result::Result<T, AgentError>;

/// Main error type for the agent
#[derive(Error, Debug)]
pub enum AgentError {
    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The database could not be reached or refused the credentials
    #[error("Connection error ({target}): {source}")]
    Connection {
        target: String,
        #[source]
        source: sqlx::Error,
    },

    /// Backend detection failed before a connection was attempted
    #[error("Unsupported database: {0}")]
    UnsupportedDatabase(String),

    /// Schema introspection failed or produced an unusable foreign key
    #[error("Schema error: {0}")]
    Schema(String),

    /// The language model could not produce a usable answer
    #[error("Generation error: {0}")]
    Generation(String),

    /// IO-related errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP-related errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AgentError {
    /// Wrap a driver error raised while connecting to `target`
    pub fn connection(target: impl Into<String>, source: sqlx::Error) -> Self {
        AgentError::Connection {
            target: target.into(),
            source,
        }
    }

    /// Wrap a driver error raised by an introspection query
    pub fn schema_query(query: &str, source: sqlx::Error) -> Self {
        AgentError::Schema(format!(
            "introspection query failed: {} ({})",
            source,
            query.split_whitespace().collect::<Vec<_>>().join(" ")
        ))
    }

    /// Whether the error should end the process rather than the current turn
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AgentError::Config(_)
                | AgentError::Connection { .. }
                | AgentError::UnsupportedDatabase(_)
                | AgentError::Schema(_)
        )
    }
}
