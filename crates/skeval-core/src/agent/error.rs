//! Error types for agent adapters.

/// Errors an adapter may raise for I/O-level failures.
///
/// Ordinary process failures (non-zero exit, timeout) are not errors: the
/// adapter returns whatever output exists with `metadata.error` set.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("unknown agent: {0}")]
    UnknownAgent(String),

    #[error("agent command is empty")]
    EmptyCommand,

    #[error("invalid skill marker for {skill}: {source}")]
    InvalidMarker {
        skill: String,
        #[source]
        source: regex::Error,
    },

    #[error("agent io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for agent operations.
pub type AgentResult<T> = std::result::Result<T, AgentError>;
