use thiserror::Error;

/// Workspace-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("agent error: {0}")]
    Agent(String),

    /// The language model call failed, timed out, or returned something unusable.
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// The checkpoint store could not load or save a conversation.
    #[error("checkpoint unavailable: {0}")]
    CheckpointUnavailable(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("turn cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
