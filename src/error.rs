//! Crate-wide error aggregation.
//!
//! Each subsystem defines its own `thiserror` enum at its module root
//! (`safety::SafetyError`, `tools::ToolRegistryError`, `llm::ProviderError`,
//! `agent::AgentError`, `watch::WatchError`, `supervisor::SupervisorError`).
//! `K13dError` exists for the CLI's top-level error reporting, where a
//! single `?`-propagated type is more convenient than matching on every
//! subsystem enum individually.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum K13dError {
    #[error(transparent)]
    Safety(#[from] crate::safety::SafetyError),

    #[error(transparent)]
    ToolRegistry(#[from] crate::tools::ToolRegistryError),

    #[error(transparent)]
    Provider(#[from] crate::llm::ProviderError),

    #[error(transparent)]
    Agent(#[from] crate::agent::AgentError),

    #[error(transparent)]
    Watch(#[from] crate::watch::WatchError),

    #[error(transparent)]
    Supervisor(#[from] crate::supervisor::SupervisorError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type K13dResult<T> = Result<T, K13dError>;
