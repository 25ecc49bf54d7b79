//! Embedded LLM Supervisor: manages an optional local inference server
//! child process so the rest of the system can treat it as just
//! another provider endpoint (`llm::embedded::EmbeddedProvider`).
//!
//! No teacher precedent exists for this subsystem - the inherited
//! codebase only ever called out to already-running `ollama`/Gemini
//! endpoints - so binary/model acquisition is grounded on
//! `stencila-stencila/rust/binary/src/lib.rs`'s download/extract
//! pattern (streamed download to the data directory, `zip`/`tar`
//! extraction with an enclosed-name check against path traversal),
//! adapted to this crate's `thiserror`/`tracing`/`tokio::process`
//! conventions instead of `eyre`/synchronous `std::fs`.

mod binary;
mod known_models;
mod model;
mod process;

pub use binary::ensure_binary;
pub use known_models::{model_profile, ModelProfile};
pub use model::ensure_model;
pub use process::{LlmServerState, Supervisor, SupervisorConfig, SupervisorStatus};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("server binary is missing and could not be acquired: {0}")]
    BinaryMissing(String),

    #[error("model file is missing and could not be acquired: {0}")]
    ModelMissing(String),

    #[error("no free port found starting at {0}")]
    PortUnavailable(u16),

    #[error("server did not become ready within {0:?}")]
    ReadinessTimeout(std::time::Duration),

    #[error("server is already running")]
    AlreadyRunning,

    #[error("server child process exited unexpectedly: {0}")]
    ChildExited(String),

    #[error("archive entry `{0}` would extract outside the destination directory")]
    ZipSlip(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
}
