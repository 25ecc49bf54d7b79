//! Session Store: an append-only log of messages and tool executions
//! per conversation, serialized per-session so two turns for the same
//! session can never interleave.
//!
//! Grounded on `src/agent/agent_loop.rs`'s `AgentState`/`AgentStep`
//! bookkeeping (step numbering, timestamps, a bounded step history) but
//! promoted from a single in-memory `Vec<AgentStep>` owned by one loop
//! invocation to a `tokio::sync::Mutex`-guarded store so the TUI, the
//! web dashboard, and the MCP bridge can all append to and read the
//! same session concurrently.

mod message;
mod store;

pub use message::{ApprovalRecord, Message, MessageRole, ToolExecutionRecord};
pub use store::{SessionHandle, SessionStore};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session `{0}` not found")]
    NotFound(String),

    #[error("session `{0}` is already running a turn")]
    Busy(String),
}
