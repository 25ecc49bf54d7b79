// k13d - a Kubernetes management workstation: TUI + web dashboard +
// agentic AI assistant over kubectl/shell/MCP tools.
// Library exports for testing and for the `k13d`/`k13d-mcp` binaries.

pub mod agent;
pub mod approval;
pub mod audit;
pub mod config;
pub mod error;
pub mod kubectl;
pub mod llm;
pub mod mcp;
pub mod safety;
pub mod session;
pub mod shell;
pub mod supervisor;
pub mod tools;
pub mod ui;
pub mod watch;
pub mod web;

pub use agent::{AgentEvent, AgentLoop, AgentPhase};
pub use config::Config;
pub use error::{K13dError, K13dResult};
pub use llm::{AnyProvider, Provider};
pub use safety::{SafetyClass, SafetyPolicy};
pub use session::{SessionHandle, SessionStore};
pub use supervisor::Supervisor;
pub use tools::{ToolRegistry, ToolResult};
