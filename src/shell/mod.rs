//! Small shared types used by the TUI's step-progress widget
//! ([`crate::ui::progress`]). The interactive PTY shell this module used
//! to host has no counterpart in the agentic core - tool execution goes
//! through [`crate::tools::ToolRegistry`] instead - so only the
//! progress-reporting types survive here.

pub mod progress;

pub use progress::{StepProgress, StepStatus};
