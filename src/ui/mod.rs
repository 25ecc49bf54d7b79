//! Terminal UI widgets for the `tui` subcommand: application state,
//! layout, confirmation/approval modals, and a live reasoning-trace
//! viewer driven by the agent loop's [`crate::agent::AgentEvent`] stream.

pub mod app;
pub mod confirmation;
pub mod layout;
pub mod modal;
pub mod progress;
pub mod reasoning;
pub mod spinner;

pub use app::{AppState, KaidoApp, TerminalGuard, ThinkingStage};
pub use confirmation::{ConfirmationAction, ConfirmationModal, ConfirmationType};
pub use layout::create_layout;
pub use modal::{ModalButton, ModalDialog};
pub use progress::ProgressTracker;
pub use reasoning::ReasoningViewer;
pub use spinner::get_spinner_frame;
