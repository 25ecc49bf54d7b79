//! MCP Bridge: both directions of the Model Context Protocol.
//!
//! [`server`] exposes the shared [`crate::tools::ToolRegistry`] over
//! stdio JSON-RPC so an external MCP host (an editor, another agent)
//! can list and call k13d's tools directly. [`client`] is the reverse:
//! it spawns configured external MCP servers as child processes and
//! registers their tools into the registry so the agent loop can call
//! them like any built-in tool.

pub mod client;
pub mod server;
pub mod types;

pub use client::{connect_configured_servers, McpClientError};
pub use server::McpServer;
