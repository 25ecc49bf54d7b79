// k13d-mcp: standalone MCP server entry point, for hosts (editors,
// other agents) that want to launch k13d's tools directly rather than
// through `k13d mcp`.
//
// Usage:
//   k13d-mcp              # start MCP server (stdio mode)
//
// Example host configuration:
// {
//   "mcpServers": {
//     "k13d": {
//       "command": "k13d-mcp"
//     }
//   }
// }

use std::sync::Arc;

use clap::Parser;

use k13d::config::Config;
use k13d::mcp::{connect_configured_servers, McpServer};
use k13d::tools::{ToolExecutionContext, ToolRegistry};

#[derive(Parser, Debug)]
#[command(name = "k13d-mcp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Expose k13d's tool registry via the Model Context Protocol")]
struct Args {
    /// Enable debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "k13d=debug,warn" } else { "k13d=info,warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .init();

    eprintln!("k13d-mcp v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;
    let mut registry = ToolRegistry::with_defaults()?;
    if let Err(e) = connect_configured_servers(&config.mcp.servers, &mut registry).await {
        tracing::warn!(error = %e, "failed to connect one or more configured mcp servers");
    }

    let tool_context =
        ToolExecutionContext { working_directory: std::env::current_dir().unwrap_or_default(), kubectl_context: k13d::kubectl::KubectlContext::current().ok() };

    let server = McpServer::new(Arc::new(registry), tool_context);
    server.run().await
}
