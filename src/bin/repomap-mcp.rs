//! repomapper MCP server binary.
//!
//! Runs the repository mapper as an MCP server over stdio so AI assistants
//! can request token-budgeted maps of a codebase.
//!
//! # Usage
//!
//! ```bash
//! repomapper-mcp
//! ```
//!
//! The server communicates via JSON-RPC over stdio and provides the
//! `repo_map` tool.

use anyhow::Result;
use repomapper::mcp::RepoMapServer;
use rmcp::{transport::stdio, ServiceExt};

#[tokio::main]
async fn main() -> Result<()> {
    let service = RepoMapServer::new().serve(stdio()).await?;

    // Runs until the client disconnects
    service.waiting().await?;

    Ok(())
}
