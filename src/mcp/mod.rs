//! MCP server shell.
//!
//! Wraps the library pipeline in a JSON-RPC STDIO loop so AI assistants can
//! request repository maps via the `repo_map` tool.

mod server;

pub use server::RepoMapServer;
