//! MCP server implementation.
//!
//! Provides the `repo_map` tool via MCP protocol over stdio. The tool mirrors
//! the library surface: chat/other files, mention hints, token budget, cache
//! control. Pipeline failures come back as an empty map plus report, never as
//! protocol errors; only invalid arguments (bad root) are rejected.

use std::borrow::Cow;
use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;

use rmcp::{
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{ErrorCode, ErrorData as McpError, *},
    tool, tool_handler, tool_router, ServerHandler,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::discovery::find_source_files_with_config;
use crate::map::{MapConfig, RepoMap};

/// MCP server exposing repository mapping as a tool.
#[derive(Debug, Clone)]
pub struct RepoMapServer {
    tool_router: ToolRouter<RepoMapServer>,
}

/// Request parameters for the repo_map tool.
#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct RepoMapRequest {
    /// Absolute path to the repository root directory.
    #[schemars(description = "Absolute path to the repository root directory")]
    pub project_root: String,

    /// Files already in the conversation (relative paths). They contribute
    /// structure but are suppressed from the map.
    #[schemars(
        description = "Files already in the conversation (relative paths). Contribute structure but are suppressed from the map."
    )]
    pub chat_files: Option<Vec<String>>,

    /// Candidate files or directories. If omitted, scans the entire root.
    #[schemars(description = "Candidate files or directories. If omitted, scans the entire root.")]
    pub other_files: Option<Vec<String>>,

    /// Relative paths to boost in ranking.
    #[schemars(description = "Relative paths to boost in ranking")]
    pub mentioned_files: Option<Vec<String>>,

    /// Identifiers to boost (function/class names in focus).
    #[schemars(description = "Identifiers to boost (function/class names in focus)")]
    pub mentioned_idents: Option<Vec<String>>,

    /// Token budget for the map output (default: 1024).
    #[schemars(description = "Token budget for the map output (default: 1024)")]
    pub map_tokens: Option<usize>,

    /// Hard ceiling on map tokens.
    #[schemars(description = "Hard ceiling on map tokens")]
    pub max_context_window: Option<usize>,

    /// Drop definitions nothing references.
    #[schemars(description = "Drop definitions nothing references")]
    pub exclude_unranked: Option<bool>,

    /// Bypass the tag cache and reparse everything.
    #[schemars(description = "Bypass the tag cache and reparse everything")]
    pub force_refresh: Option<bool>,
}

/// Response from the repo_map tool.
#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct RepoMapResponse {
    /// The rendered map; null when the graph was empty or nothing fit.
    pub map: Option<String>,
    /// Extraction statistics.
    pub report: RepoMapReport,
}

/// Statistics from a mapping run.
#[derive(Debug, Serialize, schemars::JsonSchema)]
pub struct RepoMapReport {
    /// Number of files excluded, with reasons.
    pub excluded: usize,
    /// Definition tags extracted.
    pub definition_matches: usize,
    /// Reference tags extracted.
    pub reference_matches: usize,
    /// Total files considered.
    pub total_files_considered: usize,
}

fn internal_error(message: String) -> McpError {
    McpError { code: ErrorCode(-32603), message: Cow::from(message), data: None }
}

#[tool_router]
impl RepoMapServer {
    pub fn new() -> Self {
        Self { tool_router: Self::tool_router() }
    }

    /// Generate a token-budgeted structural map of a repository.
    #[tool(
        name = "repo_map",
        description = "Generate a compact, token-budgeted map of a repository: the highest-ranked symbol definitions with surrounding code, selected via PageRank over the cross-file reference graph."
    )]
    async fn repo_map(
        &self,
        Parameters(request): Parameters<RepoMapRequest>,
    ) -> Result<CallToolResult, McpError> {
        let root = PathBuf::from(&request.project_root);
        if !root.is_dir() {
            return Err(McpError {
                code: ErrorCode(-32602),
                message: Cow::from(format!(
                    "Project root directory not found: {}",
                    request.project_root
                )),
                data: None,
            });
        }
        let root = root
            .canonicalize()
            .map_err(|e| internal_error(format!("Failed to resolve root path: {}", e)))?;

        let file_config = Config::load(&root);

        // Expand other_files specs (files pass through, directories walk);
        // default to scanning the whole root.
        let other_files: Vec<PathBuf> = match &request.other_files {
            Some(specs) => {
                let mut files = Vec::new();
                for spec in specs {
                    let path = root.join(spec);
                    match find_source_files_with_config(&path, &file_config) {
                        Ok(found) => files.extend(found),
                        Err(_) => continue,
                    }
                }
                files
            }
            None => find_source_files_with_config(&root, &file_config)
                .map_err(|e| internal_error(format!("File discovery failed: {}", e)))?,
        };

        let chat_files: Vec<PathBuf> = request
            .chat_files
            .unwrap_or_default()
            .iter()
            .map(|f| root.join(f))
            .collect();
        let mentioned_fnames: HashSet<String> =
            request.mentioned_files.unwrap_or_default().into_iter().collect();
        let mentioned_idents: HashSet<String> =
            request.mentioned_idents.unwrap_or_default().into_iter().collect();

        let config = MapConfig {
            map_tokens: request.map_tokens.unwrap_or(1024),
            max_context_window: request.max_context_window,
            exclude_unranked: request.exclude_unranked.unwrap_or(false),
            ..MapConfig::new(root)
        };
        let repo_map = RepoMap::new(config);

        let (map, report) = repo_map.get_repo_map(
            &chat_files,
            &other_files,
            &mentioned_fnames,
            &mentioned_idents,
            request.force_refresh.unwrap_or(false),
        );

        let response = RepoMapResponse {
            map,
            report: RepoMapReport {
                excluded: report.excluded.len(),
                definition_matches: report.definition_matches,
                reference_matches: report.reference_matches,
                total_files_considered: report.total_files_considered,
            },
        };

        let json = serde_json::to_string_pretty(&response)
            .map_err(|e| internal_error(format!("JSON serialization failed: {}", e)))?;

        Ok(CallToolResult::success(vec![Content::text(json)]))
    }
}

impl Default for RepoMapServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for RepoMapServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "repomapper".into(),
                version: env!("CARGO_PKG_VERSION").into(),
            },
            instructions: Some(
                "Repository cartography over a reference graph. \
                 Use repo_map to get the highest-ranked definitions of a \
                 codebase within a token budget."
                    .to_string(),
            ),
        }
    }
}
