//! repomapper - token-budgeted repository maps
//!
//! Produces a compact textual "map" of a source repository: the symbol
//! definitions most useful to an LLM reasoning about the codebase, with
//! surrounding context, bounded by a token budget.
//!
//! # Architecture
//!
//! ```text
//! File Discovery → Tag Extraction → Graph Building → PageRank → Budget Fit → Rendering
//!       ↓               ↓                ↓              ↓           ↓            ↓
//!    ignore         tree-sitter      petgraph      iterative    binary      numbered
//!    crate           + .scm           DiGraph        power      search      snippets
//!                   (redb cache)                    method     (tokens)
//! ```
//!
//! The pipeline entry point is [`RepoMap::get_repo_map`]: give it chat files
//! (in focus, suppressed from output), other files (candidates), and optional
//! mention hints; get back the rendered map and a [`FileReport`].

pub mod cache;
pub mod config;
pub mod discovery;
pub mod extraction;
pub mod map;
pub mod mcp;
pub mod ranking;
pub mod rendering;
pub mod tokens;
pub mod types;

// Re-export the primary surface
pub use map::{MapConfig, RepoMap};
pub use types::{FileReport, RankedTag, Tag, TagKind};
