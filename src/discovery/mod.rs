//! Source file discovery.
//!
//! Expands the CLI's positional paths into candidate file lists, respecting
//! .gitignore and repomap.toml include/exclude patterns.

mod files;

pub use files::{find_source_files, find_source_files_with_config};
