//! repomapper CLI.
//!
//! Generates a repository map showing important code structures:
//!
//! 1. File Discovery: expand paths to source files respecting .gitignore
//! 2. Tag Extraction: parse files with tree-sitter (cached by mtime)
//! 3. Graph Building: weighted cross-file reference graph
//! 4. PageRank: importance scores via power iteration
//! 5. Budget Fit: binary search for the largest map within the token budget
//! 6. Rendering: numbered snippets grouped by file
//!
//! Core failures render as empty output plus a report; only argument errors
//! exit nonzero.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;

use repomapper::config::Config;
use repomapper::discovery::find_source_files_with_config;
use repomapper::tokens::counter_for_model;
use repomapper::{MapConfig, RepoMap};

/// Generate a repository map showing important code structures.
///
/// Examples:
///   repomapper .                          # Map current directory
///   repomapper src/ --map-tokens 2048     # Map src/ with a 2048 token limit
///   repomapper --chat-files main.py src/  # Files in focus vs candidates
#[derive(Parser, Debug)]
#[command(name = "repomapper")]
#[command(version)]
#[command(about, long_about = None)]
pub struct Cli {
    /// Files or directories to include in the map
    #[arg(value_name = "PATHS")]
    pub paths: Vec<String>,

    /// Repository root directory
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Maximum tokens for the generated map
    ///
    /// Negative values are clamped to zero (which yields an empty map).
    #[arg(long, default_value = "8192", allow_hyphen_values = true)]
    pub map_tokens: i64,

    /// Files currently being edited (contribute structure, suppressed from
    /// output)
    #[arg(long, num_args = 0..)]
    pub chat_files: Vec<String>,

    /// Candidate files or directories; overrides positional paths
    #[arg(long, num_args = 0..)]
    pub other_files: Vec<String>,

    /// Relative paths to boost in ranking
    #[arg(long, num_args = 0..)]
    pub mentioned_files: Vec<String>,

    /// Identifiers to boost in ranking
    #[arg(long, num_args = 0..)]
    pub mentioned_idents: Vec<String>,

    /// Model name for token counting
    #[arg(long, default_value = "gpt-4")]
    pub model: String,

    /// Maximum context window size (hard ceiling on map tokens)
    #[arg(long)]
    pub max_context_window: Option<usize>,

    /// Force refresh of caches
    #[arg(long)]
    pub force_refresh: bool,

    /// Exclude definitions nothing references
    #[arg(long)]
    pub exclude_unranked: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = run(&cli)?;
    if let Some(output) = output {
        println!("{}", output);
    } else {
        println!("No repository map generated.");
    }
    Ok(())
}

/// Expand path specs into source files: files pass through, directories are
/// walked with the configured include/exclude filters. Missing paths are
/// skipped with a warning; the pipeline reports them, not the shell.
fn expand_paths(specs: &[String], root: &Path, config: &Config) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for spec in specs {
        let path = Path::new(spec);
        let abs = if path.is_absolute() { path.to_path_buf() } else { root.join(path) };

        match find_source_files_with_config(&abs, config) {
            Ok(found) => files.extend(found),
            Err(_) => eprintln!("Warning: skipping non-existent path: {}", spec),
        }
    }
    files
}

fn run(cli: &Cli) -> Result<Option<String>> {
    let root = cli.root.canonicalize().map_err(|e| {
        anyhow::anyhow!("Failed to resolve root path '{}': {}", cli.root.display(), e)
    })?;

    let file_config = Config::load(&root);

    if cli.verbose {
        eprintln!("repomapper v{}", env!("CARGO_PKG_VERSION"));
        eprintln!("Root: {}", root.display());
        if let Some(source) = &file_config.source {
            eprintln!("Config: {}", source.display());
        }
    }

    // --other-files wins over positional paths; either may mix files and
    // directories.
    let other_specs: &[String] = if !cli.other_files.is_empty() {
        &cli.other_files
    } else {
        &cli.paths
    };
    let other_files = expand_paths(other_specs, &root, &file_config);
    let chat_files = expand_paths(&cli.chat_files, &root, &file_config);

    if cli.verbose {
        eprintln!("Candidates: {} files ({} in chat)", other_files.len(), chat_files.len());
    }

    let mentioned_fnames: HashSet<String> = cli.mentioned_files.iter().cloned().collect();
    let mentioned_idents: HashSet<String> = cli.mentioned_idents.iter().cloned().collect();

    let config = MapConfig {
        map_tokens: cli.map_tokens.max(0) as usize,
        max_context_window: cli.max_context_window,
        exclude_unranked: cli.exclude_unranked,
        verbose: cli.verbose,
        ..MapConfig::new(root)
    };
    let repo_map = RepoMap::with_token_counter(config, counter_for_model(&cli.model));

    let (map, report) = repo_map.get_repo_map(
        &chat_files,
        &other_files,
        &mentioned_fnames,
        &mentioned_idents,
        cli.force_refresh,
    );

    if cli.verbose {
        eprintln!("{}", report.summary());
    }

    Ok(map)
}
