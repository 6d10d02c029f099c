//! Git-aware file discovery with parallel traversal.
//!
//! Uses the `ignore` crate (ripgrep's walker) so .gitignore, global ignores,
//! and .git/info/exclude are all respected without reimplementation. Results
//! are sorted: discovery feeds the cache and the renderer, and both need a
//! stable file order.

use std::path::{Path, PathBuf};

use anyhow::Result;
use ignore::WalkBuilder;

use crate::config::Config;

/// File extensions excluded from discovery.
///
/// Binary and generated files would waste parse cycles and pollute the
/// reference graph with noise. Lock files are excluded because their
/// thousands of dependency entries would dominate the graph.
const EXCLUDED_EXTENSIONS: &[&str] = &[
    // Images
    "png", "jpg", "jpeg", "gif", "ico", "svg", "webp", "bmp",
    // Fonts
    "woff", "woff2", "ttf", "eot", "otf",
    // Media
    "mp3", "mp4", "wav", "ogg", "webm", "avi", "mov",
    // Archives
    "zip", "tar", "gz", "rar", "7z", "bz2", "xz", "tgz",
    // Compiled / binary
    "pyc", "pyo", "so", "dylib", "dll", "exe", "o", "a", "class", "jar",
    // Lock files (generated, high entropy, low signal)
    "lock", "sum",
    // Misc binary
    "db", "sqlite", "redb", "wasm", "bin", "dat", "pdf",
];

/// Find source files under a path, respecting .gitignore.
///
/// A file argument passes through unchanged; a directory is walked in
/// parallel. Returns sorted absolute paths.
pub fn find_source_files(directory: &Path) -> Result<Vec<PathBuf>> {
    find_source_files_with_config(directory, &Config::default())
}

/// Find source files with repomap.toml include/exclude filtering applied.
pub fn find_source_files_with_config(directory: &Path, config: &Config) -> Result<Vec<PathBuf>> {
    // Single file case
    if directory.is_file() {
        if config.should_include(directory) {
            return Ok(vec![directory.to_path_buf()]);
        }
        return Ok(vec![]);
    }

    if !directory.is_dir() {
        anyhow::bail!("Path does not exist: {}", directory.display());
    }

    // threads(0) = auto-detect parallelism
    let walker = WalkBuilder::new(directory)
        .hidden(false)
        .git_ignore(true)
        .git_global(true)
        .git_exclude(true)
        .require_git(false)
        .follow_links(false)
        .threads(0)
        .build_parallel();

    let files = std::sync::Mutex::new(Vec::new());
    let dir_path = directory.to_path_buf();

    walker.run(|| {
        Box::new(|entry_result| {
            match entry_result {
                Ok(entry) => {
                    let path = entry.path();

                    if !path.is_file() {
                        return ignore::WalkState::Continue;
                    }

                    if is_excluded_by_extension(path) {
                        return ignore::WalkState::Continue;
                    }

                    // Pattern matching runs on the relative path
                    let rel_path = path.strip_prefix(&dir_path).unwrap_or(path);
                    if !config.should_include(rel_path) {
                        return ignore::WalkState::Continue;
                    }

                    if let Ok(mut files) = files.lock() {
                        files.push(path.to_path_buf());
                    }

                    ignore::WalkState::Continue
                }
                // Skip entries we can't read (permissions, broken symlinks)
                Err(_) => ignore::WalkState::Continue,
            }
        })
    });

    let mut files = files
        .into_inner()
        .map_err(|_| anyhow::anyhow!("Failed to unwrap mutex"))?;

    // Sorted for reproducibility; the pipeline's determinism depends on it
    files.sort();

    Ok(files)
}

/// Check if a file should be excluded based on its extension.
fn is_excluded_by_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| EXCLUDED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_extension_filtering() {
        assert!(is_excluded_by_extension(Path::new("image.png")));
        assert!(is_excluded_by_extension(Path::new("archive.zip")));
        assert!(is_excluded_by_extension(Path::new("Cargo.lock")));
        assert!(is_excluded_by_extension(Path::new("IMAGE.PNG")));

        assert!(!is_excluded_by_extension(Path::new("main.rs")));
        assert!(!is_excluded_by_extension(Path::new("lib.py")));
        assert!(!is_excluded_by_extension(Path::new("Cargo.toml")));
    }

    #[test]
    fn test_single_file_input() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("single.py");
        fs::write(&file, "x = 1\n")?;

        let result = find_source_files(&file)?;
        assert_eq!(result, vec![file]);
        Ok(())
    }

    #[test]
    fn test_nonexistent_path_errors() {
        let result = find_source_files(Path::new("/nonexistent/path/xyz"));
        assert!(result.is_err());
    }

    #[test]
    fn test_directory_walk_is_sorted_and_filtered() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("b.py"), "x = 1\n")?;
        fs::write(dir.path().join("a.py"), "y = 2\n")?;
        fs::write(dir.path().join("image.png"), "fake png")?;

        let files = find_source_files(dir.path())?;
        let names: Vec<String> = files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.py", "b.py"]);
        Ok(())
    }

    #[test]
    fn test_config_excludes_apply() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir_all(dir.path().join("gen"))?;
        fs::write(dir.path().join("main.py"), "x = 1\n")?;
        fs::write(dir.path().join("gen/out.py"), "y = 2\n")?;

        let config = Config {
            extend_exclude: vec!["gen/**".to_string()],
            ..Default::default()
        };
        let files = find_source_files_with_config(dir.path(), &config)?;
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("main.py"));
        Ok(())
    }
}
