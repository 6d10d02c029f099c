//! Configuration loading from repomap.toml.
//!
//! Discovery filtering is configurable per repository:
//!
//! ```toml
//! include = ["src/**", "lib/**"]
//! exclude = ["**/generated/**"]
//! extend-exclude = ["**/fixtures/**"]
//! ```
//!
//! `exclude` replaces the built-in defaults; `extend-exclude` adds to them.
//! Patterns are globs, or bare directory prefixes ("src" matches "src/...").

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Default exclude patterns (common non-source directories).
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "**/node_modules/**",
    "**/.git/**",
    "**/.repomap.tags.cache.*/**",
    "**/target/**",
    "**/build/**",
    "**/dist/**",
    "**/__pycache__/**",
    "**/.venv/**",
    "**/venv/**",
    "**/vendor/**",
    "**/third_party/**",
];

/// Discovery configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Source file for this config (for display)
    pub source: Option<PathBuf>,
    /// Glob patterns for files to include. If empty, include all source files.
    pub include: Vec<String>,
    /// Glob patterns for files to exclude. Replaces defaults if set.
    pub exclude: Vec<String>,
    /// Additional exclude patterns (extends defaults).
    pub extend_exclude: Vec<String>,
}

/// Raw config as deserialized from TOML.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
struct RawConfig {
    include: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
    extend_exclude: Option<Vec<String>>,
}

impl Config {
    /// Load configuration from `repomap.toml` in the given directory,
    /// falling back to defaults when absent or unparseable.
    pub fn load(directory: &Path) -> Self {
        let path = directory.join("repomap.toml");
        if !path.exists() {
            return Self::default();
        }

        let Some(raw) = std::fs::read_to_string(&path)
            .ok()
            .and_then(|content| toml::from_str::<RawConfig>(&content).ok())
        else {
            return Self::default();
        };

        Self {
            source: Some(path),
            include: raw.include.unwrap_or_default(),
            exclude: raw.exclude.unwrap_or_default(),
            extend_exclude: raw.extend_exclude.unwrap_or_default(),
        }
    }

    /// Effective exclude patterns (defaults + extend-exclude, or custom exclude).
    pub fn effective_excludes(&self) -> Vec<String> {
        if !self.exclude.is_empty() {
            self.exclude.clone()
        } else {
            let mut patterns: Vec<String> =
                DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
            patterns.extend(self.extend_exclude.clone());
            patterns
        }
    }

    /// Check if a path matches any include pattern.
    /// True when no include patterns are set (include everything).
    pub fn matches_include(&self, path: &Path) -> bool {
        if self.include.is_empty() {
            return true;
        }
        let path_str = path.to_string_lossy();
        self.include.iter().any(|pattern| Self::matches_pattern(pattern, &path_str))
    }

    /// Check if a path matches any exclude pattern.
    pub fn matches_exclude(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();
        self.effective_excludes()
            .iter()
            .any(|pattern| Self::matches_pattern(pattern, &path_str))
    }

    /// Match a pattern against a path, handling both globs and directory
    /// prefixes ("src" matches "src/foo.py").
    fn matches_pattern(pattern: &str, path: &str) -> bool {
        if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            glob_match::glob_match(pattern, path)
        } else {
            let prefix = pattern.trim_end_matches('/');
            path == prefix || path.starts_with(&format!("{}/", prefix))
        }
    }

    /// Check if a path should be included (matches include AND not exclude).
    pub fn should_include(&self, path: &Path) -> bool {
        self.matches_include(path) && !self.matches_exclude(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_excludes() {
        let config = Config::default();
        assert!(config.matches_exclude(Path::new("foo/node_modules/bar.js")));
        assert!(config.matches_exclude(Path::new("project/.git/config")));
        assert!(config.matches_exclude(Path::new("src/__pycache__/mod.pyc")));
        assert!(!config.matches_exclude(Path::new("src/main.py")));
    }

    #[test]
    fn test_include_patterns() {
        let config = Config {
            include: vec!["src/**".to_string(), "lib/**".to_string()],
            ..Default::default()
        };
        assert!(config.matches_include(Path::new("src/main.py")));
        assert!(config.matches_include(Path::new("lib/utils.py")));
        assert!(!config.matches_include(Path::new("tests/test_main.py")));
    }

    #[test]
    fn test_extend_exclude_keeps_defaults() {
        let config = Config {
            extend_exclude: vec!["**/generated/**".to_string()],
            ..Default::default()
        };
        assert!(config.matches_exclude(Path::new("node_modules/foo.js")));
        assert!(config.matches_exclude(Path::new("src/generated/schema.py")));
    }

    #[test]
    fn test_directory_prefix_patterns() {
        let config = Config { include: vec!["src".to_string()], ..Default::default() };
        assert!(config.matches_include(Path::new("src/main.py")));
        assert!(config.matches_include(Path::new("src/lib/utils.py")));
        assert!(!config.matches_include(Path::new("srcfoo/bar.py")));
    }

    #[test]
    fn test_load_from_repomap_toml() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("repomap.toml"),
            "include = [\"src/**\"]\nextend-exclude = [\"**/gen/**\"]\n",
        )
        .unwrap();

        let config = Config::load(dir.path());
        assert!(config.source.is_some());
        assert_eq!(config.include, vec!["src/**"]);
        assert!(config.matches_exclude(Path::new("a/gen/b.py")));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path());
        assert!(config.source.is_none());
        assert!(config.include.is_empty());
    }
}
