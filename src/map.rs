//! Pipeline orchestration.
//!
//! `RepoMap` wires the stages together: tag extraction (through the
//! persistent cache), reference-graph construction, personalized PageRank,
//! budget fitting, and rendering. One blocking call, all failure modes as
//! values: the worst a caller sees is `(None, report)`.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::cache::{CacheConfig, CacheStats, TagCache};
use crate::ranking::{GraphBuilder, Ranker};
use crate::rendering::{BudgetFitter, TreeRenderer};
use crate::tokens::{self, TokenCounter};
use crate::types::FileReport;

/// Tokens held back from the context window when sizing the no-chat-files
/// budget expansion.
const CONTEXT_WINDOW_PADDING: usize = 1024;

/// Pipeline configuration, constructed explicitly by the caller.
#[derive(Debug, Clone)]
pub struct MapConfig {
    /// Repository root; relative input paths and display paths hang off it
    pub root: PathBuf,
    /// Token budget for the rendered map
    pub map_tokens: usize,
    /// Hard ceiling: the effective budget never exceeds this
    pub max_context_window: Option<usize>,
    /// Budget multiplier applied when no chat files are present and the
    /// context window is known
    pub map_mul_no_files: usize,
    /// Drop definitions with rank 0 before fitting
    pub exclude_unranked: bool,
    /// Progress and diagnostics on stderr
    pub verbose: bool,
    /// Tag cache location/version
    pub cache: CacheConfig,
}

impl MapConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            map_tokens: 1024,
            max_context_window: None,
            map_mul_no_files: 8,
            exclude_unranked: false,
            verbose: false,
            cache: CacheConfig::default(),
        }
    }
}

/// Memo key: the full input signature of one map request.
type MemoKey = (Vec<String>, Vec<String>, usize, Vec<String>, Vec<String>);

/// Repository map generator.
pub struct RepoMap {
    config: MapConfig,
    cache: TagCache,
    token_counter: TokenCounter,
    /// Rendered maps memoized per input signature for the lifetime of this
    /// instance; `force_refresh` bypasses it.
    map_memo: RefCell<HashMap<MemoKey, (Option<String>, FileReport)>>,
    /// PageRank fallback is reported at most once per run
    fallback_warned: Cell<bool>,
}

impl RepoMap {
    /// Create a map generator with the default (cl100k_base) token counter.
    pub fn new(config: MapConfig) -> Self {
        Self::with_token_counter(config, Box::new(tokens::count_tokens))
    }

    /// Create a map generator with an injected token counter.
    pub fn with_token_counter(config: MapConfig, token_counter: TokenCounter) -> Self {
        let cache = TagCache::open(&config.root, &config.cache);
        Self {
            config,
            cache,
            token_counter,
            map_memo: RefCell::new(HashMap::new()),
            fallback_warned: Cell::new(false),
        }
    }

    /// Tag cache hit/miss counters for this instance.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn rel_fname(&self, path: &Path) -> String {
        let abs = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config.root.join(path)
        };
        abs.strip_prefix(&self.config.root)
            .unwrap_or(&abs)
            .to_string_lossy()
            .to_string()
    }

    /// Effective token budget for this request.
    ///
    /// With no chat files and a known context window, the budget expands by
    /// `map_mul_no_files` (the map is then the consumer's only view of the
    /// repo). The context window, minus padding, is always a hard ceiling.
    fn effective_budget(&self, have_chat_files: bool) -> usize {
        let mut budget = self.config.map_tokens;
        if let Some(window) = self.config.max_context_window {
            let available = window.saturating_sub(CONTEXT_WINDOW_PADDING);
            if !have_chat_files {
                budget = (budget * self.config.map_mul_no_files).min(available);
            }
            budget = budget.min(window);
        }
        budget
    }

    /// Generate the repository map.
    ///
    /// Returns the rendered map (None when the graph was empty or the budget
    /// admitted nothing) and the extraction report.
    pub fn get_repo_map(
        &self,
        chat_files: &[PathBuf],
        other_files: &[PathBuf],
        mentioned_fnames: &HashSet<String>,
        mentioned_idents: &HashSet<String>,
        force_refresh: bool,
    ) -> (Option<String>, FileReport) {
        if self.config.map_tokens == 0 || other_files.is_empty() {
            return (None, FileReport::default());
        }

        let budget = self.effective_budget(!chat_files.is_empty());

        let memo_key: MemoKey = (
            sorted_strings(chat_files.iter().map(|p| p.to_string_lossy().to_string())),
            sorted_strings(other_files.iter().map(|p| p.to_string_lossy().to_string())),
            budget,
            sorted_strings(mentioned_fnames.iter().cloned()),
            sorted_strings(mentioned_idents.iter().cloned()),
        );
        if !force_refresh {
            if let Some(cached) = self.map_memo.borrow().get(&memo_key) {
                return cached.clone();
            }
        }

        let builder = GraphBuilder::new(&self.config.root, &self.cache, force_refresh);
        let (graph, report) =
            builder.build(chat_files, other_files, mentioned_fnames, mentioned_idents);

        if graph.is_empty() {
            let result = (None, report);
            self.map_memo.borrow_mut().insert(memo_key, result.clone());
            return result;
        }

        let outcome = Ranker::new(mentioned_fnames, mentioned_idents).rank(&graph);
        if outcome.used_fallback && self.config.verbose && !self.fallback_warned.get() {
            self.fallback_warned.set(true);
            eprintln!("Warning: PageRank diverged, using uniform ranks");
        }

        let ranked = if self.config.exclude_unranked {
            outcome.ranked.into_iter().filter(|t| t.rank > 0.0).collect()
        } else {
            outcome.ranked
        };

        let chat_rel: HashSet<String> =
            chat_files.iter().map(|p| self.rel_fname(p)).collect();

        let renderer = TreeRenderer::new();
        let fitter = BudgetFitter::new(&renderer, self.token_counter.as_ref());
        let fit = fitter.fit(&ranked, &chat_rel, budget);

        if self.config.verbose {
            eprintln!(
                "Repo-map: {} definitions selected, ~{} tokens (budget {})",
                fit.selected.len(),
                fit.tokens,
                budget
            );
        }

        let result = (fit.rendered, report);
        self.map_memo.borrow_mut().insert(memo_key, result.clone());
        result
    }
}

fn sorted_strings(iter: impl Iterator<Item = String>) -> Vec<String> {
    let mut v: Vec<String> = iter.collect();
    v.sort();
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Word-count token stub keeps tests independent of BPE vocabularies.
    fn test_repo_map(root: &Path, map_tokens: usize) -> RepoMap {
        let config = MapConfig { map_tokens, ..MapConfig::new(root) };
        RepoMap::with_token_counter(config, Box::new(|s: &str| s.split_whitespace().count()))
    }

    fn write_file(dir: &Path, rel: &str, content: &str) -> PathBuf {
        let path = dir.join(rel);
        fs::write(&path, content).unwrap();
        path
    }

    fn no_hints() -> HashSet<String> {
        HashSet::new()
    }

    #[test]
    fn test_single_file_two_definitions() {
        // One file defining foo and bar, no references: both definitions
        // appear under the file header, ordered by line.
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.py", "def foo():\n    pass\n\ndef bar():\n    pass\n");

        let repo_map = test_repo_map(dir.path(), 4096);
        let (map, report) =
            repo_map.get_repo_map(&[], &[a], &no_hints(), &no_hints(), false);

        let map = map.unwrap();
        assert!(map.starts_with("a.py:\n"));
        let foo_pos = map.find("def foo").unwrap();
        let bar_pos = map.find("def bar").unwrap();
        assert!(foo_pos < bar_pos);

        assert_eq!(report.definition_matches, 2);
        assert_eq!(report.reference_matches, 0);
        assert_eq!(report.total_files_considered, 1);
    }

    #[test]
    fn test_referenced_file_shown_referencing_file_absent() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.py", "def foo():\n    pass\n");
        let b = write_file(dir.path(), "b.py", "foo()\nfoo()\nfoo()\n");

        let repo_map = test_repo_map(dir.path(), 4096);
        let (map, _) =
            repo_map.get_repo_map(&[], &[a, b], &no_hints(), &no_hints(), false);

        let map = map.unwrap();
        assert!(map.contains("a.py:"));
        assert!(map.contains("def foo"));
        // b.py holds no definitions, so it cannot appear in the output
        assert!(!map.contains("b.py"));
    }

    #[test]
    fn test_chat_file_suppressed_from_output() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.py", "def foo():\n    pass\n");
        let b = write_file(dir.path(), "b.py", "foo()\nfoo()\nfoo()\n");

        let repo_map = test_repo_map(dir.path(), 4096);
        let (map, report) =
            repo_map.get_repo_map(&[a.clone()], &[a, b], &no_hints(), &no_hints(), false);

        // The only defining file is in chat, so nothing remains to render
        assert!(map.is_none());
        assert_eq!(report.definition_matches, 1);
    }

    #[test]
    fn test_reference_cycle_renders_all_files_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.py", "def sym_a():\n    pass\n\nsym_b()\n");
        let b = write_file(dir.path(), "b.py", "def sym_b():\n    pass\n\nsym_c()\n");
        let c = write_file(dir.path(), "c.py", "def sym_c():\n    pass\n\nsym_a()\n");

        let repo_map = test_repo_map(dir.path(), 4096);
        let (map, _) =
            repo_map.get_repo_map(&[], &[a, b, c], &no_hints(), &no_hints(), false);

        let map = map.unwrap();
        let pa = map.find("a.py:").unwrap();
        let pb = map.find("b.py:").unwrap();
        let pc = map.find("c.py:").unwrap();
        assert!(pa < pb && pb < pc);
    }

    #[test]
    fn test_mentioned_ident_outranks_popular_definition() {
        let dir = tempfile::tempdir().unwrap();
        let popular = write_file(dir.path(), "popular.py", "def popular():\n    pass\n");
        let special = write_file(dir.path(), "special.py", "def special():\n    pass\n");
        let uses =
            write_file(dir.path(), "uses.py", "popular()\npopular()\npopular()\nspecial()\n");

        // Budget fits a single file snippet; the mentioned ident must win
        // despite popular() having three references to special()'s one.
        let mentioned: HashSet<String> = ["special".to_string()].into();
        let repo_map = test_repo_map(dir.path(), 8);
        let (map, _) = repo_map.get_repo_map(
            &[],
            &[popular, special, uses],
            &no_hints(),
            &mentioned,
            false,
        );

        let map = map.unwrap();
        assert!(map.contains("special.py:"));
        assert!(!map.contains("popular.py"));
    }

    #[test]
    fn test_tiny_budget_never_overflows_or_panics() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = Vec::new();
        for i in 0..8 {
            let body: String = (0..20)
                .map(|j| format!("def fn_{}_{}():\n    pass\n\n", i, j))
                .collect();
            files.push(write_file(dir.path(), &format!("m{}.py", i), &body));
        }

        let repo_map = test_repo_map(dir.path(), 10);
        let (map, _) = repo_map.get_repo_map(&[], &files, &no_hints(), &no_hints(), false);

        if let Some(map) = map {
            assert!(map.split_whitespace().count() <= 10);
        }
    }

    #[test]
    fn test_empty_inputs_yield_null_and_zero_report() {
        let dir = tempfile::tempdir().unwrap();
        let repo_map = test_repo_map(dir.path(), 4096);
        let (map, report) = repo_map.get_repo_map(&[], &[], &no_hints(), &no_hints(), false);

        assert!(map.is_none());
        assert_eq!(report.total_files_considered, 0);
    }

    #[test]
    fn test_zero_budget_yields_null() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.py", "def foo():\n    pass\n");

        let repo_map = test_repo_map(dir.path(), 0);
        let (map, _) = repo_map.get_repo_map(&[], &[a], &no_hints(), &no_hints(), false);
        assert!(map.is_none());
    }

    #[test]
    fn test_determinism_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.py", "def alpha():\n    pass\n\nbeta()\n");
        let b = write_file(dir.path(), "b.py", "def beta():\n    pass\n\nalpha()\n");
        let files = vec![a, b];

        let first = {
            let repo_map = test_repo_map(dir.path(), 4096);
            repo_map.get_repo_map(&[], &files, &no_hints(), &no_hints(), false)
        };
        let second = {
            let repo_map = test_repo_map(dir.path(), 4096);
            repo_map.get_repo_map(&[], &files, &no_hints(), &no_hints(), false)
        };

        assert_eq!(first.0, second.0);
        assert_eq!(first.1, second.1);
    }

    #[test]
    fn test_second_run_hits_tag_cache() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.py", "def foo():\n    pass\n");
        let b = write_file(dir.path(), "b.py", "foo()\n");
        let files = vec![a, b];

        let first = {
            let repo_map = test_repo_map(dir.path(), 4096);
            let out = repo_map.get_repo_map(&[], &files, &no_hints(), &no_hints(), false);
            assert_eq!(repo_map.cache_stats().hits, 0);
            assert_eq!(repo_map.cache_stats().misses, 2);
            out
        };

        // Fresh instance, same on-disk cache: every file is a hit
        let repo_map = test_repo_map(dir.path(), 4096);
        let second = repo_map.get_repo_map(&[], &files, &no_hints(), &no_hints(), false);
        assert_eq!(repo_map.cache_stats().hits, 2);
        assert_eq!(repo_map.cache_stats().misses, 0);
        assert_eq!(first.0, second.0);
    }

    #[test]
    fn test_mtime_touch_forces_reextraction_same_output() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.py", "def foo():\n    pass\n");

        let first = {
            let repo_map = test_repo_map(dir.path(), 4096);
            repo_map
                .get_repo_map(&[], &[a.clone()], &no_hints(), &no_hints(), false)
                .0
        };

        // Touch the mtime without changing content
        let file = fs::File::options().write(true).open(&a).unwrap();
        file.set_modified(std::time::SystemTime::now() + std::time::Duration::from_secs(5))
            .unwrap();
        drop(file);

        let repo_map = test_repo_map(dir.path(), 4096);
        let second = repo_map.get_repo_map(&[], &[a], &no_hints(), &no_hints(), false);
        assert_eq!(repo_map.cache_stats().hits, 0);
        assert_eq!(repo_map.cache_stats().misses, 1);
        assert_eq!(first, second.0);
    }

    #[test]
    fn test_map_memo_reused_within_instance() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(dir.path(), "a.py", "def foo():\n    pass\n");
        let files = vec![a];

        let repo_map = test_repo_map(dir.path(), 4096);
        let first = repo_map.get_repo_map(&[], &files, &no_hints(), &no_hints(), false);
        let misses_after_first = repo_map.cache_stats().misses;

        let second = repo_map.get_repo_map(&[], &files, &no_hints(), &no_hints(), false);
        // Memoized: no further extraction happened
        assert_eq!(repo_map.cache_stats().misses, misses_after_first);
        assert_eq!(first.0, second.0);
    }

    #[test]
    fn test_exclude_unranked_drops_dead_definitions() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_file(
            dir.path(),
            "a.py",
            "def referenced():\n    pass\n\ndef dead():\n    pass\n",
        );
        let b = write_file(dir.path(), "b.py", "referenced()\n");

        let config = MapConfig { map_tokens: 4096, exclude_unranked: true, ..MapConfig::new(dir.path()) };
        let repo_map = RepoMap::with_token_counter(
            config,
            Box::new(|s: &str| s.split_whitespace().count()),
        );
        let (map, _) = repo_map.get_repo_map(&[], &[a, b], &no_hints(), &no_hints(), false);

        let map = map.unwrap();
        assert!(map.contains("def referenced"));
        assert!(!map.contains("def dead"));
    }

    #[test]
    fn test_no_chat_files_budget_expansion() {
        let dir = tempfile::tempdir().unwrap();
        let config = MapConfig {
            map_tokens: 1000,
            max_context_window: Some(100_000),
            ..MapConfig::new(dir.path())
        };
        let repo_map =
            RepoMap::with_token_counter(config, Box::new(|s: &str| s.len()));

        assert_eq!(repo_map.effective_budget(true), 1000);
        assert_eq!(repo_map.effective_budget(false), 8000);

        // The window is a hard ceiling
        let config = MapConfig {
            map_tokens: 1000,
            max_context_window: Some(4096),
            ..MapConfig::new(dir.path())
        };
        let repo_map =
            RepoMap::with_token_counter(config, Box::new(|s: &str| s.len()));
        assert_eq!(repo_map.effective_budget(false), 4096 - 1024);
    }
}
