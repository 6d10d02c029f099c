//! Reference graph construction.
//!
//! Aggregates tags from every candidate file into a weighted directed
//! multigraph: nodes are files, and each identifier defined in file `D` and
//! referenced in file `R != D` contributes an edge `R -> D`. Parallel edges
//! between the same pair carry distinct identifier labels; PageRank consumes
//! their summed weight.
//!
//! Ordering discipline: every aggregation map is a BTreeMap and files are
//! visited in sorted order, so node and edge insertion order - and therefore
//! the final rendered map - is identical across runs.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use petgraph::graph::{DiGraph, NodeIndex};

use crate::cache::TagCache;
use crate::extraction::{language_for_path, TagExtractor};
use crate::types::{FileReport, Tag};

/// One labeled edge in the reference graph.
#[derive(Debug, Clone)]
pub struct RefEdge {
    /// The shared identifier this edge carries
    pub ident: Arc<str>,
    /// Per-reference weight (see `edge_weight`)
    pub weight: f64,
}

/// The weighted reference graph plus everything the ranker needs alongside
/// it: the full definition list (dead definitions included) and the raw
/// personalization vector.
pub struct ReferenceGraph {
    /// Files as nodes (node weight = relative path), references as edges
    pub graph: DiGraph<String, RefEdge>,
    /// Relative path -> node index
    pub node_ids: BTreeMap<String, NodeIndex>,
    /// Every definition tag, in (file, line) order. Definitions that attract
    /// no references stay here with rank 0 so the fitter may still pick them.
    pub definitions: Vec<Tag>,
    /// Raw personalization weights (1.0 per focused file). Empty means
    /// uniform teleportation.
    pub personalization: BTreeMap<String, f64>,
}

impl ReferenceGraph {
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}

/// Per-reference edge weight.
///
/// Base weight is sqrt of the occurrence count in the referencing file;
/// mentioned identifiers and class-like (uppercase-initial) names are
/// boosted, short or underscore-prefixed names are damped.
fn edge_weight(ident: &str, occurrences: usize, mentioned_idents: &HashSet<String>) -> f64 {
    let mut weight = (occurrences as f64).sqrt();
    if mentioned_idents.contains(ident) {
        weight *= 10.0;
    }
    if ident.chars().next().is_some_and(|c| c.is_uppercase()) {
        weight *= 10.0;
    }
    if ident.len() <= 2 || ident.starts_with('_') {
        weight *= 0.1;
    }
    weight
}

/// Builds the reference graph for one pipeline run.
///
/// Collects tags for chat and other files through the tag cache, indexes
/// definitions and references by identifier, and wires up weighted edges.
/// Per-file problems (missing file, unknown grammar, read failure) land in
/// the `FileReport` instead of failing the run.
pub struct GraphBuilder<'a> {
    root: &'a Path,
    cache: &'a TagCache,
    force_refresh: bool,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(root: &'a Path, cache: &'a TagCache, force_refresh: bool) -> Self {
        Self { root, cache, force_refresh }
    }

    /// Relative display path for an absolute path.
    fn rel_fname(&self, path: &Path) -> String {
        path.strip_prefix(self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string()
    }

    /// Resolve a possibly-relative input path against the root.
    fn abs_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Build the reference graph and extraction report.
    ///
    /// `chat_files` contribute tags and personalization weight but are later
    /// suppressed from output by the fitter. `mentioned_fnames` are relative
    /// paths given extra teleportation probability; `mentioned_idents` give
    /// their edges a weight boost.
    pub fn build(
        &self,
        chat_files: &[PathBuf],
        other_files: &[PathBuf],
        mentioned_fnames: &HashSet<String>,
        mentioned_idents: &HashSet<String>,
    ) -> (ReferenceGraph, FileReport) {
        let mut report = FileReport::default();

        // Deduplicate and sort inputs so extraction order is stable
        let mut all_files: BTreeSet<PathBuf> = BTreeSet::new();
        for f in chat_files.iter().chain(other_files) {
            all_files.insert(self.abs_path(f));
        }
        report.total_files_considered = all_files.len();

        let chat_rel: HashSet<String> = chat_files
            .iter()
            .map(|f| self.rel_fname(&self.abs_path(f)))
            .collect();

        // ident -> set of defining files; ident -> per-file occurrence counts
        let mut defines: BTreeMap<Arc<str>, BTreeSet<String>> = BTreeMap::new();
        let mut references: BTreeMap<Arc<str>, BTreeMap<String, usize>> = BTreeMap::new();
        let mut definitions: Vec<Tag> = Vec::new();
        let mut tagged_files: BTreeSet<String> = BTreeSet::new();

        let mut extractor = TagExtractor::new();

        for abs in &all_files {
            let rel = self.rel_fname(abs);

            let mtime = match fs::metadata(abs).and_then(|m| m.modified()) {
                Ok(mtime) => mtime,
                Err(_) => {
                    report.excluded.insert(rel, "file not found".to_string());
                    continue;
                }
            };

            let Some(language) = language_for_path(abs) else {
                report.excluded.insert(rel, "no-grammar".to_string());
                continue;
            };

            let abs_str = abs.to_string_lossy().to_string();
            let tags = self.cache.get_or_compute(&abs_str, mtime, self.force_refresh, || {
                let content = fs::read_to_string(abs)?;
                Ok(extractor.extract(&content, language, &abs_str, &rel))
            });

            let tags = match tags {
                Ok(tags) => tags,
                Err(_) => {
                    report.excluded.insert(rel, "unreadable".to_string());
                    continue;
                }
            };

            if !tags.is_empty() {
                tagged_files.insert(rel.clone());
            }

            for tag in tags {
                if tag.is_def() {
                    report.definition_matches += 1;
                    defines.entry(Arc::clone(&tag.name)).or_default().insert(rel.clone());
                    definitions.push(tag);
                } else {
                    report.reference_matches += 1;
                    *references
                        .entry(Arc::clone(&tag.name))
                        .or_default()
                        .entry(rel.clone())
                        .or_insert(0) += 1;
                }
            }
        }

        // Nodes: every file that produced at least one tag
        let mut graph: DiGraph<String, RefEdge> = DiGraph::new();
        let mut node_ids: BTreeMap<String, NodeIndex> = BTreeMap::new();
        for rel in &tagged_files {
            let idx = graph.add_node(rel.clone());
            node_ids.insert(rel.clone(), idx);
        }

        // Edges: referencing file -> defining file, one per identifier.
        // Identifiers with no definition (pure external references) and
        // definitions with no references contribute nothing here.
        for (ident, def_files) in &defines {
            let Some(ref_files) = references.get(ident) else { continue };
            for (ref_file, &count) in ref_files {
                let Some(&ref_node) = node_ids.get(ref_file) else { continue };
                for def_file in def_files {
                    if def_file == ref_file {
                        continue;
                    }
                    let Some(&def_node) = node_ids.get(def_file) else { continue };
                    graph.add_edge(
                        ref_node,
                        def_node,
                        RefEdge {
                            ident: Arc::clone(ident),
                            weight: edge_weight(ident, count, mentioned_idents),
                        },
                    );
                }
            }
        }

        // Personalization: chat files and mentioned filenames that actually
        // became nodes. Normalization happens in the ranker.
        let mut personalization = BTreeMap::new();
        for rel in node_ids.keys() {
            if chat_rel.contains(rel) || mentioned_fnames.contains(rel) {
                personalization.insert(rel.clone(), 1.0);
            }
        }

        // Keep the definition list in deterministic (file, line, name) order
        definitions.sort_by(|a, b| {
            a.rel_fname
                .cmp(&b.rel_fname)
                .then_with(|| a.line.cmp(&b.line))
                .then_with(|| a.name.cmp(&b.name))
        });

        (ReferenceGraph { graph, node_ids, definitions, personalization }, report)
    }
}
