//! Tree-sitter based tag extraction with .scm query support.
//!
//! # Query Format
//!
//! The query files use tree-sitter's query syntax with capture names that
//! classify each node:
//! - `@definition.class`, `@definition.function`, ... - definition sites
//! - `@reference.call`, `@reference.class`, ... - use sites
//!
//! The captured node is the identifier itself; its source text becomes the
//! tag name verbatim.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Parser as TsParser, Query, QueryCursor};

use crate::extraction::lexical;
use crate::types::{Tag, TagKind};

/// Embedded query files - compiled into the binary
mod queries {
    pub const PYTHON: &str = include_str!("../../queries/python-tags.scm");
    pub const RUST: &str = include_str!("../../queries/rust-tags.scm");
    pub const JAVASCRIPT: &str = include_str!("../../queries/javascript-tags.scm");
    pub const TYPESCRIPT: &str = include_str!("../../queries/typescript-tags.scm");
    pub const GO: &str = include_str!("../../queries/go-tags.scm");
}

/// Language configuration with grammar and compiled query
struct LangConfig {
    language: Language,
    query: Query,
    /// Whether the query captures any reference sites. Queries without them
    /// trigger the lexical fallback per file.
    has_references: bool,
}

/// Get tree-sitter language by name
fn get_language(name: &str) -> Option<Language> {
    match name {
        "python" => Some(tree_sitter_python::LANGUAGE.into()),
        "rust" => Some(tree_sitter_rust::LANGUAGE.into()),
        "javascript" | "jsx" => Some(tree_sitter_javascript::LANGUAGE.into()),
        "typescript" => Some(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
        "tsx" => Some(tree_sitter_typescript::LANGUAGE_TSX.into()),
        "go" => Some(tree_sitter_go::LANGUAGE.into()),
        _ => None,
    }
}

/// Get query source for a language
fn get_query_source(name: &str) -> Option<&'static str> {
    match name {
        "python" => Some(queries::PYTHON),
        "rust" => Some(queries::RUST),
        "javascript" | "jsx" => Some(queries::JAVASCRIPT),
        "typescript" | "tsx" => Some(queries::TYPESCRIPT),
        "go" => Some(queries::GO),
        _ => None,
    }
}

/// Map file extension to language name
pub fn extension_to_language(ext: &str) -> Option<&'static str> {
    match ext {
        "py" | "pyi" | "pyw" => Some("python"),
        "rs" => Some("rust"),
        "js" | "mjs" | "cjs" => Some("javascript"),
        "jsx" => Some("jsx"),
        "ts" | "mts" | "cts" => Some("typescript"),
        "tsx" => Some("tsx"),
        "go" => Some("go"),
        _ => None,
    }
}

/// Determine the language for a path, if its grammar is available.
pub fn language_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?;
    let lang = extension_to_language(ext)?;
    TagExtractor::supports_language(lang).then_some(lang)
}

/// Classify a capture name into a tag kind.
///
/// `definition.*` captures are definitions; `reference.*` and
/// `name.reference.*` captures are references. Everything else (auxiliary
/// captures some queries use for anchoring) is ignored.
fn capture_kind(capture_name: &str) -> Option<TagKind> {
    if capture_name.starts_with("definition.") {
        Some(TagKind::Def)
    } else if capture_name.starts_with("reference.") || capture_name.starts_with("name.reference.")
    {
        Some(TagKind::Ref)
    } else {
        None
    }
}

fn is_reference_capture(capture_name: &str) -> bool {
    matches!(capture_kind(capture_name), Some(TagKind::Ref))
}

/// Cached language configurations
static LANG_CONFIGS: Lazy<HashMap<&'static str, LangConfig>> = Lazy::new(|| {
    let mut configs = HashMap::new();

    for lang_name in &["python", "rust", "javascript", "jsx", "typescript", "tsx", "go"] {
        if let (Some(language), Some(query_src)) = (get_language(lang_name), get_query_source(lang_name)) {
            // Skip languages whose query fails to compile (query syntax might
            // not match the grammar version)
            match Query::new(&language, query_src) {
                Ok(query) => {
                    let has_references =
                        query.capture_names().iter().any(|n| is_reference_capture(n));
                    configs.insert(*lang_name, LangConfig { language, query, has_references });
                }
                Err(e) => {
                    eprintln!("Warning: failed to compile query for {}: {}", lang_name, e);
                }
            }
        }
    }

    configs
});

/// Tree-sitter based extractor producing definition and reference tags.
pub struct TagExtractor {
    /// Parser instance; tree-sitter parsers are not thread-safe, so each
    /// pipeline run owns its own extractor.
    parser: TsParser,
}

impl TagExtractor {
    pub fn new() -> Self {
        Self { parser: TsParser::new() }
    }

    /// Check if a language is supported.
    pub fn supports_language(lang: &str) -> bool {
        LANG_CONFIGS.contains_key(lang)
    }

    /// Extract tags from source code.
    ///
    /// Returns one tag per classified query capture. Parse anomalies degrade
    /// gracefully: whatever the query matched in the recovered tree is kept.
    /// An unknown language yields an empty vector; recording the exclusion
    /// reason is the caller's job.
    pub fn extract(
        &mut self,
        content: &str,
        language: &str,
        fname: &str,
        rel_fname: &str,
    ) -> Vec<Tag> {
        let config = match LANG_CONFIGS.get(language) {
            Some(c) => c,
            None => return Vec::new(),
        };

        if self.parser.set_language(&config.language).is_err() {
            return Vec::new();
        }

        let tree = match self.parser.parse(content, None) {
            Some(t) => t,
            None => return Vec::new(),
        };

        let fname: Arc<str> = Arc::from(fname);
        let rel_fname: Arc<str> = Arc::from(rel_fname);

        let capture_names = config.query.capture_names();
        let mut tags = Vec::new();
        let mut cursor = QueryCursor::new();

        let mut matches = cursor.matches(&config.query, tree.root_node(), content.as_bytes());
        while let Some(m) = matches.next() {
            for capture in m.captures {
                let capture_name = capture_names.get(capture.index as usize).copied().unwrap_or("");
                let kind = match capture_kind(capture_name) {
                    Some(k) => k,
                    None => continue,
                };

                let node = capture.node;
                let name = node.utf8_text(content.as_bytes()).unwrap_or("");
                if name.is_empty() {
                    continue;
                }

                tags.push(Tag {
                    rel_fname: Arc::clone(&rel_fname),
                    fname: Arc::clone(&fname),
                    line: node.start_position().row as u32,
                    name: Arc::from(name),
                    kind,
                });
            }
        }

        // Queries that only ship definitions still need references for the
        // graph; synthesize them lexically.
        if !config.has_references {
            let refs = lexical::fallback_references(content, &fname, &rel_fname, &tags);
            tags.extend(refs);
        }

        tags
    }
}

impl Default for TagExtractor {
    fn default() -> Self {
        Self::new()
    }
}
