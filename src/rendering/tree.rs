//! Snippet rendering for selected definitions.
//!
//! Output format, per file:
//!
//! ```text
//! src/parser.py:
//!  10: def parse(source):
//!  11:     tokens = lex(source)
//!  12:     return build_tree(tokens)
//! ⋮...
//!  40: def lex(source):
//!  41:     ...
//! ```
//!
//! Each selected tag contributes an interest window of its own line plus two
//! lines of context either side; windows within a file are unioned into
//! maximal contiguous ranges separated by an elision marker. Rendering is
//! byte-deterministic for fixed inputs.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::sync::Arc;

use crate::types::Tag;

/// Context lines shown before and after each tag line.
const CONTEXT_LINES: u32 = 2;

/// Marker emitted between non-contiguous ranges within a file.
const ELISION: &str = "⋮...";

/// Formats a set of selected tags into the final map text.
///
/// Holds a per-run source cache: the budget fitter renders O(log n) candidate
/// prefixes, and re-reading every file each time would dominate the cost.
pub struct TreeRenderer {
    /// File contents by absolute path; None records an unreadable file so it
    /// is not retried on every fitter iteration.
    source_cache: RefCell<HashMap<Arc<str>, Option<Vec<String>>>>,
}

impl TreeRenderer {
    pub fn new() -> Self {
        Self { source_cache: RefCell::new(HashMap::new()) }
    }

    /// Fetch (and memoize) the lines of a source file.
    fn source_lines(&self, fname: &Arc<str>) -> Option<Vec<String>> {
        let mut cache = self.source_cache.borrow_mut();
        cache
            .entry(Arc::clone(fname))
            .or_insert_with(|| {
                fs::read_to_string(fname.as_ref())
                    .ok()
                    .map(|text| text.lines().map(str::to_string).collect())
            })
            .clone()
    }

    /// Render the given tags, grouped by file in first-appearance order.
    ///
    /// A file whose contents cannot be read contributes only its header.
    pub fn render<'t>(&self, tags: impl IntoIterator<Item = &'t Tag>) -> String {
        // Group by file, preserving first-appearance order
        let mut order: Vec<Arc<str>> = Vec::new();
        let mut by_file: HashMap<Arc<str>, (Arc<str>, Vec<u32>)> = HashMap::new();
        for tag in tags {
            by_file
                .entry(Arc::clone(&tag.rel_fname))
                .or_insert_with(|| {
                    order.push(Arc::clone(&tag.rel_fname));
                    (Arc::clone(&tag.fname), Vec::new())
                })
                .1
                .push(tag.line);
        }

        let mut parts: Vec<String> = Vec::new();
        for rel in &order {
            let (fname, lines_of_interest) = &by_file[rel];
            parts.push(self.render_file(rel, fname, lines_of_interest));
        }

        parts.join("\n")
    }

    /// Render one file's header and snippet ranges.
    fn render_file(&self, rel_fname: &str, fname: &Arc<str>, lines_of_interest: &[u32]) -> String {
        let mut out = format!("{}:\n", rel_fname);

        let Some(source) = self.source_lines(fname) else {
            return out;
        };
        if source.is_empty() {
            return out;
        }
        let last_line = (source.len() - 1) as u32;

        // Union interest windows into a sorted set of visible lines
        let mut visible: BTreeSet<u32> = BTreeSet::new();
        for &line in lines_of_interest {
            let line = line.min(last_line);
            let start = line.saturating_sub(CONTEXT_LINES);
            let end = (line + CONTEXT_LINES).min(last_line);
            visible.extend(start..=end);
        }

        // Merge into maximal contiguous ranges
        let mut ranges: Vec<(u32, u32)> = Vec::new();
        for line in visible {
            match ranges.last_mut() {
                Some((_, end)) if line == *end + 1 => *end = line,
                _ => ranges.push((line, line)),
            }
        }

        // Right-align display numbers to the widest emitted line
        let max_display = ranges.last().map(|(_, end)| end + 1).unwrap_or(1);
        let width = max_display.to_string().len();

        for (i, (start, end)) in ranges.iter().enumerate() {
            if i > 0 {
                out.push_str(ELISION);
                out.push('\n');
            }
            for line in *start..=*end {
                out.push_str(&format!(
                    "{:>width$}: {}\n",
                    line + 1,
                    source[line as usize],
                    width = width
                ));
            }
        }

        out
    }
}

impl Default for TreeRenderer {
    fn default() -> Self {
        Self::new()
    }
}
