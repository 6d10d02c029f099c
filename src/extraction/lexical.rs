//! Lexical reference fallback.
//!
//! Some tag queries only capture definitions. Without references the file
//! would contribute no edges to the graph, so this pass tokenizes the source
//! and treats every identifier-like token as a reference, skipping tokens
//! already emitted as a definition on the same line. It is deliberately
//! crude; name-based matching downstream tolerates the noise.

use std::collections::HashSet;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{Tag, TagKind};

/// Identifier-like tokens: letters/underscore start, word characters after.
static IDENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("invalid identifier regex"));

/// Emit a reference tag for every identifier-like token in `content` that is
/// not already a definition on the same line. One tag per occurrence:
/// repeated uses on a line each count toward edge weight.
pub fn fallback_references(
    content: &str,
    fname: &Arc<str>,
    rel_fname: &Arc<str>,
    existing: &[Tag],
) -> Vec<Tag> {
    let defs_on_line: HashSet<(u32, &str)> = existing
        .iter()
        .filter(|t| t.is_def())
        .map(|t| (t.line, t.name.as_ref()))
        .collect();

    let mut refs = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let line_no = line_no as u32;
        for m in IDENT.find_iter(line) {
            let token = m.as_str();
            if defs_on_line.contains(&(line_no, token)) {
                continue;
            }
            refs.push(Tag {
                rel_fname: Arc::clone(rel_fname),
                fname: Arc::clone(fname),
                line: line_no,
                name: Arc::from(token),
                kind: TagKind::Ref,
            });
        }
    }

    refs
}
