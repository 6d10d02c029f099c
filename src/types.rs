//! Core types for repomapper.
//!
//! Everything downstream of extraction speaks `Tag` and `RankedTag`; both are
//! frozen value types so they can be cached, cloned, and shared freely.
//! `Arc<str>` keeps the many copies of the same path/name cheap.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Serde serialization helpers for Arc<str> fields
mod arc_str_serde {
    use super::*;

    pub fn serialize<S>(arc: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(arc.as_ref())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(s.into())
    }
}

/// A single lexical occurrence of a named symbol.
///
/// Represents either a definition ("def") or reference ("ref"). Two tags are
/// equal iff all five fields match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    /// Relative path for display (e.g., "src/lib.rs")
    #[serde(with = "arc_str_serde")]
    pub rel_fname: Arc<str>,
    /// Absolute path for I/O operations
    #[serde(with = "arc_str_serde")]
    pub fname: Arc<str>,
    /// Line number (0-indexed)
    pub line: u32,
    /// Symbol name (function, class, variable name)
    #[serde(with = "arc_str_serde")]
    pub name: Arc<str>,
    /// "def" for definition, "ref" for reference
    pub kind: TagKind,
}

/// Tag kind - definition or reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagKind {
    /// Symbol definition (function def, class def, type declaration)
    Def,
    /// Symbol reference (function call, type use)
    Ref,
}

impl Tag {
    /// Check if this is a definition tag
    pub fn is_def(&self) -> bool {
        matches!(self.kind, TagKind::Def)
    }

    /// Check if this is a reference tag
    pub fn is_ref(&self) -> bool {
        matches!(self.kind, TagKind::Ref)
    }
}

/// A definition tag with its computed importance rank.
#[derive(Debug, Clone)]
pub struct RankedTag {
    /// Distributed PageRank score (nonnegative, 0 for dead definitions)
    pub rank: f64,
    /// The underlying definition tag
    pub tag: Tag,
}

impl RankedTag {
    pub fn new(rank: f64, tag: Tag) -> Self {
        Self { rank, tag }
    }
}

impl PartialEq for RankedTag {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RankedTag {}

impl PartialOrd for RankedTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Rank descending; ties broken by (rel_fname ascending, line ascending) so
/// the final ordering is total and runs are byte-reproducible.
impl Ord for RankedTag {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .rank
            .partial_cmp(&self.rank)
            .unwrap_or(Ordering::Equal)
            .then_with(|| self.tag.rel_fname.cmp(&other.tag.rel_fname))
            .then_with(|| self.tag.line.cmp(&other.tag.line))
    }
}

/// Extraction diagnostics for a single pipeline run.
///
/// Produced by graph construction, consumed by verbose/diagnostic output.
/// The core never raises for per-file problems; they land here instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FileReport {
    /// Excluded paths mapped to the exclusion reason
    pub excluded: BTreeMap<String, String>,
    /// Total definition tags extracted
    pub definition_matches: usize,
    /// Total reference tags extracted
    pub reference_matches: usize,
    /// Total files provided as input (chat + other, deduplicated)
    pub total_files_considered: usize,
}

impl FileReport {
    /// Multi-line summary for verbose output.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "{} files considered, {} definitions, {} references",
            self.total_files_considered, self.definition_matches, self.reference_matches
        )];
        for (path, reason) in &self.excluded {
            lines.push(format!("  excluded {} ({})", path, reason));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_tag(rel: &str, line: u32, name: &str, kind: TagKind) -> Tag {
        Tag {
            rel_fname: rel.into(),
            fname: format!("/{}", rel).into(),
            line,
            name: name.into(),
            kind,
        }
    }

    #[test]
    fn test_tag_equality_is_full_field() {
        let a = make_tag("a.rs", 3, "foo", TagKind::Def);
        let b = make_tag("a.rs", 3, "foo", TagKind::Def);
        let c = make_tag("a.rs", 4, "foo", TagKind::Def);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, make_tag("a.rs", 3, "foo", TagKind::Ref));
    }

    #[test]
    fn test_ranked_tag_ordering() {
        let hi = RankedTag::new(0.8, make_tag("b.rs", 1, "foo", TagKind::Def));
        let lo = RankedTag::new(0.5, make_tag("a.rs", 1, "bar", TagKind::Def));

        // Higher rank sorts first
        assert!(hi < lo);

        // Equal ranks fall back to path, then line
        let x = RankedTag::new(0.5, make_tag("a.rs", 2, "baz", TagKind::Def));
        assert!(lo < x);
        let y = RankedTag::new(0.5, make_tag("a.rs", 1, "other", TagKind::Def));
        assert_eq!(lo.cmp(&y), Ordering::Equal);
    }

    #[test]
    fn test_ranked_sort_is_deterministic() {
        let mut tags = vec![
            RankedTag::new(0.1, make_tag("z.rs", 9, "z", TagKind::Def)),
            RankedTag::new(0.1, make_tag("a.rs", 5, "a", TagKind::Def)),
            RankedTag::new(0.9, make_tag("m.rs", 1, "m", TagKind::Def)),
            RankedTag::new(0.1, make_tag("a.rs", 2, "b", TagKind::Def)),
        ];
        tags.sort();
        let order: Vec<(&str, u32)> = tags
            .iter()
            .map(|t| (t.tag.rel_fname.as_ref(), t.tag.line))
            .collect();
        assert_eq!(order, vec![("m.rs", 1), ("a.rs", 2), ("a.rs", 5), ("z.rs", 9)]);
    }

    #[test]
    fn test_tag_serde_roundtrip() {
        let tag = make_tag("src/lib.rs", 42, "build", TagKind::Def);
        let bytes = bincode::serialize(&tag).unwrap();
        let decoded: Tag = bincode::deserialize(&bytes).unwrap();
        assert_eq!(tag, decoded);
    }

    #[test]
    fn test_file_report_summary() {
        let report = FileReport {
            excluded: BTreeMap::from([("vendor/x.bin".to_string(), "no-grammar".to_string())]),
            definition_matches: 3,
            reference_matches: 0,
            total_files_considered: 2,
        };

        let summary = report.summary();
        assert!(summary.contains("2 files considered"));
        assert!(summary.contains("vendor/x.bin"));
        assert!(summary.contains("no-grammar"));
    }
}
