//! Ranking pipeline - from tags to importance scores.
//!
//! Two stages: `GraphBuilder` turns per-file tags into a weighted directed
//! multigraph of files linked by shared identifiers, then `Ranker` runs
//! personalized PageRank over it and distributes file rank onto individual
//! definitions.

mod graph;
mod pagerank;

pub use graph::{GraphBuilder, RefEdge, ReferenceGraph};
pub use pagerank::{RankOutcome, Ranker};
