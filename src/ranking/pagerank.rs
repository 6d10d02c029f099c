//! Personalized PageRank over the reference graph.
//!
//! Power iteration with damping 0.85 until the L1 delta drops below 1e-6 or
//! 100 iterations pass, whichever comes first. Edge contributions are
//! proportional to edge weight, dangling mass is redistributed through the
//! personalization vector, and the resulting node ranks are distributed onto
//! individual definitions along the edges that earned them.

use std::collections::{HashMap, HashSet};

use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::ranking::ReferenceGraph;
use crate::types::RankedTag;

const DAMPING: f64 = 0.85;
const EPSILON: f64 = 1e-6;
const MAX_ITERATIONS: usize = 100;

/// Result of a ranking pass.
pub struct RankOutcome {
    /// Definitions ordered by score descending, ties by (path, line)
    pub ranked: Vec<RankedTag>,
    /// True when PageRank produced non-finite values and uniform ranks were
    /// substituted
    pub used_fallback: bool,
}

/// Runs PageRank and distributes rank across definitions.
pub struct Ranker {
    /// Definition-level boost for mentioned identifiers
    mentioned_idents: HashSet<String>,
    /// Definition-level boost for mentioned filenames
    mentioned_fnames: HashSet<String>,
}

impl Ranker {
    pub fn new(mentioned_fnames: &HashSet<String>, mentioned_idents: &HashSet<String>) -> Self {
        Self {
            mentioned_idents: mentioned_idents.clone(),
            mentioned_fnames: mentioned_fnames.clone(),
        }
    }

    /// Rank every definition in the graph.
    ///
    /// Definitions that attract no references score 0 but stay in the list;
    /// the budget fitter may still include them.
    pub fn rank(&self, reference_graph: &ReferenceGraph) -> RankOutcome {
        let graph = &reference_graph.graph;
        let n = graph.node_count();
        if n == 0 {
            return RankOutcome { ranked: Vec::new(), used_fallback: false };
        }

        // Normalize personalization to a probability distribution; an empty
        // vector means uniform teleportation.
        let raw_sum: f64 = reference_graph.personalization.values().sum();
        let personalization: Vec<f64> = graph
            .node_indices()
            .map(|idx| {
                if raw_sum > 0.0 {
                    let rel = &graph[idx];
                    reference_graph.personalization.get(rel).copied().unwrap_or(0.0) / raw_sum
                } else {
                    1.0 / n as f64
                }
            })
            .collect();

        // Total outgoing weight per node, for weight-proportional splits
        let out_weight: Vec<f64> = graph
            .node_indices()
            .map(|idx| graph.edges_directed(idx, Direction::Outgoing).map(|e| e.weight().weight).sum())
            .collect();

        let mut ranks = vec![1.0 / n as f64; n];
        let mut next = vec![0.0; n];

        for _ in 0..MAX_ITERATIONS {
            let dangling: f64 = graph
                .node_indices()
                .filter(|idx| out_weight[idx.index()] == 0.0)
                .map(|idx| ranks[idx.index()])
                .sum();

            for node in graph.node_indices() {
                let incoming: f64 = graph
                    .edges_directed(node, Direction::Incoming)
                    .map(|edge| {
                        let src = edge.source().index();
                        ranks[src] * edge.weight().weight / out_weight[src]
                    })
                    .sum();

                let p = personalization[node.index()];
                next[node.index()] =
                    (1.0 - DAMPING) * p + DAMPING * (incoming + dangling * p);
            }

            let delta: f64 =
                ranks.iter().zip(&next).map(|(old, new)| (new - old).abs()).sum();
            std::mem::swap(&mut ranks, &mut next);

            if delta < EPSILON {
                break;
            }
        }

        // Divergence guard: substitute uniform ranks if anything went
        // non-finite or negative.
        let used_fallback = ranks.iter().any(|r| !r.is_finite() || *r < 0.0);
        if used_fallback {
            ranks = vec![1.0; n];
        }

        // Distribute each node's rank across its outgoing edges by weight
        // share; the definition (file, ident) accumulates over incoming
        // edges with a matching identifier.
        let mut def_scores: HashMap<(&str, &str), f64> = HashMap::new();
        for node in graph.node_indices() {
            let total = out_weight[node.index()];
            if total == 0.0 {
                continue;
            }
            let rank = ranks[node.index()];
            for edge in graph.edges_directed(node, Direction::Outgoing) {
                let def_file = graph[edge.target()].as_str();
                let share = rank * edge.weight().weight / total;
                *def_scores.entry((def_file, edge.weight().ident.as_ref())).or_insert(0.0) +=
                    share;
            }
        }

        let mut ranked: Vec<RankedTag> = reference_graph
            .definitions
            .iter()
            .map(|tag| {
                let base = def_scores
                    .get(&(tag.rel_fname.as_ref(), tag.name.as_ref()))
                    .copied()
                    .unwrap_or(0.0);

                let mut boost = 1.0;
                if self.mentioned_idents.contains(tag.name.as_ref()) {
                    boost *= 10.0;
                }
                if self.mentioned_fnames.contains(tag.rel_fname.as_ref()) {
                    boost *= 5.0;
                }

                RankedTag::new(base * boost, tag.clone())
            })
            .collect();

        ranked.sort();

        RankOutcome { ranked, used_fallback }
    }
}
