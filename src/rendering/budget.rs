//! Token-budget fitting over the ranked tag list.
//!
//! The rendered size of a tag prefix is a nondecreasing function of prefix
//! length, so the largest prefix that fits the budget can be found by binary
//! search. Each probe renders a candidate prefix and counts its tokens with
//! the injected counter (sampled for large texts). A result within 10% below
//! the budget is accepted immediately to skip the remaining probes.

use std::collections::HashSet;

use crate::rendering::TreeRenderer;
use crate::tokens;
use crate::types::RankedTag;

/// Outcome of a fitting pass.
pub struct FitResult {
    /// The selected prefix of the ranked list (chat files already removed)
    pub selected: Vec<RankedTag>,
    /// Rendered map; None when nothing fit the budget
    pub rendered: Option<String>,
    /// Token count of the rendered map (0 when empty)
    pub tokens: usize,
}

impl FitResult {
    fn empty() -> Self {
        Self { selected: Vec::new(), rendered: None, tokens: 0 }
    }
}

/// Binary-searches the ranked list for the largest renderable prefix within
/// a token budget.
pub struct BudgetFitter<'a> {
    renderer: &'a TreeRenderer,
    token_counter: &'a (dyn Fn(&str) -> usize + Send + Sync),
}

impl<'a> BudgetFitter<'a> {
    pub fn new(
        renderer: &'a TreeRenderer,
        token_counter: &'a (dyn Fn(&str) -> usize + Send + Sync),
    ) -> Self {
        Self { renderer, token_counter }
    }

    fn measure(&self, text: &str) -> usize {
        tokens::estimate_tokens(text, self.token_counter)
    }

    /// Fit `ranked` into `budget` tokens.
    ///
    /// Tags from chat files are dropped up front: the consumer already has
    /// those files, so they never appear in the output regardless of rank.
    pub fn fit(
        &self,
        ranked: &[RankedTag],
        chat_rel_fnames: &HashSet<String>,
        budget: usize,
    ) -> FitResult {
        if budget == 0 {
            return FitResult::empty();
        }

        let candidates: Vec<&RankedTag> = ranked
            .iter()
            .filter(|t| !chat_rel_fnames.contains(t.tag.rel_fname.as_ref()))
            .collect();
        if candidates.is_empty() {
            return FitResult::empty();
        }

        // Accept early once within 10% below the budget
        let lower_tolerance = budget - budget / 10;

        let render_prefix = |k: usize| -> String {
            self.renderer.render(candidates[..k].iter().map(|t| &t.tag))
        };

        let to_result = |k: usize, rendered: String, tokens: usize| -> FitResult {
            if k == 0 || rendered.is_empty() {
                return FitResult::empty();
            }
            FitResult {
                selected: candidates[..k].iter().map(|t| (*t).clone()).collect(),
                rendered: Some(rendered),
                tokens,
            }
        };

        // Integer bisection over prefix length, ties resolving upward so a
        // bigger map that fits is preferred.
        let mut lower = 0usize;
        let mut upper = candidates.len();

        while lower < upper {
            let mid = (lower + upper + 1) / 2;
            let rendered = render_prefix(mid);
            let tokens = self.measure(&rendered);

            if tokens <= budget {
                if tokens >= lower_tolerance {
                    return to_result(mid, rendered, tokens);
                }
                lower = mid;
            } else {
                upper = mid - 1;
            }
        }

        let rendered = render_prefix(lower);
        let tokens = self.measure(&rendered);
        to_result(lower, rendered, tokens)
    }
}
