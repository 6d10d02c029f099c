//! Output rendering - from ranked tags to the final map text.
//!
//! `TreeRenderer` formats selected definitions as numbered source snippets
//! grouped by file; `BudgetFitter` binary-searches the ranked list for the
//! largest prefix whose rendering fits the token budget.

mod budget;
mod tree;

pub use budget::{BudgetFitter, FitResult};
pub use tree::TreeRenderer;
