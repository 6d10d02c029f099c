//! Tag extraction from source code.
//!
//! Tree-sitter grammars and per-language `.scm` queries turn source files
//! into `Tag` streams. Languages whose query ships no reference captures get
//! a lexical fallback pass so the reference graph still has edges to work
//! with.

mod lexical;
mod treesitter;

pub use treesitter::{extension_to_language, language_for_path, TagExtractor};
