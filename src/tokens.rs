//! Token counting for budget fitting.
//!
//! The core treats token counting as an injected `text -> usize` function so
//! callers can plug in whatever tokenizer matches their model. The defaults
//! here use tiktoken encodings, lazily initialized; if an encoding fails to
//! load, counting falls back to a character estimate rather than erroring.

use once_cell::sync::Lazy;
use tiktoken_rs::CoreBPE;

/// Injected token counter. Different models use different BPE vocabularies,
/// so the pipeline never hardcodes one.
pub type TokenCounter = Box<dyn Fn(&str) -> usize + Send + Sync>;

static CL100K: Lazy<Option<CoreBPE>> = Lazy::new(|| {
    tiktoken_rs::cl100k_base()
        .map_err(|e| eprintln!("Warning: failed to load cl100k_base tokenizer: {}", e))
        .ok()
});

static O200K: Lazy<Option<CoreBPE>> = Lazy::new(|| {
    tiktoken_rs::o200k_base()
        .map_err(|e| eprintln!("Warning: failed to load o200k_base tokenizer: {}", e))
        .ok()
});

/// 1 token ~= 4 characters. Used when no BPE is available.
fn char_estimate(text: &str) -> usize {
    (text.len() + 3) / 4
}

/// Count tokens with the cl100k_base encoding.
pub fn count_tokens(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    match CL100K.as_ref() {
        Some(bpe) => bpe.encode_ordinary(text).len(),
        None => char_estimate(text),
    }
}

/// Build a token counter for a model name.
///
/// The mapping is deliberately coarse: newer OpenAI-family models use
/// o200k_base, everything else gets cl100k_base. Unknown names are fine.
pub fn counter_for_model(model: &str) -> TokenCounter {
    let model = model.to_ascii_lowercase();
    let use_o200k = model.contains("gpt-4o") || model.contains("o200k");

    Box::new(move |text: &str| {
        if text.is_empty() {
            return 0;
        }
        let bpe = if use_o200k { O200K.as_ref() } else { CL100K.as_ref() };
        match bpe {
            Some(bpe) => bpe.encode_ordinary(text).len(),
            None => char_estimate(text),
        }
    })
}

/// Estimate the token count of a large text by sampling.
///
/// Full BPE encoding of every candidate rendering makes the budget fitter's
/// binary search slow on big repos. For texts of 200+ bytes, encode every
/// `num_lines / 100`-th line and scale by byte length. Short texts are
/// counted exactly.
pub fn estimate_tokens(text: &str, counter: &(dyn Fn(&str) -> usize + Send + Sync)) -> usize {
    if text.is_empty() {
        return 0;
    }
    if text.len() < 200 {
        return counter(text);
    }

    let lines: Vec<&str> = text.split_inclusive('\n').collect();
    let step = (lines.len() / 100).max(1);
    let sample: String = lines.iter().step_by(step).copied().collect();

    if sample.is_empty() {
        return counter(text);
    }

    let sample_tokens = counter(&sample) as f64;
    let scaled = sample_tokens / sample.len() as f64 * text.len() as f64;
    scaled as usize
}
