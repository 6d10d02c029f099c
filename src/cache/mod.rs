//! Persistent tag cache.
//!
//! Caches extracted tags per `(path, mtime)` key so warm runs skip parsing
//! entirely. Backed by redb with bincode-serialized values.

mod store;

pub use store::{CacheConfig, CacheStats, TagCache};
