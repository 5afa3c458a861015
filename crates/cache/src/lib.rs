//! Pagedeck Cache Library
//!
//! Rendered-bitmap cache with LRU eviction bounded by both entry count and
//! byte budget, plus deterministic cache key derivation for render requests.

pub mod config;
pub mod key;
pub mod store;

pub use config::{CacheConfig, ConfigError};
pub use key::{CacheKey, RenderRequest, SourceId};
pub use store::{BitmapCache, CacheStats};
