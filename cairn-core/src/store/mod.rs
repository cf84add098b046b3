//! Persistent state: the identity cache, its legacy adapters, and atomic
//! file writes shared by every output.

pub mod atomic;
pub mod cache;
pub mod migrate;

pub use atomic::{contained_join, write_atomic, write_json_atomic};
pub use cache::{CACHE_SCHEMA_VERSION, CacheEntry, CacheStats, IdentityCache, LoadedCache};
