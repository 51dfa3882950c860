//! Device-local license cache for Keyward.
//!
//! Mirrors the last known authoritative state of each token this device
//! has validated, so validation can survive the authority being
//! unreachable. A per-token logged-out sentinel disables that fallback until
//! the next successful online check.
//!
//! Storage is a single SQLite file whose schema is brought up to date by
//! explicit, versioned migrations before the cache is used.

mod entry;
mod error;
pub mod migrations;
mod store;

pub use entry::{CacheEntry, CacheLookup};
pub use error::{CacheError, CacheResult};
pub use store::{DEFAULT_CACHE_FILE, LocalLicenseCache};
