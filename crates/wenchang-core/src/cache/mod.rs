//! Caching module.
//!
//! - `TtlCache`: in-memory collections keyed by logical name, each entry
//!   expiring after the configured TTL (5 minutes by default)
//! - `ListingStore`: directory listings persisted to the user cache dir so
//!   they survive restarts within the same TTL window

pub mod listing;
pub mod manager;

pub use listing::ListingStore;
pub use manager::{CachedData, TtlCache};
