//! Record cache for cfgstore
//!
//! An in-memory map keyed by `(type tag, id)` holding the last persisted copy
//! of each record, with hit/miss accounting. Entries are only removed on
//! request: record sets are bounded by configuration, not by traffic.

pub mod record_cache;
pub mod statistics;

pub use record_cache::{CacheKey, RecordCache};
pub use statistics::CacheStatistics;
