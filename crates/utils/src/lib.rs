//! Shared utilities for cfgstore
//!
//! File helpers used by the storage provider and the transaction rollback
//! path, plus logging setup.

pub mod atomic_file;
pub mod paths;
pub mod snapshot;
pub mod tracing;

pub use atomic_file::*;
pub use paths::*;
pub use snapshot::FileSnapshot;
