//! File-backed storage for cfgstore records
//!
//! A provider owns one directory per record type. It detects the on-disk
//! format of each file (single object, bare array, or container object),
//! keeps a lazily built id→file index, and performs whole-file
//! load-modify-rewrite updates through atomic writes.

pub mod format;
pub mod index;
pub mod options;
pub mod provider;

pub use format::{Document, FormatCodec};
pub use index::RecordIndex;
pub use options::ProviderOptions;
pub use provider::{FileStorageProvider, SaveOutcome, StorageProvider};
