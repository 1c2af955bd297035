//! Shared value types: storage formats, index entries, change kinds and
//! batch results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// On-disk shape of a config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StorageFormat {
    /// Not yet known; resolved once by sniffing the file content
    #[default]
    Auto,
    /// One record per file
    SingleObject,
    /// Bare JSON array of records
    Array,
    /// Object wrapping a named list field plus metadata
    Container,
}

impl StorageFormat {
    /// Index storage mode for records found in a file of this format
    pub fn storage_mode(self) -> StorageMode {
        match self {
            StorageFormat::SingleObject => StorageMode::SingleFile,
            _ => StorageMode::Collection,
        }
    }

    pub fn is_resolved(self) -> bool {
        self != StorageFormat::Auto
    }
}

impl std::fmt::Display for StorageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StorageFormat::Auto => "auto",
            StorageFormat::SingleObject => "single-object",
            StorageFormat::Array => "array",
            StorageFormat::Container => "container",
        };
        f.write_str(name)
    }
}

/// Whether a record owns its file or shares it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageMode {
    SingleFile,
    Collection,
}

/// Location of one record inside a provider's directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub file_name: String,
    pub storage_mode: StorageMode,
}

/// Record lifecycle transition carried by change events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeType {
    Created,
    Added,
    Updated,
    Deleted,
    Reloaded,
    Imported,
}

/// Failure semantics for a batch of operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchMode {
    /// Run everything, report failures per item
    #[default]
    Lenient,
    /// Stop at the first failure and roll back what already ran
    Strict,
}

impl std::str::FromStr for BatchMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(BatchMode::Lenient),
            "strict" => Ok(BatchMode::Strict),
            other => Err(format!("unknown batch mode '{other}'")),
        }
    }
}

/// Per-item outcome of a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOperationResult {
    pub success_count: usize,
    pub failure_count: usize,
    /// Operation label to error message
    pub failures: BTreeMap<String, String>,
}

impl BatchOperationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self) {
        self.success_count += 1;
    }

    /// Record a failed item. A repeated label gets a `#n` suffix.
    pub fn record_failure(&mut self, label: impl Into<String>, message: impl Into<String>) {
        self.failure_count += 1;
        let label = label.into();
        let mut key = label.clone();
        let mut n = 2;
        while self.failures.contains_key(&key) {
            key = format!("{label}#{n}");
            n += 1;
        }
        self.failures.insert(key, message.into());
    }

    pub fn total_count(&self) -> usize {
        self.success_count + self.failure_count
    }

    pub fn is_fully_successful(&self) -> bool {
        self.failure_count == 0
    }

    /// Some items succeeded and some failed
    pub fn is_partially_successful(&self) -> bool {
        self.success_count > 0 && self.failure_count > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_storage_mode_from_format() {
        assert_eq!(
            StorageFormat::SingleObject.storage_mode(),
            StorageMode::SingleFile
        );
        assert_eq!(StorageFormat::Array.storage_mode(), StorageMode::Collection);
        assert_eq!(
            StorageFormat::Container.storage_mode(),
            StorageMode::Collection
        );
        assert!(!StorageFormat::Auto.is_resolved());
    }

    #[test]
    fn test_batch_result_flags() {
        let mut result = BatchOperationResult::new();
        result.record_success();
        assert!(result.is_fully_successful());
        assert!(!result.is_partially_successful());

        result.record_failure("delete:B", "not found");
        assert_eq!(result.total_count(), 2);
        assert!(result.is_partially_successful());
        assert_eq!(result.failures["delete:B"], "not found");

        result.record_failure("delete:B", "again");
        assert_eq!(result.failures["delete:B#2"], "again");
        assert_eq!(result.failure_count, 2);
    }

    #[test]
    fn test_batch_mode_parse() {
        assert_eq!("Strict".parse::<BatchMode>().unwrap(), BatchMode::Strict);
        assert_eq!(" lenient ".parse::<BatchMode>().unwrap(), BatchMode::Lenient);
        assert!("sometimes".parse::<BatchMode>().is_err());
    }

    proptest! {
        #[test]
        fn prop_every_failure_keeps_its_own_entry(labels in proptest::collection::vec("[ab]{1,2}", 0..24), successes in 0usize..8) {
            let mut result = BatchOperationResult::new();
            for _ in 0..successes {
                result.record_success();
            }
            for label in &labels {
                result.record_failure(label.as_str(), "failed");
            }
            prop_assert_eq!(result.failures.len(), labels.len());
            prop_assert_eq!(result.total_count(), successes + labels.len());
        }
    }
}
