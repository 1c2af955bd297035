//! The contract every storable record satisfies.
//!
//! A record carries a [`RecordMeta`] block (identity, display name,
//! timestamps, version and type tag) flattened into its serialized form, and
//! implements [`Record`] to expose it. Validation and the pre-save/post-load
//! hooks are optional: the default implementations accept everything.

use crate::capabilities::CapabilityTable;
use crate::errors::{Error, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Identity and bookkeeping fields shared by all records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMeta {
    /// Unique within the record type; empty while transient
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default = "initial_version")]
    pub version: u64,
    #[serde(default)]
    pub type_tag: String,
}

fn initial_version() -> u64 {
    1
}

impl RecordMeta {
    /// Fresh metadata for a record of `type_tag`
    pub fn new(type_tag: &str, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            created_at: Utc::now(),
            updated_at: None,
            version: initial_version(),
            type_tag: type_tag.to_string(),
        }
    }

    /// A record without an id has never been persisted
    pub fn is_transient(&self) -> bool {
        self.id.is_empty()
    }

    /// Bump the version and stamp `updated_at`
    pub fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Some(Utc::now());
    }

    /// Reset identity for a copy stored under `new_id`
    pub fn reassign(&mut self, new_id: impl Into<String>) {
        self.id = new_id.into();
        self.created_at = Utc::now();
        self.updated_at = None;
        self.version = initial_version();
    }
}

/// Outcome of [`Record::validate`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    pub errors: Vec<String>,
}

impl Validation {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Convert into a `Result`, attaching the record id
    pub fn into_result(self, id: &str) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(Error::ValidationFailed {
                id: id.to_string(),
                messages: self.errors,
            })
        }
    }
}

/// A typed, identified, persistable unit of configuration
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Tag naming the concrete shape; doubles as the registry key
    const TYPE_TAG: &'static str;

    fn meta(&self) -> &RecordMeta;

    fn meta_mut(&mut self) -> &mut RecordMeta;

    fn id(&self) -> &str {
        &self.meta().id
    }

    fn name(&self) -> &str {
        &self.meta().name
    }

    fn version(&self) -> u64 {
        self.meta().version
    }

    /// Check the record before it is persisted
    fn validate(&self) -> Validation {
        Validation::ok()
    }

    /// Runs right before persistence; an error aborts the write
    fn before_save(&mut self) -> Result<()> {
        Ok(())
    }

    /// Runs right after a load from storage; errors are logged, not fatal
    fn after_load(&mut self) -> Result<()> {
        Ok(())
    }

    /// Deep copy used by clone and template operations
    fn duplicate(&self) -> Self {
        self.clone()
    }

    /// Static per-field update policies
    fn capabilities() -> CapabilityTable {
        CapabilityTable::default()
    }
}

/// Deep copy through a JSON round-trip.
///
/// Fallback for records whose `duplicate` cannot be expressed with `Clone`.
pub fn clone_via_serde<R: Record>(record: &R) -> Result<R> {
    let value = serde_json::to_value(record).map_err(|source| Error::Serialize {
        type_tag: R::TYPE_TAG.to_string(),
        source,
    })?;
    serde_json::from_value(value).map_err(|source| Error::Deserialize {
        type_tag: R::TYPE_TAG.to_string(),
        path: Default::default(),
        source,
    })
}

/// Checks every record gets regardless of its own `validate`
pub fn basic_validation<R: Record>(record: &R) -> Validation {
    let mut validation = Validation::ok();
    let meta = record.meta();
    if meta.id.trim().is_empty() {
        validation.push("id must not be empty");
    }
    if meta.id.chars().any(|c| c.is_control() || c == '/' || c == '\\') {
        validation.push(format!("id '{}' contains invalid characters", meta.id));
    }
    if meta.version == 0 {
        validation.push("version must start at 1");
    }
    validation
}
