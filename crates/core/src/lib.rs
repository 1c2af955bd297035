//! Core domain types, errors, and constants for `cfgstore`.
//!
//! ## Key Components
//!
//! - **`errors`**: the `Error` enum, its `ErrorCode`/`ErrorCategory`
//!   taxonomy and the `Result` alias.
//! - **`record`**: the `Record` trait every persisted type implements and
//!   the shared `RecordMeta` block.
//! - **`types`**: storage formats, index entries, change kinds and batch
//!   results.
//! - **`capabilities`**: static per-field update policies.
//! - **`events`**: type-keyed change notifications.

pub mod capabilities;
pub mod constants;
pub mod errors;
pub mod events;
pub mod record;
pub mod types;

pub use self::{
    capabilities::{CapabilityTable, FieldCapability, UpdatePolicy},
    constants::*,
    errors::{Error, ErrorCategory, ErrorCode, IoDirection, Operation, Result, ResultExt},
    events::{EventEmitter, PublishReport, SubscriberError, SubscriptionId},
    record::{basic_validation, clone_via_serde, Record, RecordMeta, Validation},
    types::*,
};
