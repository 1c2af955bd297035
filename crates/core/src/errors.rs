use std::path::PathBuf;

/// Result type alias for cfgstore operations
pub type Result<T> = std::result::Result<T, Error>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Broad failure band an [`Error`] belongs to.
///
/// Callers branch on the category (or the finer [`ErrorCode`]) rather than
/// parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Validation,
    FileSystem,
    Serialization,
    Operation,
    Provider,
    Factory,
    Cache,
    Transaction,
    Configuration,
}

/// Specific failure code within an [`ErrorCategory`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Validation
    MissingId,
    DuplicateId,
    InvalidName,
    VersionConflict,
    ValidationFailed,
    // File system
    FileNotFound,
    AccessDenied,
    ReadError,
    WriteError,
    DirectoryMissing,
    // Serialization
    ParseError,
    SerializeError,
    DeserializeError,
    FormatInvalid,
    // Operation
    NotFound,
    AlreadyExists,
    CreateFailed,
    UpdateFailed,
    DeleteFailed,
    CloneFailed,
    ImportFailed,
    ExportFailed,
    // Provider
    ProviderNotRegistered,
    ProviderInitFailed,
    ProviderOperationFailed,
    // Factory
    FactoryNotRegistered,
    FactoryCreateFailed,
    // Cache
    CacheOperationFailed,
    // Transaction
    TransactionBeginFailed,
    TransactionCommitFailed,
    TransactionRollbackFailed,
    BatchPartialFailure,
    // Configuration
    ConfigInvalid,
}

impl ErrorCode {
    pub fn category(self) -> ErrorCategory {
        use ErrorCode::*;
        match self {
            MissingId | DuplicateId | InvalidName | VersionConflict | ValidationFailed => {
                ErrorCategory::Validation
            }
            FileNotFound | AccessDenied | ReadError | WriteError | DirectoryMissing => {
                ErrorCategory::FileSystem
            }
            ParseError | SerializeError | DeserializeError | FormatInvalid => {
                ErrorCategory::Serialization
            }
            NotFound | AlreadyExists | CreateFailed | UpdateFailed | DeleteFailed
            | CloneFailed | ImportFailed | ExportFailed => ErrorCategory::Operation,
            ProviderNotRegistered | ProviderInitFailed | ProviderOperationFailed => {
                ErrorCategory::Provider
            }
            FactoryNotRegistered | FactoryCreateFailed => ErrorCategory::Factory,
            CacheOperationFailed => ErrorCategory::Cache,
            TransactionBeginFailed
            | TransactionCommitFailed
            | TransactionRollbackFailed
            | BatchPartialFailure => ErrorCategory::Transaction,
            ConfigInvalid => ErrorCategory::Configuration,
        }
    }
}

/// The manager-level operation a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Update,
    Delete,
    Clone,
    Import,
    Export,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Clone => "clone",
            Operation::Import => "import",
            Operation::Export => "export",
        };
        f.write_str(name)
    }
}

/// Direction of a failed file system call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoDirection {
    Read,
    Write,
}

/// Core error type for cfgstore operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Record has no id where one is required
    #[error("{type_tag} record has no id")]
    MissingId { type_tag: String },

    /// Id already used by another record of the same type
    #[error("duplicate id '{id}' for {type_tag}")]
    DuplicateId { type_tag: String, id: String },

    /// Name rejected by the record's validation
    #[error("invalid name for '{id}': {message}")]
    InvalidName { id: String, message: String },

    /// Stored version does not match the caller's copy
    #[error("version conflict for '{id}': expected {expected}, found {actual}")]
    VersionConflict { id: String, expected: u64, actual: u64 },

    /// Record failed its own validation
    #[error("validation failed for '{id}': {}", .messages.join("; "))]
    ValidationFailed { id: String, messages: Vec<String> },

    /// A file the operation needs does not exist
    #[error("file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Permission denied while touching a file
    #[error("access denied for {operation} on '{path}'")]
    AccessDenied { path: PathBuf, operation: String },

    /// File system operations
    #[error("file system {operation} operation failed for '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        direction: IoDirection,
        #[source]
        source: std::io::Error,
    },

    /// Storage directory is absent and could not be created
    #[error("storage directory missing: '{path}'")]
    DirectoryMissing { path: PathBuf },

    /// File content could not be parsed as JSON
    #[error("failed to parse '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    /// Record could not be turned into JSON
    #[error("failed to serialize {type_tag}: {source}")]
    Serialize {
        type_tag: String,
        #[source]
        source: serde_json::Error,
    },

    /// JSON could not be turned into a record
    #[error("failed to deserialize {type_tag} from '{path}': {source}")]
    Deserialize {
        type_tag: String,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// File content is not one of the supported storage formats
    #[error("invalid storage format in '{path}': {message}")]
    FormatInvalid { path: PathBuf, message: String },

    /// No record with this id
    #[error("{type_tag} '{id}' not found")]
    NotFound { type_tag: String, id: String },

    /// A record with this id already exists
    #[error("{type_tag} '{id}' already exists")]
    AlreadyExists { type_tag: String, id: String },

    /// A manager operation failed for a reason reported by a hook or a nested step
    #[error("{operation} of '{id}' failed: {message}")]
    OperationFailed {
        operation: Operation,
        id: String,
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// No provider registered for the record type
    #[error("no storage provider registered for {type_tag}")]
    ProviderNotRegistered { type_tag: String },

    /// Provider could not be initialised
    #[error("storage provider for {type_tag} failed to initialise: {message}")]
    ProviderInit { type_tag: String, message: String },

    /// Provider reported a failure the manager wraps with context
    #[error("storage provider {operation} failed for {type_tag} '{id}': {source}")]
    ProviderOperation {
        type_tag: String,
        operation: String,
        id: String,
        #[source]
        source: Box<Error>,
    },

    /// No factory registered for the record type
    #[error("no factory registered for {type_tag}")]
    FactoryNotRegistered { type_tag: String },

    /// Factory failed to build a record
    #[error("factory for {type_tag} could not create '{id}': {message}")]
    FactoryCreate {
        type_tag: String,
        id: String,
        message: String,
    },

    /// Cache misuse, e.g. a key holding another record type
    #[error("cache operation failed: {message}")]
    CacheOperation { message: String },

    #[error("failed to begin transaction: {message}")]
    TransactionBegin { message: String },

    #[error("failed to commit transaction {transaction_id}: {message}")]
    TransactionCommit { transaction_id: u64, message: String },

    #[error("rollback of transaction {transaction_id} incomplete: {message}")]
    TransactionRollback { transaction_id: u64, message: String },

    /// Strict batch stopped at `operation` and rolled back
    #[error("batch aborted at '{operation}' after {completed} completed operations (rolled back): {source}")]
    BatchPartialFailure {
        operation: String,
        completed: usize,
        #[source]
        source: Box<Error>,
    },

    /// Manager configuration could not be loaded or is invalid
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl From<anyhow::Error> for Error {
    fn from(error: anyhow::Error) -> Self {
        Error::Configuration {
            message: format!("{error:#}"),
        }
    }
}

// Helper methods for creating errors with context
impl Error {
    /// Specific code of this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::MissingId { .. } => ErrorCode::MissingId,
            Error::DuplicateId { .. } => ErrorCode::DuplicateId,
            Error::InvalidName { .. } => ErrorCode::InvalidName,
            Error::VersionConflict { .. } => ErrorCode::VersionConflict,
            Error::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            Error::FileNotFound { .. } => ErrorCode::FileNotFound,
            Error::AccessDenied { .. } => ErrorCode::AccessDenied,
            Error::FileSystem { direction, .. } => match direction {
                IoDirection::Read => ErrorCode::ReadError,
                IoDirection::Write => ErrorCode::WriteError,
            },
            Error::DirectoryMissing { .. } => ErrorCode::DirectoryMissing,
            Error::Parse { .. } => ErrorCode::ParseError,
            Error::Serialize { .. } => ErrorCode::SerializeError,
            Error::Deserialize { .. } => ErrorCode::DeserializeError,
            Error::FormatInvalid { .. } => ErrorCode::FormatInvalid,
            Error::NotFound { .. } => ErrorCode::NotFound,
            Error::AlreadyExists { .. } => ErrorCode::AlreadyExists,
            Error::OperationFailed { operation, .. } => match operation {
                Operation::Create => ErrorCode::CreateFailed,
                Operation::Update => ErrorCode::UpdateFailed,
                Operation::Delete => ErrorCode::DeleteFailed,
                Operation::Clone => ErrorCode::CloneFailed,
                Operation::Import => ErrorCode::ImportFailed,
                Operation::Export => ErrorCode::ExportFailed,
            },
            Error::ProviderNotRegistered { .. } => ErrorCode::ProviderNotRegistered,
            Error::ProviderInit { .. } => ErrorCode::ProviderInitFailed,
            Error::ProviderOperation { .. } => ErrorCode::ProviderOperationFailed,
            Error::FactoryNotRegistered { .. } => ErrorCode::FactoryNotRegistered,
            Error::FactoryCreate { .. } => ErrorCode::FactoryCreateFailed,
            Error::CacheOperation { .. } => ErrorCode::CacheOperationFailed,
            Error::TransactionBegin { .. } => ErrorCode::TransactionBeginFailed,
            Error::TransactionCommit { .. } => ErrorCode::TransactionCommitFailed,
            Error::TransactionRollback { .. } => ErrorCode::TransactionRollbackFailed,
            Error::BatchPartialFailure { .. } => ErrorCode::BatchPartialFailure,
            Error::Configuration { .. } => ErrorCode::ConfigInvalid,
        }
    }

    /// Category of this error
    pub fn category(&self) -> ErrorCategory {
        self.code().category()
    }

    /// Code of the innermost wrapped error
    pub fn root_code(&self) -> ErrorCode {
        match self {
            Error::ProviderOperation { source, .. } | Error::BatchPartialFailure { source, .. } => {
                source.root_code()
            }
            Error::OperationFailed {
                source: Some(source),
                ..
            } => source.root_code(),
            other => other.code(),
        }
    }

    /// Human-readable message
    pub fn message(&self) -> String {
        self.to_string()
    }

    pub fn is_not_found(&self) -> bool {
        self.root_code() == ErrorCode::NotFound
    }

    #[must_use]
    pub fn not_found(type_tag: impl Into<String>, id: impl Into<String>) -> Self {
        Error::NotFound {
            type_tag: type_tag.into(),
            id: id.into(),
        }
    }

    #[must_use]
    pub fn already_exists(type_tag: impl Into<String>, id: impl Into<String>) -> Self {
        Error::AlreadyExists {
            type_tag: type_tag.into(),
            id: id.into(),
        }
    }

    /// Create a file system error from an I/O failure.
    ///
    /// `NotFound` and `PermissionDenied` kinds map to their own codes.
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        direction: IoDirection,
        source: std::io::Error,
    ) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound { path },
            std::io::ErrorKind::PermissionDenied => Error::AccessDenied {
                path,
                operation: operation.into(),
            },
            _ => Error::FileSystem {
                path,
                operation: operation.into(),
                direction,
                source,
            },
        }
    }

    /// Shorthand for a failed read
    #[must_use]
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::file_system(path, "read", IoDirection::Read, source)
    }

    /// Shorthand for a failed write
    #[must_use]
    pub fn write(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Self::file_system(path, operation, IoDirection::Write, source)
    }

    #[must_use]
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn format_invalid(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::FormatInvalid {
            path: path.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn operation_failed(
        operation: Operation,
        id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::OperationFailed {
            operation,
            id: id.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Wrap a provider failure, keeping `NotFound` and `AlreadyExists` untouched
    #[must_use]
    pub fn provider(
        type_tag: impl Into<String>,
        operation: impl Into<String>,
        id: impl Into<String>,
        source: Error,
    ) -> Self {
        match source {
            e @ (Error::NotFound { .. } | Error::AlreadyExists { .. }) => e,
            e @ Error::ProviderOperation { .. } => e,
            source => Error::ProviderOperation {
                type_tag: type_tag.into(),
                operation: operation.into(),
                id: id.into(),
                source: Box::new(source),
            },
        }
    }

    #[must_use]
    pub fn cache(message: impl Into<String>) -> Self {
        Error::CacheOperation {
            message: message.into(),
        }
    }

    /// Error raised by a subscriber or hook that is not itself a cfgstore error
    #[must_use]
    pub fn from_boxed(operation: Operation, id: impl Into<String>, error: BoxError) -> Self {
        match error.downcast::<Error>() {
            Ok(inner) => Error::OperationFailed {
                operation,
                id: id.into(),
                message: inner.to_string(),
                source: Some(inner),
            },
            Err(other) => Self::operation_failed(operation, id, other.to_string()),
        }
    }
}

/// Extension trait for attaching manager context to results
pub trait ResultExt<T> {
    /// Wrap a failure as a failed `operation` on record `id`.
    ///
    /// Errors callers branch on directly (missing records, validation,
    /// registration) pass through unchanged.
    fn for_operation(self, operation: Operation, id: &str) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn for_operation(self, operation: Operation, id: &str) -> Result<T> {
        self.map_err(|e| match e {
            e @ (Error::OperationFailed { .. }
            | Error::NotFound { .. }
            | Error::AlreadyExists { .. }
            | Error::MissingId { .. }
            | Error::ValidationFailed { .. }
            | Error::VersionConflict { .. }
            | Error::ProviderNotRegistered { .. }
            | Error::FactoryNotRegistered { .. }) => e,
            other => Error::OperationFailed {
                operation,
                id: id.to_string(),
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        })
    }
}
