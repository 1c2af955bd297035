//! Per-type provider configuration

use cfgstore_core::{
    Error, Record, Result, StorageFormat, DEFAULT_COLLECTION_FILE_STEM, DEFAULT_CONTAINER_FIELD,
    DEFAULT_DIRECTORY_SUFFIX, DEFAULT_FILE_EXTENSION, DEFAULT_LAST_MODIFIED_FIELD,
};
use cfgstore_utils::directory_for_type;
use std::path::{Path, PathBuf};

/// How a [`crate::FileStorageProvider`] lays out its directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderOptions {
    /// Directory owned by the provider
    pub directory: PathBuf,
    /// Collection file new records are appended to
    pub default_file_name: String,
    /// Extension of data files considered by a full scan
    pub file_extension: String,
    /// List field name inside container files
    pub container_field: String,
    /// Timestamp field refreshed on every container rewrite
    pub last_modified_field: String,
    /// Index every data file in the directory instead of the default file only
    pub scan_all_files: bool,
    /// Format every file is read and written as; `Auto` sniffs content
    pub fixed_format: StorageFormat,
    /// Format used when the target file does not exist yet
    pub new_record_format: StorageFormat,
}

impl ProviderOptions {
    /// Options for `directory` with conventional defaults
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            default_file_name: format!("{DEFAULT_COLLECTION_FILE_STEM}.{DEFAULT_FILE_EXTENSION}"),
            file_extension: DEFAULT_FILE_EXTENSION.to_string(),
            container_field: DEFAULT_CONTAINER_FIELD.to_string(),
            last_modified_field: DEFAULT_LAST_MODIFIED_FIELD.to_string(),
            scan_all_files: false,
            fixed_format: StorageFormat::Auto,
            new_record_format: StorageFormat::Array,
        }
    }

    /// Options for record type `R`, stored under `base_dir` by naming convention
    pub fn for_type<R: Record>(base_dir: &Path) -> Self {
        Self::new(directory_for_type(
            base_dir,
            R::TYPE_TAG,
            DEFAULT_DIRECTORY_SUFFIX,
        ))
    }

    pub fn default_file_name(mut self, name: impl Into<String>) -> Self {
        self.default_file_name = name.into();
        self
    }

    pub fn file_extension(mut self, extension: impl Into<String>) -> Self {
        self.file_extension = extension.into();
        self
    }

    pub fn container_field(mut self, field: impl Into<String>) -> Self {
        self.container_field = field.into();
        self
    }

    pub fn last_modified_field(mut self, field: impl Into<String>) -> Self {
        self.last_modified_field = field.into();
        self
    }

    pub fn scan_all_files(mut self, scan: bool) -> Self {
        self.scan_all_files = scan;
        self
    }

    pub fn fixed_format(mut self, format: StorageFormat) -> Self {
        self.fixed_format = format;
        self
    }

    pub fn new_record_format(mut self, format: StorageFormat) -> Self {
        self.new_record_format = format;
        self
    }

    /// Path of the default collection file
    pub fn default_file_path(&self) -> PathBuf {
        self.directory.join(&self.default_file_name)
    }

    /// Reject option combinations the provider cannot honour
    pub fn validate(&self, type_tag: &str) -> Result<()> {
        let fail = |message: String| {
            Err(Error::ProviderInit {
                type_tag: type_tag.to_string(),
                message,
            })
        };

        if self.default_file_name.trim().is_empty() {
            return fail("default file name is empty".to_string());
        }
        if self.default_file_name.contains(['/', '\\']) {
            return fail(format!(
                "default file name '{}' must not contain path separators",
                self.default_file_name
            ));
        }
        if self.container_field.trim().is_empty() {
            return fail("container field name is empty".to_string());
        }
        if self.directory.is_file() {
            return fail(format!(
                "storage path '{}' is a file, not a directory",
                self.directory.display()
            ));
        }
        if !self.new_record_format.is_resolved() && !self.fixed_format.is_resolved() {
            return fail("new record format must not be auto".to_string());
        }
        Ok(())
    }

    /// Format new records are written in when nothing on disk says otherwise
    pub fn effective_new_format(&self) -> StorageFormat {
        if self.fixed_format.is_resolved() {
            self.fixed_format
        } else {
            self.new_record_format
        }
    }
}
