//! Manager configuration.
//!
//! Values are resolved in precedence order: builder overrides, then the
//! environment (`CFGSTORE_BASE_DIR`, `CFGSTORE_BATCH_MODE`), then an optional
//! JSON file, then built-in defaults. The winning source of every field is
//! kept so it can be reported.

use anyhow::Context;
use cfgstore_core::{
    BatchMode, Record, Result, StorageFormat, CFGSTORE_BASE_DIR_VAR, CFGSTORE_BATCH_MODE_VAR,
    DEFAULT_COLLECTION_FILE_STEM, DEFAULT_CONTAINER_FIELD, DEFAULT_DIRECTORY_SUFFIX,
    DEFAULT_FILE_EXTENSION, DEFAULT_LAST_MODIFIED_FIELD,
};
use cfgstore_storage::ProviderOptions;
use cfgstore_utils::directory_for_type;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where a configuration value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Default,
    File(PathBuf),
    Environment(&'static str),
    Builder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ManagerConfig {
    /// Root under which every record type gets its own directory
    pub base_dir: PathBuf,
    /// Stripped from the type tag to name a type's directory
    pub directory_suffix: String,
    pub file_extension: String,
    pub container_field: String,
    pub last_modified_field: String,
    /// Mode used by batch calls that do not name one
    pub default_batch_mode: BatchMode,
    /// Index every data file of a type directory, not only the default file
    pub scan_all_files: bool,
    /// Format of files created for new records
    pub new_record_format: StorageFormat,
    #[serde(skip)]
    sources: BTreeMap<&'static str, ConfigSource>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("config"),
            directory_suffix: DEFAULT_DIRECTORY_SUFFIX.to_string(),
            file_extension: DEFAULT_FILE_EXTENSION.to_string(),
            container_field: DEFAULT_CONTAINER_FIELD.to_string(),
            last_modified_field: DEFAULT_LAST_MODIFIED_FIELD.to_string(),
            default_batch_mode: BatchMode::default(),
            scan_all_files: false,
            new_record_format: StorageFormat::Array,
            sources: BTreeMap::new(),
        }
    }
}

impl ManagerConfig {
    /// Defaults rooted at `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let mut config = Self {
            base_dir: base_dir.into(),
            ..Self::default()
        };
        config.sources.insert("baseDir", ConfigSource::Builder);
        config
    }

    pub fn builder() -> ManagerConfigBuilder {
        ManagerConfigBuilder::default()
    }

    /// Load a JSON config file over the defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        Ok(read_config_file(path)?)
    }

    /// Source of a field, keyed by its camelCase name
    pub fn source_of(&self, field: &str) -> ConfigSource {
        self.sources
            .get(field)
            .cloned()
            .unwrap_or(ConfigSource::Default)
    }

    /// Provider layout for record type `R` under this configuration
    pub fn provider_options<R: Record>(&self) -> ProviderOptions {
        let directory = directory_for_type(&self.base_dir, R::TYPE_TAG, &self.directory_suffix);
        ProviderOptions::new(directory)
            .default_file_name(format!(
                "{DEFAULT_COLLECTION_FILE_STEM}.{}",
                self.file_extension
            ))
            .file_extension(self.file_extension.clone())
            .container_field(self.container_field.clone())
            .last_modified_field(self.last_modified_field.clone())
            .scan_all_files(self.scan_all_files)
            .new_record_format(self.new_record_format)
    }

    fn apply_environment(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<()> {
        if let Some(dir) = lookup(CFGSTORE_BASE_DIR_VAR).filter(|v| !v.trim().is_empty()) {
            self.base_dir = PathBuf::from(dir);
            self.sources
                .insert("baseDir", ConfigSource::Environment(CFGSTORE_BASE_DIR_VAR));
        }
        if let Some(mode) = lookup(CFGSTORE_BATCH_MODE_VAR).filter(|v| !v.trim().is_empty()) {
            self.default_batch_mode = mode
                .parse()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("invalid {CFGSTORE_BATCH_MODE_VAR}"))?;
            self.sources.insert(
                "defaultBatchMode",
                ConfigSource::Environment(CFGSTORE_BATCH_MODE_VAR),
            );
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> anyhow::Result<ManagerConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file '{}'", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("config file '{}' is not valid JSON", path.display()))?;
    let present: Vec<String> = value
        .as_object()
        .map(|object| object.keys().cloned().collect())
        .unwrap_or_default();
    let mut config: ManagerConfig = serde_json::from_value(value)
        .with_context(|| format!("config file '{}' has invalid settings", path.display()))?;

    for field in FIELDS {
        if present.iter().any(|key| key == field) {
            config
                .sources
                .insert(field, ConfigSource::File(path.to_path_buf()));
        }
    }
    debug!(path = %path.display(), fields = present.len(), "Loaded manager config file");
    Ok(config)
}

const FIELDS: [&str; 8] = [
    "baseDir",
    "directorySuffix",
    "fileExtension",
    "containerField",
    "lastModifiedField",
    "defaultBatchMode",
    "scanAllFiles",
    "newRecordFormat",
];

/// Layered construction of a [`ManagerConfig`]
#[derive(Debug, Clone, Default)]
pub struct ManagerConfigBuilder {
    file: Option<PathBuf>,
    skip_environment: bool,
    base_dir: Option<PathBuf>,
    directory_suffix: Option<String>,
    file_extension: Option<String>,
    container_field: Option<String>,
    last_modified_field: Option<String>,
    default_batch_mode: Option<BatchMode>,
    scan_all_files: Option<bool>,
    new_record_format: Option<StorageFormat>,
}

impl ManagerConfigBuilder {
    /// Read a JSON file below the environment layer
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    /// Do not consult `CFGSTORE_*` variables
    pub fn ignore_environment(mut self) -> Self {
        self.skip_environment = true;
        self
    }

    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn directory_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.directory_suffix = Some(suffix.into());
        self
    }

    pub fn file_extension(mut self, extension: impl Into<String>) -> Self {
        self.file_extension = Some(extension.into());
        self
    }

    pub fn container_field(mut self, field: impl Into<String>) -> Self {
        self.container_field = Some(field.into());
        self
    }

    pub fn last_modified_field(mut self, field: impl Into<String>) -> Self {
        self.last_modified_field = Some(field.into());
        self
    }

    pub fn default_batch_mode(mut self, mode: BatchMode) -> Self {
        self.default_batch_mode = Some(mode);
        self
    }

    pub fn scan_all_files(mut self, scan: bool) -> Self {
        self.scan_all_files = Some(scan);
        self
    }

    pub fn new_record_format(mut self, format: StorageFormat) -> Self {
        self.new_record_format = Some(format);
        self
    }

    /// Resolve against the process environment
    pub fn build(self) -> Result<ManagerConfig> {
        self.build_with(|name| std::env::var(name).ok())
    }

    /// Resolve with an explicit environment lookup
    pub fn build_with(self, lookup: impl Fn(&str) -> Option<String>) -> Result<ManagerConfig> {
        let mut config = match &self.file {
            Some(path) => read_config_file(path)?,
            None => ManagerConfig::default(),
        };
        if !self.skip_environment {
            config.apply_environment(lookup)?;
        }
        self.apply_overrides(&mut config);
        Ok(config)
    }

    fn apply_overrides(self, config: &mut ManagerConfig) {
        fn set<T>(
            sources: &mut BTreeMap<&'static str, ConfigSource>,
            field: &'static str,
            target: &mut T,
            value: Option<T>,
        ) {
            if let Some(value) = value {
                *target = value;
                sources.insert(field, ConfigSource::Builder);
            }
        }

        let sources = &mut config.sources;
        set(sources, "baseDir", &mut config.base_dir, self.base_dir);
        set(
            sources,
            "directorySuffix",
            &mut config.directory_suffix,
            self.directory_suffix,
        );
        set(
            sources,
            "fileExtension",
            &mut config.file_extension,
            self.file_extension,
        );
        set(
            sources,
            "containerField",
            &mut config.container_field,
            self.container_field,
        );
        set(
            sources,
            "lastModifiedField",
            &mut config.last_modified_field,
            self.last_modified_field,
        );
        set(
            sources,
            "defaultBatchMode",
            &mut config.default_batch_mode,
            self.default_batch_mode,
        );
        set(
            sources,
            "scanAllFiles",
            &mut config.scan_all_files,
            self.scan_all_files,
        );
        set(
            sources,
            "newRecordFormat",
            &mut config.new_record_format,
            self.new_record_format,
        );
    }
}
