/// Constants used throughout the cfgstore codebase
// Storage layout
pub const DEFAULT_FILE_EXTENSION: &str = "json";
pub const DEFAULT_COLLECTION_FILE_STEM: &str = "configs";
pub const DEFAULT_DIRECTORY_SUFFIX: &str = "Config";

// Container format field names
pub const DEFAULT_CONTAINER_FIELD: &str = "Configs";
pub const DEFAULT_LAST_MODIFIED_FIELD: &str = "LastModified";

// Environment variable names
pub const CFGSTORE_BASE_DIR_VAR: &str = "CFGSTORE_BASE_DIR";
pub const CFGSTORE_BATCH_MODE_VAR: &str = "CFGSTORE_BATCH_MODE";
pub const CFGSTORE_LOG_VAR: &str = "CFGSTORE_LOG";
