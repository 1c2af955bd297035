//! Naming conventions for storage directories and record files

use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Directory name for a record type: the type name with `suffix` stripped.
///
/// `DeviceConfig` with suffix `Config` becomes `Device`. A name that is
/// only the suffix is kept as is.
pub fn directory_name_for_type(type_name: &str, suffix: &str) -> String {
    match type_name.strip_suffix(suffix) {
        Some(stem) if !stem.is_empty() && !suffix.is_empty() => stem.to_string(),
        _ => type_name.to_string(),
    }
}

/// Storage directory for a record type under `base_dir`
pub fn directory_for_type(base_dir: &Path, type_name: &str, suffix: &str) -> PathBuf {
    base_dir.join(directory_name_for_type(type_name, suffix))
}

/// File name used when a record is stored in its own file.
///
/// Ids that are safe file names map to themselves. Any other id is
/// sanitized and suffixed with a hash of the original id, so two distinct
/// ids never share a file.
pub fn file_name_for_id(id: &str, extension: &str) -> String {
    let sanitized: String = id
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = sanitized.trim_start_matches('.');
    if !stem.is_empty() && stem == id {
        return format!("{stem}.{extension}");
    }

    let stem = if stem.is_empty() { "record" } else { stem };
    format!("{stem}~{}.{extension}", id_digest(id))
}

/// Short stable digest of an id, identical across runs and platforms
fn id_digest(id: &str) -> String {
    let digest = Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_bytes()).simple().to_string();
    digest[..12].to_string()
}

/// Whether a directory entry is a data file the provider should read.
///
/// Hidden files (including in-flight atomic write temporaries) are skipped.
pub fn is_data_file(file_name: &str, extension: &str) -> bool {
    !file_name.starts_with('.')
        && Path::new(file_name)
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case(extension))
            .unwrap_or(false)
}
