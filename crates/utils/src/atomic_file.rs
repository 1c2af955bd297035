//! Atomic file operations to prevent half-written config files

use cfgstore_core::{Error, Result};
use std::path::Path;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Write data to a file atomically by writing to a temporary file and renaming
pub async fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::DirectoryMissing {
            path: path.to_path_buf(),
        })?;

    // Ensure parent directory exists
    fs::create_dir_all(parent)
        .await
        .map_err(|e| Error::write(parent, "create parent directory", e))?;

    // Temporary file lives next to the target so the rename stays on one filesystem
    let temp_path = parent.join(format!(".{}.tmp", Uuid::new_v4()));

    let result = async {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&temp_path)
            .await
            .map_err(|e| Error::write(&temp_path, "create temporary file", e))?;

        file.write_all(content)
            .await
            .map_err(|e| Error::write(&temp_path, "write to temporary file", e))?;

        file.sync_all()
            .await
            .map_err(|e| Error::write(&temp_path, "sync temporary file", e))?;

        Ok::<(), Error>(())
    }
    .await;

    // If writing failed, clean up temp file
    if result.is_err() {
        let _ = fs::remove_file(&temp_path).await;
        return result;
    }

    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(Error::write(path, "atomic rename", e));
    }

    Ok(())
}

/// Write string content to a file atomically
pub async fn write_atomic_string(path: &Path, content: &str) -> Result<()> {
    write_atomic(path, content.as_bytes()).await
}

/// Read a UTF-8 file, returning `None` when it does not exist
pub async fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::read(path, e)),
    }
}

/// Remove a file, treating an already missing file as success
pub async fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::write(path, "remove file", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_atomic_write() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test.json");

        write_atomic_string(&file_path, "Hello, World!").await.unwrap();

        let content = std::fs::read_to_string(&file_path).unwrap();
        assert_eq!(content, "Hello, World!");
    }

    #[tokio::test]
    async fn test_atomic_write_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("subdir").join("test.json");

        write_atomic_string(&file_path, "Test").await.unwrap();

        let content = std::fs::read_to_string(&file_path).unwrap();
        assert_eq!(content, "Test");
    }

    #[tokio::test]
    async fn test_atomic_write_overwrites_existing_and_leaves_no_temp() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("test.json");
        std::fs::write(&file_path, "Old content").unwrap();

        write_atomic_string(&file_path, "New content").await.unwrap();

        assert_eq!(std::fs::read_to_string(&file_path).unwrap(), "New content");
        let leftovers = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(".tmp")
            })
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_read_optional_and_remove() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("absent.json");

        assert_eq!(read_optional(&file_path).await.unwrap(), None);
        remove_if_exists(&file_path).await.unwrap();

        std::fs::write(&file_path, "x").unwrap();
        assert_eq!(read_optional(&file_path).await.unwrap().as_deref(), Some("x"));
        remove_if_exists(&file_path).await.unwrap();
        assert!(!file_path.exists());
    }
}
