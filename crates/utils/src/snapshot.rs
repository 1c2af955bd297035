//! Point-in-time copies of a file's bytes, used to undo writes

use crate::atomic_file::{read_optional, remove_if_exists, write_atomic_string};
use cfgstore_core::Result;
use std::path::{Path, PathBuf};

/// Contents of a file captured before a mutation.
///
/// `contents == None` means the file did not exist; restoring removes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    pub path: PathBuf,
    pub contents: Option<String>,
}

impl FileSnapshot {
    pub async fn capture(path: &Path) -> Result<Self> {
        Ok(Self {
            path: path.to_path_buf(),
            contents: read_optional(path).await?,
        })
    }

    pub fn existed(&self) -> bool {
        self.contents.is_some()
    }

    /// Put the file back the way it was at capture time
    pub async fn restore(&self) -> Result<()> {
        match &self.contents {
            Some(contents) => write_atomic_string(&self.path, contents).await,
            None => remove_if_exists(&self.path).await,
        }
    }
}
