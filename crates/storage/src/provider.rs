//! Storage provider trait and its file-backed implementation

use crate::format::{Document, FormatCodec};
use crate::index::{IndexBuild, RecordIndex};
use crate::options::ProviderOptions;
use async_trait::async_trait;
use cfgstore_core::{Error, IndexEntry, Record, Result, StorageFormat};
use cfgstore_utils::{
    file_name_for_id, is_data_file, read_optional, remove_if_exists, write_atomic_string,
    FileSnapshot,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Whether a save created a new index entry or rewrote an existing record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted,
    Replaced,
}

/// Durable CRUD for one record type
#[async_trait]
pub trait StorageProvider<R: Record>: Send + Sync {
    /// Load the record stored under `id`
    async fn load(&self, id: &str) -> Result<R>;

    /// Insert or replace `record`
    async fn save(&self, record: &R) -> Result<SaveOutcome>;

    /// Remove the record stored under `id`; unknown ids fail with `NotFound`
    async fn delete(&self, id: &str) -> Result<()>;

    async fn exists(&self, id: &str) -> Result<bool>;

    /// Every readable record
    async fn get_all(&self) -> Result<Vec<R>>;

    /// Rescan storage and replace the index; returns the number of indexed records
    async fn rebuild_index(&self) -> Result<usize>;

    /// Copy of the current index
    async fn index_entries(&self) -> Result<HashMap<String, IndexEntry>>;

    /// Capture the file a write of `id` would touch
    async fn snapshot_for(&self, id: &str) -> Result<FileSnapshot>;

    /// Put a captured file back and rebuild the index from disk
    async fn restore(&self, snapshot: &FileSnapshot) -> Result<()>;

    fn directory(&self) -> &Path;
}

/// Provider storing records as JSON files in one directory
pub struct FileStorageProvider<R> {
    options: ProviderOptions,
    codec: FormatCodec,
    index: RecordIndex,
    /// Serializes file rewrites within this provider
    write_lock: Mutex<()>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> FileStorageProvider<R> {
    pub fn new(options: ProviderOptions) -> Result<Self> {
        options.validate(R::TYPE_TAG)?;
        let codec = FormatCodec::new(&options.container_field, &options.last_modified_field);
        debug!(
            type_tag = R::TYPE_TAG,
            directory = %options.directory.display(),
            scan_all = options.scan_all_files,
            "Storage provider created"
        );
        Ok(Self {
            options,
            codec,
            index: RecordIndex::new(),
            write_lock: Mutex::new(()),
            _record: PhantomData,
        })
    }

    pub fn options(&self) -> &ProviderOptions {
        &self.options
    }

    fn path_of(&self, file_name: &str) -> PathBuf {
        self.options.directory.join(file_name)
    }

    async fn ensure_index(&self) -> Result<()> {
        self.index.ensure_built(|| self.scan()).await
    }

    async fn scan(&self) -> Result<IndexBuild> {
        let build = if self.options.scan_all_files {
            self.scan_directory().await?
        } else {
            self.scan_default_file().await
        };
        info!(
            type_tag = R::TYPE_TAG,
            records = build.entries.len(),
            files = build.formats.len(),
            default_format = %build.default_format,
            "Index built"
        );
        Ok(build)
    }

    async fn scan_directory(&self) -> Result<IndexBuild> {
        let mut build = IndexBuild {
            default_format: self.options.effective_new_format(),
            ..Default::default()
        };

        let mut dir = match tokio::fs::read_dir(&self.options.directory).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(build),
            Err(e) => return Err(Error::read(&self.options.directory, e)),
        };

        let mut file_names = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| Error::read(&self.options.directory, e))?
        {
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_file && is_data_file(&name, &self.options.file_extension) {
                file_names.push(name);
            }
        }
        file_names.sort();

        for file_name in file_names {
            let path = self.path_of(&file_name);
            let content = match tokio::fs::read_to_string(&path).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(type_tag = R::TYPE_TAG, file = %path.display(), error = %e, "Skipping unreadable file");
                    continue;
                }
            };
            match self.decode(&path, &content, self.options.fixed_format) {
                Ok(document) => {
                    if file_name == self.options.default_file_name
                        && !self.options.fixed_format.is_resolved()
                    {
                        build.default_format = document.format;
                    }
                    Self::register(&mut build, &file_name, &document);
                }
                Err(e) => {
                    warn!(type_tag = R::TYPE_TAG, file = %path.display(), error = %e, "Skipping file with unrecognised content");
                }
            }
        }

        Ok(build)
    }

    async fn scan_default_file(&self) -> IndexBuild {
        let mut build = IndexBuild {
            default_format: self.options.effective_new_format(),
            ..Default::default()
        };
        let file_name = &self.options.default_file_name;
        let path = self.path_of(file_name);

        let content = match read_optional(&path).await {
            Ok(Some(content)) => content,
            Ok(None) => {
                debug!(type_tag = R::TYPE_TAG, file = %path.display(), "Default file absent, index empty");
                return build;
            }
            Err(e) => {
                warn!(type_tag = R::TYPE_TAG, file = %path.display(), error = %e, "Default file unreadable, index empty");
                return build;
            }
        };

        match self.decode(&path, &content, self.options.fixed_format) {
            Ok(document) => {
                build.default_format = document.format;
                Self::register(&mut build, file_name, &document);
            }
            Err(e) => {
                warn!(type_tag = R::TYPE_TAG, file = %path.display(), error = %e, "Default file not indexed");
            }
        }
        build
    }

    fn register(build: &mut IndexBuild, file_name: &str, document: &Document<R>) {
        build
            .formats
            .insert(file_name.to_string(), document.format);
        for record in &document.records {
            if record.id().is_empty() {
                warn!(type_tag = R::TYPE_TAG, file = %file_name, "Ignoring record without id");
                continue;
            }
            if let Some(existing) = build.entries.get(record.id()) {
                warn!(
                    type_tag = R::TYPE_TAG,
                    id = record.id(),
                    file = %file_name,
                    first = %existing.file_name,
                    "Duplicate id, keeping first occurrence"
                );
                continue;
            }
            build.entries.insert(
                record.id().to_string(),
                IndexEntry {
                    file_name: file_name.to_string(),
                    storage_mode: document.format.storage_mode(),
                },
            );
        }
    }

    fn decode(&self, path: &Path, content: &str, format: StorageFormat) -> Result<Document<R>> {
        self.codec
            .decode(path, content, format, self.options.effective_new_format())
    }

    /// Known format of `file_name`: fixed, previously detected, or `Auto`
    fn known_format(&self, file_name: &str) -> StorageFormat {
        if self.options.fixed_format.is_resolved() {
            return self.options.fixed_format;
        }
        self.index
            .file_format(file_name)
            .unwrap_or(StorageFormat::Auto)
    }

    async fn read_document(&self, file_name: &str) -> Result<Document<R>> {
        let path = self.path_of(file_name);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| Error::read(&path, e))?;
        let document = self.decode(&path, &content, self.known_format(file_name))?;
        self.index.set_file_format(file_name, document.format);
        Ok(document)
    }

    async fn read_document_optional(&self, file_name: &str) -> Result<Option<Document<R>>> {
        let path = self.path_of(file_name);
        match read_optional(&path).await? {
            Some(content) => {
                let document = self.decode(&path, &content, self.known_format(file_name))?;
                self.index.set_file_format(file_name, document.format);
                Ok(Some(document))
            }
            None => Ok(None),
        }
    }

    async fn write_document(&self, file_name: &str, document: &Document<R>) -> Result<()> {
        let path = self.path_of(file_name);
        let text = self.codec.encode(&path, document)?;
        write_atomic_string(&path, &text).await?;
        self.index.set_file_format(file_name, document.format);
        Ok(())
    }

    /// File and current content a new record with `id` goes to.
    ///
    /// An existing default file's detected format beats the remembered
    /// default. In scan-all mode single-object records get a file of their own.
    async fn new_record_target(&self, id: &str) -> Result<(String, Document<R>)> {
        let default_name = self.options.default_file_name.clone();
        let existing = self.read_document_optional(&default_name).await?;

        let format = match &existing {
            Some(document) => document.format,
            None if self.options.fixed_format.is_resolved() => self.options.fixed_format,
            None => match self.index.default_format() {
                StorageFormat::Auto => self.options.effective_new_format(),
                remembered => remembered,
            },
        };

        if format == StorageFormat::SingleObject && self.options.scan_all_files {
            let file_name = file_name_for_id(id, &self.options.file_extension);
            let document = self
                .read_document_optional(&file_name)
                .await?
                .unwrap_or_else(|| Document::empty(StorageFormat::SingleObject));
            return Ok((file_name, document));
        }

        Ok((
            default_name,
            existing.unwrap_or_else(|| Document::empty(format)),
        ))
    }
}

#[async_trait]
impl<R: Record> StorageProvider<R> for FileStorageProvider<R> {
    #[instrument(level = "debug", skip(self), fields(type_tag = R::TYPE_TAG))]
    async fn load(&self, id: &str) -> Result<R> {
        self.ensure_index().await?;
        let entry = self
            .index
            .get(id)
            .ok_or_else(|| Error::not_found(R::TYPE_TAG, id))?;
        let document = self.read_document(&entry.file_name).await?;
        document
            .records
            .into_iter()
            .find(|r| r.id() == id)
            .ok_or_else(|| Error::not_found(R::TYPE_TAG, id))
    }

    #[instrument(level = "debug", skip(self, record), fields(type_tag = R::TYPE_TAG, id = record.id()))]
    async fn save(&self, record: &R) -> Result<SaveOutcome> {
        let id = record.id();
        if id.is_empty() {
            return Err(Error::MissingId {
                type_tag: R::TYPE_TAG.to_string(),
            });
        }

        let _write = self.write_lock.lock().await;
        self.ensure_index().await?;

        if let Some(entry) = self.index.get(id) {
            let mut document = self.read_document(&entry.file_name).await?;
            document.upsert(record.clone());
            self.write_document(&entry.file_name, &document).await?;
            debug!(file = %entry.file_name, "Record rewritten");
            return Ok(SaveOutcome::Replaced);
        }

        let (file_name, mut document) = self.new_record_target(id).await?;
        document.upsert(record.clone());
        let storage_mode = document.format.storage_mode();
        self.write_document(&file_name, &document).await?;
        debug!(file = %file_name, format = %document.format, "Record appended");
        self.index.insert(
            id,
            IndexEntry {
                file_name,
                storage_mode,
            },
        );
        Ok(SaveOutcome::Inserted)
    }

    #[instrument(level = "debug", skip(self), fields(type_tag = R::TYPE_TAG))]
    async fn delete(&self, id: &str) -> Result<()> {
        let _write = self.write_lock.lock().await;
        self.ensure_index().await?;

        let entry = self
            .index
            .get(id)
            .ok_or_else(|| Error::not_found(R::TYPE_TAG, id))?;
        let mut document = self.read_document(&entry.file_name).await?;
        document.remove(id);

        if document.records.is_empty() && document.format == StorageFormat::SingleObject {
            remove_if_exists(&self.path_of(&entry.file_name)).await?;
            self.index.forget_file(&entry.file_name);
            debug!(file = %entry.file_name, "Single-object file removed");
        } else {
            self.write_document(&entry.file_name, &document).await?;
        }

        self.index.remove(id);
        Ok(())
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        self.ensure_index().await?;
        Ok(self.index.contains(id))
    }

    async fn get_all(&self) -> Result<Vec<R>> {
        self.ensure_index().await?;

        let mut by_file: BTreeMap<String, HashSet<String>> = BTreeMap::new();
        for (id, entry) in self.index.entries() {
            by_file.entry(entry.file_name).or_default().insert(id);
        }

        let mut records = Vec::new();
        for (file_name, ids) in by_file {
            match self.read_document(&file_name).await {
                Ok(document) => records.extend(
                    document
                        .records
                        .into_iter()
                        .filter(|r| ids.contains(r.id())),
                ),
                Err(e) => {
                    warn!(type_tag = R::TYPE_TAG, file = %file_name, error = %e, "Skipping unreadable file");
                }
            }
        }
        Ok(records)
    }

    async fn rebuild_index(&self) -> Result<usize> {
        let _write = self.write_lock.lock().await;
        self.index.rebuild(|| self.scan()).await
    }

    async fn index_entries(&self) -> Result<HashMap<String, IndexEntry>> {
        self.ensure_index().await?;
        Ok(self.index.entries())
    }

    async fn snapshot_for(&self, id: &str) -> Result<FileSnapshot> {
        self.ensure_index().await?;
        let file_name = match self.index.get(id) {
            Some(entry) => entry.file_name,
            None => self.new_record_target(id).await?.0,
        };
        FileSnapshot::capture(&self.path_of(&file_name)).await
    }

    async fn restore(&self, snapshot: &FileSnapshot) -> Result<()> {
        let _write = self.write_lock.lock().await;
        snapshot.restore().await?;
        let count = self.index.rebuild(|| self.scan()).await?;
        debug!(type_tag = R::TYPE_TAG, file = %snapshot.path.display(), records = count, "File restored, index rebuilt");
        Ok(())
    }

    fn directory(&self) -> &Path {
        &self.options.directory
    }
}
