//! Storage format detection and (de)serialization of config files.
//!
//! Detection looks at the first non-whitespace character: `[` is an array,
//! `{` is either a container (when the configured list field is present) or
//! a single object. Anything else is not a config file.

use cfgstore_core::{Error, Record, Result, StorageFormat};
use chrono::Utc;
use serde_json::{Map, Value};
use std::path::Path;

/// Parsed content of one config file
#[derive(Debug, Clone, PartialEq)]
pub struct Document<R> {
    pub format: StorageFormat,
    pub records: Vec<R>,
    /// Top-level container fields other than the record list
    pub extra: Map<String, Value>,
}

impl<R: Record> Document<R> {
    pub fn empty(format: StorageFormat) -> Self {
        Self {
            format,
            records: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|r| r.id() == id)
    }

    pub fn find(&self, id: &str) -> Option<&R> {
        self.records.iter().find(|r| r.id() == id)
    }

    /// Replace the record with the same id, or append it. Returns true on replace.
    pub fn upsert(&mut self, record: R) -> bool {
        match self.position(record.id()) {
            Some(i) => {
                self.records[i] = record;
                true
            }
            None => {
                self.records.push(record);
                false
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<R> {
        self.position(id).map(|i| self.records.remove(i))
    }
}

/// Reads and writes the three on-disk shapes
#[derive(Debug, Clone)]
pub struct FormatCodec {
    container_field: String,
    last_modified_field: String,
}

impl FormatCodec {
    pub fn new(container_field: impl Into<String>, last_modified_field: impl Into<String>) -> Self {
        Self {
            container_field: container_field.into(),
            last_modified_field: last_modified_field.into(),
        }
    }

    /// Classify file content. `None` means detection failed.
    pub fn detect(&self, content: &str) -> Option<StorageFormat> {
        match content.trim_start().chars().next()? {
            '[' => Some(StorageFormat::Array),
            '{' => {
                let value: Value = serde_json::from_str(content).ok()?;
                let is_container = value
                    .get(&self.container_field)
                    .map(Value::is_array)
                    .unwrap_or(false);
                Some(if is_container {
                    StorageFormat::Container
                } else {
                    StorageFormat::SingleObject
                })
            }
            _ => None,
        }
    }

    /// Decode `content` read from `path`.
    ///
    /// With `format == Auto` the format is detected first. Blank content is
    /// an empty document in `fallback` format.
    pub fn decode<R: Record>(
        &self,
        path: &Path,
        content: &str,
        format: StorageFormat,
        fallback: StorageFormat,
    ) -> Result<Document<R>> {
        if content.trim().is_empty() {
            let format = if format.is_resolved() { format } else { fallback };
            return Ok(Document::empty(format));
        }

        let format = if format.is_resolved() {
            format
        } else {
            self.detect(content).ok_or_else(|| {
                Error::format_invalid(path, "content is neither a JSON object nor a JSON array")
            })?
        };

        let value: Value =
            serde_json::from_str(content).map_err(|e| Error::parse(path, e.to_string()))?;

        match format {
            StorageFormat::SingleObject => {
                if !value.is_object() {
                    return Err(Error::format_invalid(path, "expected a single JSON object"));
                }
                let record = Self::record_from_value::<R>(path, value)?;
                Ok(Document {
                    format,
                    records: vec![record],
                    extra: Map::new(),
                })
            }
            StorageFormat::Array => match value {
                Value::Array(items) => Ok(Document {
                    format,
                    records: Self::records_from_values(path, items)?,
                    extra: Map::new(),
                }),
                _ => Err(Error::format_invalid(path, "expected a JSON array")),
            },
            StorageFormat::Container => {
                let Value::Object(mut object) = value else {
                    return Err(Error::format_invalid(path, "expected a container object"));
                };
                let items = match object.remove(&self.container_field) {
                    Some(Value::Array(items)) => items,
                    Some(_) => {
                        return Err(Error::format_invalid(
                            path,
                            format!("container field '{}' is not a list", self.container_field),
                        ))
                    }
                    None => Vec::new(),
                };
                Ok(Document {
                    format,
                    records: Self::records_from_values(path, items)?,
                    extra: object,
                })
            }
            StorageFormat::Auto => Err(Error::format_invalid(path, "format unresolved")),
        }
    }

    /// Encode a document as pretty-printed JSON
    pub fn encode<R: Record>(&self, path: &Path, document: &Document<R>) -> Result<String> {
        let serialize_err = |source| Error::Serialize {
            type_tag: R::TYPE_TAG.to_string(),
            source,
        };

        let value = match document.format {
            StorageFormat::SingleObject => match document.records.as_slice() {
                [record] => serde_json::to_value(record).map_err(serialize_err)?,
                records => {
                    return Err(Error::format_invalid(
                        path,
                        format!(
                            "a single-object file must hold exactly one record, got {}",
                            records.len()
                        ),
                    ))
                }
            },
            StorageFormat::Array => {
                serde_json::to_value(&document.records).map_err(serialize_err)?
            }
            StorageFormat::Container => {
                let mut object = document.extra.clone();
                object.insert(
                    self.container_field.clone(),
                    serde_json::to_value(&document.records).map_err(serialize_err)?,
                );
                object.insert(
                    self.last_modified_field.clone(),
                    Value::String(Utc::now().to_rfc3339()),
                );
                Value::Object(object)
            }
            StorageFormat::Auto => {
                return Err(Error::format_invalid(path, "cannot write an unresolved format"))
            }
        };

        let mut text = serde_json::to_string_pretty(&value).map_err(serialize_err)?;
        text.push('\n');
        Ok(text)
    }

    fn record_from_value<R: Record>(path: &Path, value: Value) -> Result<R> {
        serde_json::from_value(value).map_err(|source| Error::Deserialize {
            type_tag: R::TYPE_TAG.to_string(),
            path: path.to_path_buf(),
            source,
        })
    }

    fn records_from_values<R: Record>(path: &Path, items: Vec<Value>) -> Result<Vec<R>> {
        items
            .into_iter()
            .map(|item| Self::record_from_value(path, item))
            .collect()
    }
}

impl Default for FormatCodec {
    fn default() -> Self {
        Self::new(
            cfgstore_core::DEFAULT_CONTAINER_FIELD,
            cfgstore_core::DEFAULT_LAST_MODIFIED_FIELD,
        )
    }
}
