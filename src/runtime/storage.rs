//! Flat-file response cache and atomic write helpers
//!
//! Entries live at `<root>/<namespace>/<blake3(key)>.json`. Keys are content
//! derived, so concurrent workers writing the same key produce equivalent
//! files; writes go through a uniquely named temp file and a rename so readers
//! never observe a partial entry.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::error::{StorageError, StorageResult};

/// Summary of one cache file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntryInfo {
    /// Namespace directory the entry lives in.
    pub namespace: String,
    /// Full path of the entry file.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time, when the filesystem reports one.
    pub modified: Option<SystemTime>,
}

/// Cache storage rooted at a directory
#[derive(Debug, Clone)]
pub struct CacheStorage {
    root: PathBuf,
}

impl CacheStorage {
    /// Create a cache rooted at `root`. Directories are created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding a namespace's entries
    pub fn namespace_dir(&self, namespace: &str) -> PathBuf {
        self.root.join(namespace)
    }

    /// Path of the entry for `key` in `namespace`
    pub fn entry_path(&self, namespace: &str, key: &str) -> PathBuf {
        self.namespace_dir(namespace)
            .join(format!("{}.json", cache_key_hash(key)))
    }

    /// Read and decode the entry for `key`, or `None` when absent.
    pub fn read_cache<T: DeserializeOwned>(
        &self,
        namespace: &str,
        key: &str,
    ) -> StorageResult<Option<T>> {
        let path = self.entry_path(namespace, key);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(serde_json::from_slice(&data)?))
    }

    /// Encode `value` and replace the entry for `key`.
    pub fn write_cache<T: Serialize + ?Sized>(
        &self,
        namespace: &str,
        key: &str,
        value: &T,
    ) -> StorageResult<()> {
        let path = self.entry_path(namespace, key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(value)?;
        self.write_atomic(&path, &json)
    }

    /// Write data atomically to a file
    ///
    /// Creates a uniquely named temporary file, writes the data, syncs, then
    /// renames over the destination.
    pub fn write_atomic(&self, path: &Path, data: &[u8]) -> StorageResult<()> {
        let temp_path = path.with_extension(format!("{}.tmp", uuid::Uuid::new_v4().simple()));

        let write = || -> std::io::Result<()> {
            let mut file = File::create(&temp_path)?;
            file.write_all(data)?;
            file.sync_all()?;
            drop(file);
            fs::rename(&temp_path, path)
        };

        write().map_err(|err| {
            let _ = fs::remove_file(&temp_path);
            StorageError::AtomicWriteFailed {
                path: path.to_path_buf(),
                detail: err.to_string(),
            }
        })
    }

    /// List entries, optionally restricted to one namespace.
    pub fn list_entries(&self, namespace: Option<&str>) -> StorageResult<Vec<CacheEntryInfo>> {
        let mut entries = Vec::new();
        for namespace in self.namespaces(namespace)? {
            let dir = self.namespace_dir(&namespace);
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                let path = entry.path();
                if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                    continue;
                }
                let metadata = entry.metadata()?;
                entries.push(CacheEntryInfo {
                    namespace: namespace.clone(),
                    path,
                    size: metadata.len(),
                    modified: metadata.modified().ok(),
                });
            }
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    /// Remove entries, optionally restricted to one namespace. Returns the
    /// number of files removed.
    pub fn clear(&self, namespace: Option<&str>) -> StorageResult<usize> {
        let entries = self.list_entries(namespace)?;
        for entry in &entries {
            fs::remove_file(&entry.path)?;
        }
        Ok(entries.len())
    }

    fn namespaces(&self, only: Option<&str>) -> StorageResult<Vec<String>> {
        if let Some(namespace) = only {
            return Ok(if self.namespace_dir(namespace).is_dir() {
                vec![namespace.to_string()]
            } else {
                Vec::new()
            });
        }
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Stable hex digest used as the on-disk name for a cache key.
pub fn cache_key_hash(key: &str) -> String {
    blake3::hash(key.as_bytes()).to_hex().to_string()
}
