//! Local flat-file backend: one file per identity.
//!
//! Each record is written to `{root}/user_db_{id}`. Writes go through a
//! sibling temp file and a rename, so a record is always either the old
//! document or the new one.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};
use crate::record::{IdentityId, RecordFields};
use crate::storage::{record_file, write_atomic, RecordBackend};

/// Filesystem-backed record store.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Create a backend rooted at `root`.
    ///
    /// The directory and any missing parents are created if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Storage` if the directory cannot be created.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            StoreError::Storage(format!(
                "cannot create storage root {}: {e}",
                root.display()
            ))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Build the filesystem path for a record.
    pub fn record_path(&self, id: &IdentityId) -> PathBuf {
        self.root.join(id.record_name())
    }
}

impl RecordBackend for LocalBackend {
    fn exists(&self, id: &IdentityId) -> Result<bool> {
        Ok(self.record_path(id).try_exists()?)
    }

    fn load(&self, id: &IdentityId) -> Result<Option<RecordFields>> {
        let path = self.record_path(id);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::Io(e)),
        };
        record_file::decode(&bytes, &path.display().to_string()).map(Some)
    }

    fn replace(&self, id: &IdentityId, fields: &RecordFields) -> Result<()> {
        let data = record_file::encode(fields)?;
        write_atomic(&self.record_path(id), &data)
    }

    fn delete(&self, id: &IdentityId) -> Result<bool> {
        let path = self.record_path(id);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::Io(e)),
        }
        Ok(!path.try_exists()?)
    }

    fn location(&self, id: &IdentityId) -> String {
        self.record_path(id).display().to_string()
    }
}
