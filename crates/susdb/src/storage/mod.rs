//! Storage layer for identity records.
//!
//! One record per identity, addressed by [`IdentityId`]. A record is a small
//! map of named fields persisted as a single versioned JSON document, so a
//! whole-record write is one atomic replace.
//!
//! # Layouts
//!
//! ```text
//! local:   {root}/user_db_{id}
//! object:  {bucket}/{prefix}user_db_{id}
//! ```
//!
//! # Modules
//!
//! - [`record_file`]: on-disk document encode/decode.
//! - [`local`]: one file per identity under a root directory.
//! - [`object`]: one object per identity behind an [`ObjectClient`].

pub mod local;
pub mod object;
pub mod record_file;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::crypto::random::random_bytes;
use crate::error::{Result, StoreError};
use crate::record::{empty_fields, IdentityId, RecordFields};

pub use local::LocalBackend;
pub use object::{
    DirectoryObjectClient, MemoryObjectClient, ObjectBackend, ObjectClient, ObjectLocation,
};

/// Durable per-identity record storage.
///
/// Implementations only need the whole-record primitives (`exists`,
/// `load`, `replace`, `delete`); the field-level operations have default
/// implementations on top of them. Callers that need ordering across
/// operations on one id must serialize access themselves (the identity
/// store does).
pub trait RecordBackend: Send + Sync {
    /// Whether a record exists for `id`.
    fn exists(&self, id: &IdentityId) -> Result<bool>;

    /// Read every field of the record, or `None` if it does not exist.
    fn load(&self, id: &IdentityId) -> Result<Option<RecordFields>>;

    /// Atomically replace the whole record, creating it if needed.
    fn replace(&self, id: &IdentityId, fields: &RecordFields) -> Result<()>;

    /// Remove the record. Returns `true` iff it no longer exists afterward.
    fn delete(&self, id: &IdentityId) -> Result<bool>;

    /// Human-readable location of the record (path or object key).
    fn location(&self, id: &IdentityId) -> String;

    /// Create the record with all four fields pre-seeded empty.
    ///
    /// No-op if the record already exists.
    fn create(&self, id: &IdentityId) -> Result<()> {
        if self.exists(id)? {
            return Ok(());
        }
        self.replace(id, &empty_fields())
    }

    /// Read one field. `Ok(None)` if the record has no such field.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the record does not exist.
    fn get(&self, id: &IdentityId, field: &str) -> Result<Option<Vec<u8>>> {
        let fields = self
            .load(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(fields.get(field).cloned())
    }

    /// Write one field of an existing record.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the record does not exist.
    fn set(&self, id: &IdentityId, field: &str, value: &[u8]) -> Result<()> {
        let mut fields = self
            .load(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        fields.insert(field.to_string(), value.to_vec());
        self.replace(id, &fields)
    }
}

/// Write `data` to `path` atomically using a sibling temporary file.
///
/// Creates the parent directory if it does not exist. A crash during the
/// write cannot leave a partially-written record visible to readers. Each
/// write gets its own temp name, so concurrent writers in different
/// processes never share one.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = temp_path_for(path);
    if let Err(e) = std::fs::write(&tmp_path, data) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(StoreError::Io(e));
    }

    if let Err(e) = std::fs::rename(&tmp_path, path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(StoreError::Io(e));
    }

    Ok(())
}

/// `{path}.{random hex}.tmp`, next to the final file.
fn temp_path_for(path: &Path) -> PathBuf {
    let suffix = hex::encode(random_bytes::<8>());
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(format!(".{suffix}.tmp"));
    path.with_file_name(name)
}
