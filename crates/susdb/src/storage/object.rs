//! Remote object-storage backend: one object per identity.
//!
//! The record document is stored as a single blob at
//! `{bucket}/{prefix}user_db_{id}`. Existence is a `head` call. The object
//! transport sits behind [`ObjectClient`] so the backend does not care which
//! service (or test double) holds the bytes.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::{Result, StoreError};
use crate::record::{IdentityId, RecordFields};
use crate::storage::{record_file, write_atomic, RecordBackend};

// ── ObjectClient ──────────────────────────────────────────────────────────────

/// Minimal object-store API: head / get / put / delete on `bucket` + `key`.
pub trait ObjectClient: Send + Sync {
    /// Whether an object exists.
    fn head(&self, bucket: &str, key: &str) -> Result<bool>;

    /// Fetch an object body, `None` if absent.
    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store an object body, replacing any previous body in one step.
    fn put(&self, bucket: &str, key: &str, body: &[u8]) -> Result<()>;

    /// Delete an object. Deleting a missing object is not an error.
    fn delete(&self, bucket: &str, key: &str) -> Result<()>;
}

// ── ObjectLocation ────────────────────────────────────────────────────────────

/// Bucket and key prefix under which records are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub prefix: String,
}

impl ObjectLocation {
    /// Parse `s3://bucket/prefix/` or `bucket/prefix/`.
    ///
    /// A non-empty prefix always ends with `/`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` if the bucket is missing or the
    /// prefix contains `.` / `..` segments.
    pub fn parse(url: &str) -> Result<Self> {
        let rest = url
            .trim()
            .strip_prefix("s3://")
            .unwrap_or_else(|| url.trim());
        let (bucket, prefix) = match rest.split_once('/') {
            Some((bucket, prefix)) => (bucket, prefix.trim_matches('/')),
            None => (rest, ""),
        };

        if bucket.is_empty() {
            return Err(StoreError::Validation(format!(
                "object location has no bucket: {url}"
            )));
        }
        if prefix.split('/').any(|seg| seg == "." || seg == "..") {
            return Err(StoreError::Validation(format!(
                "object prefix may not contain relative segments: {url}"
            )));
        }

        let prefix = if prefix.is_empty() {
            String::new()
        } else {
            format!("{prefix}/")
        };
        Ok(Self {
            bucket: bucket.to_string(),
            prefix,
        })
    }

    /// Object key for a record.
    pub fn key_for(&self, id: &IdentityId) -> String {
        format!("{}{}", self.prefix, id.record_name())
    }
}

impl std::fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.prefix)
    }
}

// ── ObjectBackend ─────────────────────────────────────────────────────────────

/// Record backend over an object store.
pub struct ObjectBackend<C> {
    client: C,
    location: ObjectLocation,
}

impl<C: ObjectClient> ObjectBackend<C> {
    pub fn new(client: C, location: ObjectLocation) -> Self {
        Self { client, location }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn object_location(&self) -> &ObjectLocation {
        &self.location
    }
}

impl<C: ObjectClient> RecordBackend for ObjectBackend<C> {
    fn exists(&self, id: &IdentityId) -> Result<bool> {
        self.client
            .head(&self.location.bucket, &self.location.key_for(id))
    }

    fn load(&self, id: &IdentityId) -> Result<Option<RecordFields>> {
        let key = self.location.key_for(id);
        match self.client.get(&self.location.bucket, &key)? {
            Some(body) => record_file::decode(&body, &key).map(Some),
            None => Ok(None),
        }
    }

    fn replace(&self, id: &IdentityId, fields: &RecordFields) -> Result<()> {
        let body = record_file::encode(fields)?;
        self.client
            .put(&self.location.bucket, &self.location.key_for(id), &body)
    }

    fn delete(&self, id: &IdentityId) -> Result<bool> {
        let key = self.location.key_for(id);
        self.client.delete(&self.location.bucket, &key)?;
        Ok(!self.client.head(&self.location.bucket, &key)?)
    }

    fn location(&self, id: &IdentityId) -> String {
        format!("s3://{}/{}", self.location.bucket, self.location.key_for(id))
    }
}

// ── MemoryObjectClient ────────────────────────────────────────────────────────

/// In-process object store. Useful for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryObjectClient {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryObjectClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects across all buckets.
    pub fn len(&self) -> usize {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectClient for MemoryObjectClient {
    fn head(&self, bucket: &str, key: &str) -> Result<bool> {
        let objects = self.objects.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(objects.contains_key(&(bucket.to_string(), key.to_string())))
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let objects = self.objects.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(objects.get(&(bucket.to_string(), key.to_string())).cloned())
    }

    fn put(&self, bucket: &str, key: &str, body: &[u8]) -> Result<()> {
        let mut objects = self.objects.lock().unwrap_or_else(PoisonError::into_inner);
        objects.insert((bucket.to_string(), key.to_string()), body.to_vec());
        Ok(())
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        let mut objects = self.objects.lock().unwrap_or_else(PoisonError::into_inner);
        objects.remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}

// ── DirectoryObjectClient ─────────────────────────────────────────────────────

/// Object store whose buckets are directories under a mount point
/// (`{root}/{bucket}/{key}`), e.g. a bucket mounted through a FUSE driver.
#[derive(Debug, Clone)]
pub struct DirectoryObjectClient {
    root: PathBuf,
}

impl DirectoryObjectClient {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let relative = Path::new(bucket).join(key);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(StoreError::Storage(format!(
                "object path escapes the mount point: {bucket}/{key}"
            )));
        }
        Ok(self.root.join(relative))
    }
}

impl ObjectClient for DirectoryObjectClient {
    fn head(&self, bucket: &str, key: &str) -> Result<bool> {
        Ok(self.object_path(bucket, key)?.is_file())
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        match std::fs::read(self.object_path(bucket, key)?) {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn put(&self, bucket: &str, key: &str, body: &[u8]) -> Result<()> {
        write_atomic(&self.object_path(bucket, key)?, body)
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<()> {
        match std::fs::remove_file(self.object_path(bucket, key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}
