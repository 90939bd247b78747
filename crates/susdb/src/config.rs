//! Store configuration.
//!
//! Read from the environment:
//!
//! | variable | meaning | default |
//! |---|---|---|
//! | `SUSDB_ROOT` | storage root (record directory, or bucket mount point) | `~/.susdb/store` |
//! | `SUSDB_LOG_PATH` | log file; unset logs to stderr | unset |
//! | `SUSDB_EXTERNAL_SUPPORT` | `true` selects the object backend | `false` |
//! | `SUSDB_BUCKET` | object location, `s3://bucket/prefix` | unset |
//!
//! The CLI applies its flags on top of [`StoreConfig::from_env`].

use std::path::PathBuf;

use crate::crypto::HasherParams;
use crate::error::{Result, StoreError};
use crate::storage::ObjectLocation;

pub const ENV_ROOT: &str = "SUSDB_ROOT";
pub const ENV_LOG_PATH: &str = "SUSDB_LOG_PATH";
pub const ENV_EXTERNAL_SUPPORT: &str = "SUSDB_EXTERNAL_SUPPORT";
pub const ENV_BUCKET: &str = "SUSDB_BUCKET";

/// Which record backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// One file per identity under the storage root.
    #[default]
    Local,
    /// One object per identity in a bucket mounted under the storage root.
    Object,
}

impl std::str::FromStr for BackendKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "local" | "file" => Ok(BackendKind::Local),
            "object" | "s3" | "remote" => Ok(BackendKind::Object),
            other => Err(StoreError::Validation(format!("unknown backend: {other}"))),
        }
    }
}

/// Everything needed to open an [`IdentityStore`](crate::IdentityStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub storage_root: PathBuf,
    pub log_path: Option<PathBuf>,
    pub backend: BackendKind,
    pub bucket: Option<String>,
    pub hasher: HasherParams,
}

impl StoreConfig {
    /// Local-backend configuration rooted at `storage_root`.
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
            log_path: None,
            backend: BackendKind::Local,
            bucket: None,
            hasher: HasherParams::default(),
        }
    }

    /// Build from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let storage_root = non_empty(ENV_ROOT)
            .map(|v| expand_home(&v, lookup("HOME")))
            .unwrap_or_else(|| default_root(lookup("HOME")));
        let log_path = non_empty(ENV_LOG_PATH).map(|v| expand_home(&v, lookup("HOME")));
        let backend = match non_empty(ENV_EXTERNAL_SUPPORT) {
            Some(v) if v.eq_ignore_ascii_case("true") => BackendKind::Object,
            _ => BackendKind::Local,
        };

        let config = Self {
            storage_root,
            log_path,
            backend,
            bucket: non_empty(ENV_BUCKET),
            hasher: HasherParams::default(),
        };
        Ok(config)
    }

    /// Resolve the object location, required when the object backend is selected.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Validation` if no bucket is configured or it does
    /// not parse.
    pub fn object_location(&self) -> Result<ObjectLocation> {
        let bucket = self.bucket.as_deref().ok_or_else(|| {
            StoreError::Validation(format!(
                "object backend selected but {ENV_BUCKET} is not set"
            ))
        })?;
        ObjectLocation::parse(bucket)
    }
}

fn default_root(home: Option<String>) -> PathBuf {
    let home = home.map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    home.join(".susdb").join("store")
}

fn expand_home(value: &str, home: Option<String>) -> PathBuf {
    match (value.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(value),
    }
}
