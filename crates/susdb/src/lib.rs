//! SusDB: identity record store.
//!
//! Stores one Argon2id-hashed secret per identity, hands the owner an
//! independent secured token, and supports verification, recovery, and
//! token-gated account closure over local-file or object-storage backends.
//!
//! ```no_run
//! use susdb::{IdentityStore, StoreConfig};
//!
//! # fn main() -> susdb::Result<()> {
//! let store = IdentityStore::open(&StoreConfig::new("/var/lib/susdb"))?;
//! let issued = store.initialize(None)?.store("correct horse battery staple")?;
//! store.verify(issued.id.as_str(), "correct horse battery staple")?;
//! store.close(issued.id.as_str(), &issued.secured_token)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod crypto;
pub mod error;
pub mod record;
pub mod storage;
pub mod store;
pub mod time;

// Re-export primary types
pub use config::{BackendKind, StoreConfig};
pub use crypto::{Hasher, HasherParams, TokenGenerator};
pub use error::{ErrorKind, Result, StoreError};
pub use record::{IdentityId, IdentityRecord, RecordField, RecordFields};
pub use storage::{
    DirectoryObjectClient, LocalBackend, MemoryObjectClient, ObjectBackend, ObjectClient,
    ObjectLocation, RecordBackend,
};
pub use store::{IdentityHandle, IdentityStore, IssuedCredential};
