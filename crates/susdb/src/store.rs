//! Identity store: the four lifecycle operations over a record backend.
//!
//! ```text
//! initialize ──► store ──► verify / fetch / display
//!                  │
//!                  └─► recover (new secret, new token) ──► close (token-gated delete)
//! ```
//!
//! Operations on the same identity id are serialized through a per-id lock;
//! operations on different ids never wait on each other. Argon2 hashing runs
//! outside the lock, and every credential write replaces the whole record in
//! one step.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::Serialize;

use crate::config::{BackendKind, StoreConfig};
use crate::crypto::{canonical_envelope, tokens_match, Hasher, TokenGenerator};
use crate::error::{Result, StoreError};
use crate::record::{field_text, render_value, IdentityId, IdentityRecord, RecordField};
use crate::storage::{DirectoryObjectClient, LocalBackend, ObjectBackend, RecordBackend};

/// Credentials handed back after `store` and `recover`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedCredential {
    pub id: IdentityId,
    pub secured_token: String,
}

// ── Per-id locks ──────────────────────────────────────────────────────────────

/// Lock table keyed by identity id.
///
/// Entries hold weak references, so a lock lives only while some operation
/// holds it. Dead entries are swept whenever a new lock is inserted.
#[derive(Default)]
struct IdLocks {
    table: Mutex<HashMap<IdentityId, Weak<Mutex<()>>>>,
}

impl IdLocks {
    fn lock_for(&self, id: &IdentityId) -> Arc<Mutex<()>> {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(lock) = table.get(id).and_then(Weak::upgrade) {
            return lock;
        }
        table.retain(|_, weak| weak.strong_count() > 0);
        let lock = Arc::new(Mutex::new(()));
        table.insert(id.clone(), Arc::downgrade(&lock));
        lock
    }

    #[cfg(test)]
    fn live_entries(&self) -> usize {
        let table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        table.values().filter(|w| w.strong_count() > 0).count()
    }
}

fn acquire(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── IdentityStore ─────────────────────────────────────────────────────────────

/// Credential manager over one record backend.
///
/// `IdentityStore` is `Send + Sync`; share it behind an `Arc` to serve
/// concurrent callers.
pub struct IdentityStore {
    backend: Box<dyn RecordBackend>,
    hasher: Hasher,
    tokens: TokenGenerator,
    locks: IdLocks,
}

impl IdentityStore {
    pub fn new(backend: impl RecordBackend + 'static, hasher: Hasher) -> Self {
        Self {
            backend: Box::new(backend),
            hasher,
            tokens: TokenGenerator::new(),
            locks: IdLocks::default(),
        }
    }

    /// Open the backend described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Storage` if the storage root cannot be created,
    /// or `StoreError::Validation` for bad hasher params or a missing bucket.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        let hasher = Hasher::new(config.hasher)?;
        let store = match config.backend {
            BackendKind::Local => Self::new(LocalBackend::new(&config.storage_root)?, hasher),
            BackendKind::Object => {
                let location = config.object_location()?;
                std::fs::create_dir_all(&config.storage_root).map_err(|e| {
                    StoreError::Storage(format!(
                        "cannot create bucket mount {}: {e}",
                        config.storage_root.display()
                    ))
                })?;
                let client = DirectoryObjectClient::new(&config.storage_root);
                Self::new(ObjectBackend::new(client, location), hasher)
            }
        };
        log::debug!(
            "[INIT] opened {:?} store at {}",
            config.backend,
            config.storage_root.display()
        );
        Ok(store)
    }

    pub fn backend(&self) -> &dyn RecordBackend {
        self.backend.as_ref()
    }

    pub fn hasher(&self) -> &Hasher {
        &self.hasher
    }

    /// Bind to an identity.
    ///
    /// With `Some(id)` naming an existing record, binds to it. Otherwise a
    /// fresh id is generated and an empty record (all four fields present,
    /// all empty) is created for it.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::MalformedRequest` if `id` is not a UUID, or a
    /// storage error if the record cannot be created.
    pub fn initialize(&self, id: Option<&str>) -> Result<IdentityHandle<'_>> {
        if let Some(raw) = id.filter(|raw| !raw.trim().is_empty()) {
            let id = IdentityId::parse(raw)?;
            let lock = self.locks.lock_for(&id);
            let _guard = acquire(&lock);
            if self.backend.exists(&id)? {
                log::info!("[INIT] record already exists for {id}, skipping initialisation");
                return Ok(IdentityHandle { store: self, id });
            }
            log::info!("[INIT] no record for {id}, issuing a fresh identity");
        }

        let id = IdentityId::generate();
        let lock = self.locks.lock_for(&id);
        let _guard = acquire(&lock);
        self.backend
            .create(&id)
            .map_err(|e| self.storage_failure("INIT", &id, e))?;
        log::info!("[INIT] record initialised for {id}");
        Ok(IdentityHandle { store: self, id })
    }

    /// Whether a record exists for `id`.
    pub fn exists(&self, id: &str) -> Result<bool> {
        let id = IdentityId::parse(id)?;
        let lock = self.locks.lock_for(&id);
        let _guard = acquire(&lock);
        self.backend.exists(&id)
    }

    /// Create a fresh identity and store `secret` under it.
    ///
    /// The secret is validated before anything is written, and a record
    /// whose credential write fails is removed again, so a failed call
    /// leaves no record behind.
    ///
    /// # Errors
    ///
    /// `Validation` if `secret` is empty, or a storage error.
    pub fn store_new(&self, secret: &str) -> Result<IssuedCredential> {
        require_non_empty(secret, "secret")?;
        let handle = self.initialize(None)?;
        match handle.store(secret) {
            Ok(issued) => Ok(issued),
            Err(e) => {
                let lock = self.locks.lock_for(handle.id());
                let _guard = acquire(&lock);
                if let Err(cleanup) = self.backend.delete(handle.id()) {
                    log::error!(
                        "[STORAGE] could not remove unfinished record {}: {cleanup}",
                        handle.id()
                    );
                }
                Err(e)
            }
        }
    }

    /// Check `secret` against the stored hash for `id`.
    ///
    /// # Errors
    ///
    /// - `MalformedRequest` if `id` is empty or not a UUID
    /// - `Validation` if `secret` is empty
    /// - `NotFound` if there is no record, or no credential stored in it yet
    /// - `HashMismatch` if the secret does not match
    pub fn verify(&self, id: &str, secret: &str) -> Result<()> {
        let id = IdentityId::parse(id)?;
        require_non_empty(secret, "secret")?;

        let stored_hash = {
            let lock = self.locks.lock_for(&id);
            let _guard = acquire(&lock);
            let fields = self.load_existing("VERIFY", &id)?;
            field_text(&fields, RecordField::HashString)
                .map_err(|e| self.storage_failure("VERIFY", &id, e))?
        };
        if stored_hash.is_empty() {
            log::warn!("[VERIFY] no credential stored for {id}");
            return Err(StoreError::NotFound(format!("no credential stored for {id}")));
        }

        let envelope = canonical_envelope(secret)?;
        match self.hasher.verify(&stored_hash, envelope.as_bytes()) {
            Ok(()) => {
                log::info!("[VERIFY] verification successful for {id}");
                Ok(())
            }
            Err(StoreError::HashMismatch) => {
                log::warn!("[VERIFY] secret does not match the stored hash for {id}");
                Err(StoreError::HashMismatch)
            }
            Err(e) => Err(self.storage_failure("VERIFY", &id, e)),
        }
    }

    /// Raw field lookup, rendered as text (or hex for non-UTF-8 bytes).
    ///
    /// # Errors
    ///
    /// `NotFound` for a missing record, `FieldNotFound` for a field the
    /// record does not carry.
    pub fn fetch(&self, id: &str, field: &str) -> Result<String> {
        let id = IdentityId::parse(id)?;
        let lock = self.locks.lock_for(&id);
        let _guard = acquire(&lock);
        let fields = self.load_existing("FETCH", &id)?;
        match fields.get(field) {
            Some(value) => {
                log::info!("[FETCH] field {field} fetched for {id}");
                Ok(render_value(value))
            }
            None => {
                log::warn!("[FETCH] unknown field {field} requested for {id}");
                Err(StoreError::FieldNotFound(field.to_string()))
            }
        }
    }

    /// Every stored field of the record, rendered as text or hex.
    pub fn display(&self, id: &str) -> Result<BTreeMap<String, String>> {
        let id = IdentityId::parse(id)?;
        let lock = self.locks.lock_for(&id);
        let _guard = acquire(&lock);
        let fields = self.load_existing("DISPLAY", &id)?;
        Ok(fields
            .iter()
            .map(|(k, v)| (k.clone(), render_value(v)))
            .collect())
    }

    /// Replace the secret of an existing record and rotate its token.
    ///
    /// # Errors
    ///
    /// `NotFound` if no record exists, `Validation` if `new_secret` is empty.
    pub fn recover(&self, id: &str, new_secret: &str) -> Result<IssuedCredential> {
        let id = IdentityId::parse(id)?;
        let issued = self.write_credential("RECOVER", &id, new_secret)?;
        log::info!("[RECOVER] recovery completed, new token assigned for {id}");
        Ok(issued)
    }

    /// Check a presented secured token against the stored one without
    /// touching the record. Gate for restore flows.
    ///
    /// # Errors
    ///
    /// - `Validation` if `secured_token` is empty
    /// - `NotFound` if no record exists
    /// - `TokenMismatch` if the token is not the current one
    pub fn check_token(&self, id: &str, secured_token: &str) -> Result<()> {
        let id = IdentityId::parse(id)?;
        require_non_empty(secured_token, "secured token")?;

        let lock = self.locks.lock_for(&id);
        let _guard = acquire(&lock);
        self.authorize("RESTORE", &id, secured_token)?;
        log::info!("[RESTORE] integrity check passed for {id}");
        Ok(())
    }

    /// Permanently delete a record, authorized by its current secured token.
    ///
    /// # Errors
    ///
    /// - `Validation` if `secured_token` is empty
    /// - `NotFound` if no record exists
    /// - `TokenMismatch` if the token is not the current one
    /// - `DeleteFailed` if the record is still present after removal
    pub fn close(&self, id: &str, secured_token: &str) -> Result<()> {
        let id = IdentityId::parse(id)?;
        require_non_empty(secured_token, "secured token")?;

        let lock = self.locks.lock_for(&id);
        let _guard = acquire(&lock);
        self.authorize("CLOSE", &id, secured_token)?;

        let gone = self
            .backend
            .delete(&id)
            .map_err(|e| self.storage_failure("CLOSE", &id, e))?;
        if !gone || self.backend.exists(&id)? {
            log::error!("[CLOSE] record still present after delete for {id}");
            return Err(StoreError::DeleteFailed(id.to_string()));
        }
        log::info!("[CLOSE] record deleted for {id}");
        Ok(())
    }

    // ── Internal helpers ──────────────────────────────────────────────────────

    /// Compare `secured_token` with the stored token. Caller holds the id lock.
    /// An empty stored token never matches.
    fn authorize(&self, op: &str, id: &IdentityId, secured_token: &str) -> Result<()> {
        let fields = self.load_existing(op, id)?;
        let stored = field_text(&fields, RecordField::SecuredToken)
            .map_err(|e| self.storage_failure(op, id, e))?;
        if stored.is_empty() || !tokens_match(secured_token, &stored) {
            log::warn!("[{op}] secured token does not match for {id}");
            return Err(StoreError::TokenMismatch);
        }
        Ok(())
    }

    /// Hash `secret`, mint a token, and replace all four fields of an
    /// existing record in one write.
    fn write_credential(
        &self,
        op: &str,
        id: &IdentityId,
        secret: &str,
    ) -> Result<IssuedCredential> {
        require_non_empty(secret, "secret")?;

        let envelope = canonical_envelope(secret)?;
        let hash_string = self
            .hasher
            .hash(envelope.as_bytes())
            .map_err(|e| self.storage_failure(op, id, e))?;
        drop(envelope);

        let record = IdentityRecord {
            id: id.clone(),
            hash_string,
            secured_token: self.tokens.generate(),
            created_on: crate::time::now_rfc3339(),
        };
        let issued = IssuedCredential {
            id: id.clone(),
            secured_token: record.secured_token.clone(),
        };

        let lock = self.locks.lock_for(id);
        let _guard = acquire(&lock);
        if !self.backend.exists(id)? {
            log::error!("[{op}] no record found for {id}");
            return Err(StoreError::NotFound(id.to_string()));
        }
        self.backend
            .replace(id, &record.into_fields())
            .map_err(|e| self.storage_failure(op, id, e))?;
        Ok(issued)
    }

    fn load_existing(&self, op: &str, id: &IdentityId) -> Result<crate::record::RecordFields> {
        match self.backend.load(id) {
            Ok(Some(fields)) => Ok(fields),
            Ok(None) => {
                log::error!("[{op}] no record found for {id}");
                Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => Err(self.storage_failure(op, id, e)),
        }
    }

    /// Log a storage-side failure with its context and pass it through.
    fn storage_failure(&self, op: &str, id: &IdentityId, err: StoreError) -> StoreError {
        log::error!(
            "[{op}] storage failure for {id} at {}: {err}",
            self.backend.location(id)
        );
        err
    }
}

fn require_non_empty(value: &str, what: &str) -> Result<()> {
    if value.is_empty() {
        return Err(StoreError::Validation(format!("{what} must not be empty")));
    }
    Ok(())
}

// ── IdentityHandle ────────────────────────────────────────────────────────────

/// A store bound to one identity id, returned by [`IdentityStore::initialize`].
pub struct IdentityHandle<'a> {
    store: &'a IdentityStore,
    id: IdentityId,
}

impl<'a> IdentityHandle<'a> {
    pub fn id(&self) -> &IdentityId {
        &self.id
    }

    /// Physical record name, `user_db_{id}`.
    pub fn file_name(&self) -> String {
        self.id.record_name()
    }

    /// Where the backend keeps this record.
    pub fn location(&self) -> String {
        self.store.backend.location(&self.id)
    }

    /// Hash and persist `secret` for this identity, issuing a new token.
    ///
    /// # Errors
    ///
    /// `Validation` if `secret` is empty, `NotFound` if the record was
    /// closed after this handle was created, or a storage error.
    pub fn store(&self, secret: &str) -> Result<IssuedCredential> {
        let issued = self.store.write_credential("STORAGE", &self.id, secret)?;
        log::info!("[STORAGE] identity {} successfully assigned", self.id);
        Ok(issued)
    }

    pub fn verify(&self, secret: &str) -> Result<()> {
        self.store.verify(self.id.as_str(), secret)
    }

    pub fn fetch(&self, field: &str) -> Result<String> {
        self.store.fetch(self.id.as_str(), field)
    }

    pub fn display(&self) -> Result<BTreeMap<String, String>> {
        self.store.display(self.id.as_str())
    }
}

impl std::fmt::Debug for IdentityHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityHandle").field("id", &self.id).finish()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
