//! Error types for SusDB.
//!
//! Every store operation returns a typed [`StoreError`]; nothing is
//! reported through sentinel strings or `None`. Secrets and hash strings
//! are never included in error messages.

/// The caller-facing error taxonomy.
///
/// Several [`StoreError`] variants collapse onto one kind (for example every
/// I/O failure is a [`ErrorKind::StorageError`]). Wrappers map kinds to exit
/// codes or HTTP statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ValidationError,
    NotFound,
    MismatchError,
    MalformedRequest,
    StorageError,
    FieldNotFound,
}

impl ErrorKind {
    /// Stable snake_case name, suitable for JSON bodies and log lines.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::MismatchError => "mismatch_error",
            ErrorKind::MalformedRequest => "malformed_request",
            ErrorKind::StorageError => "storage_error",
            ErrorKind::FieldNotFound => "field_not_found",
        }
    }

    /// HTTP status an HTTP wrapper should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::ValidationError => 422,
            ErrorKind::NotFound => 404,
            ErrorKind::MismatchError => 401,
            ErrorKind::MalformedRequest => 400,
            ErrorKind::StorageError => 500,
            ErrorKind::FieldNotFound => 404,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store error types covering all operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Secret does not match the stored hash")]
    HashMismatch,

    #[error("Secured token does not match")]
    TokenMismatch,

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Unknown field: {0}")]
    FieldNotFound(String),

    #[error("Record still present after delete: {0}")]
    DeleteFailed(String),

    #[error("Hashing failed: {0}")]
    HashingFailed(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Map this error onto the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Validation(_) => ErrorKind::ValidationError,
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::HashMismatch | StoreError::TokenMismatch => ErrorKind::MismatchError,
            StoreError::MalformedRequest(_) => ErrorKind::MalformedRequest,
            StoreError::FieldNotFound(_) => ErrorKind::FieldNotFound,
            StoreError::DeleteFailed(_)
            | StoreError::HashingFailed(_)
            | StoreError::Storage(_)
            | StoreError::SerializationError(_)
            | StoreError::InvalidFileFormat(_)
            | StoreError::Io(_) => ErrorKind::StorageError,
        }
    }
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, StoreError>;
