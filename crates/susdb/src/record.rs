//! Identity records: ids, field names, and the typed four-field record.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// Physical name prefix for a stored record: `user_db_{id}`.
pub const RECORD_PREFIX: &str = "user_db_";

/// Raw record contents: field name → value bytes.
pub type RecordFields = BTreeMap<String, Vec<u8>>;

/// Unique identifier for an identity record.
///
/// Always a lowercase hyphenated UUID. Parsing rejects anything else, so an
/// id can be embedded in a file name or object key without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdentityId(String);

impl IdentityId {
    /// Generate a fresh random (v4) id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }

    /// Parse a caller-supplied id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::MalformedRequest` if `raw` is empty or not a UUID.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(StoreError::MalformedRequest("uid not provided".into()));
        }
        let uuid = Uuid::parse_str(raw)
            .map_err(|_| StoreError::MalformedRequest(format!("uid is not a UUID: {raw}")))?;
        Ok(Self(uuid.hyphenated().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The record name used by backends: `user_db_{id}`.
    pub fn record_name(&self) -> String {
        format!("{RECORD_PREFIX}{}", self.0)
    }
}

impl std::fmt::Display for IdentityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for IdentityId {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<IdentityId> for String {
    fn from(id: IdentityId) -> Self {
        id.0
    }
}

/// The four fields every record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordField {
    Id,
    HashString,
    SecuredToken,
    CreatedOn,
}

impl RecordField {
    pub const ALL: [RecordField; 4] = [
        RecordField::Id,
        RecordField::HashString,
        RecordField::SecuredToken,
        RecordField::CreatedOn,
    ];

    /// Stored field name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordField::Id => "id",
            RecordField::HashString => "hash_string",
            RecordField::SecuredToken => "secured_token",
            RecordField::CreatedOn => "created_on",
        }
    }
}

impl std::fmt::Display for RecordField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordField {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        RecordField::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| StoreError::FieldNotFound(s.to_string()))
    }
}

/// Fields of a freshly created record: every key present, every value empty.
pub fn empty_fields() -> RecordFields {
    RecordField::ALL
        .iter()
        .map(|f| (f.as_str().to_string(), Vec::new()))
        .collect()
}

/// Render a stored value for display: UTF-8 text when valid, hex otherwise.
pub fn render_value(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => hex::encode(bytes),
    }
}

/// A complete identity record.
///
/// The manager writes all four fields together through
/// [`IdentityRecord::into_fields`] so a reader never sees a new hash paired
/// with a stale token or timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityRecord {
    pub id: IdentityId,
    pub hash_string: String,
    pub secured_token: String,
    pub created_on: String,
}

impl IdentityRecord {
    pub fn into_fields(self) -> RecordFields {
        let mut fields = RecordFields::new();
        fields.insert(RecordField::Id.as_str().into(), self.id.0.into_bytes());
        fields.insert(
            RecordField::HashString.as_str().into(),
            self.hash_string.into_bytes(),
        );
        fields.insert(
            RecordField::SecuredToken.as_str().into(),
            self.secured_token.into_bytes(),
        );
        fields.insert(
            RecordField::CreatedOn.as_str().into(),
            self.created_on.into_bytes(),
        );
        fields
    }
}

/// Read a field as UTF-8 text, treating a missing field as empty.
pub(crate) fn field_text(fields: &RecordFields, field: RecordField) -> Result<String> {
    match fields.get(field.as_str()) {
        None => Ok(String::new()),
        Some(bytes) => String::from_utf8(bytes.clone()).map_err(|_| {
            StoreError::InvalidFileFormat(format!("field {field} is not valid UTF-8"))
        }),
    }
}
