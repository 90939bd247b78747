//! Record document format.
//!
//! Every backend persists a record as the same JSON document:
//! ```json
//! {
//!     "version": 1,
//!     "fields": {
//!         "created_on": "<base64>",
//!         "hash_string": "<base64>",
//!         "id": "<base64>",
//!         "secured_token": "<base64>"
//!     }
//! }
//! ```
//! Values are base64 so arbitrary bytes survive the JSON encoding.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::record::RecordFields;

// ── File format constants ─────────────────────────────────────────────────────

pub const RECORD_FILE_VERSION: u32 = 1;

// ── On-disk structure ─────────────────────────────────────────────────────────

/// Wrapper written to storage for each record.
#[derive(Debug, Serialize, Deserialize)]
struct RecordFile {
    /// Format version number.
    version: u32,
    /// Field name → base64 value.
    fields: BTreeMap<String, String>,
}

/// Encode record fields into the stored document.
pub fn encode(fields: &RecordFields) -> Result<Vec<u8>> {
    let file = RecordFile {
        version: RECORD_FILE_VERSION,
        fields: fields
            .iter()
            .map(|(k, v)| (k.clone(), STANDARD.encode(v)))
            .collect(),
    };
    serde_json::to_vec_pretty(&file).map_err(|e| StoreError::SerializationError(e.to_string()))
}

/// Decode a stored document. `origin` names the source in error messages.
pub fn decode(bytes: &[u8], origin: &str) -> Result<RecordFields> {
    let file: RecordFile = serde_json::from_slice(bytes).map_err(|e| {
        StoreError::InvalidFileFormat(format!("failed to parse record {origin}: {e}"))
    })?;

    if file.version != RECORD_FILE_VERSION {
        return Err(StoreError::InvalidFileFormat(format!(
            "unsupported record version={} in {origin}",
            file.version
        )));
    }

    file.fields
        .into_iter()
        .map(|(k, v)| {
            let bytes = STANDARD.decode(&v).map_err(|e| {
                StoreError::InvalidFileFormat(format!("invalid base64 for {k} in {origin}: {e}"))
            })?;
            Ok((k, bytes))
        })
        .collect()
}
