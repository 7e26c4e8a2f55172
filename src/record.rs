//! File record model
//!
//! The canonical shape of a file's metadata as stored in the metadata store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FileError;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Longest owner id or filename accepted, in bytes. Matches the common
/// filesystem limit on a single path component.
pub const MAX_NAME_BYTES: usize = 255;

/// Owner identifier type
pub type OwnerId = String;

/// Record identifier type
pub type RecordId = String;

/// Derive the record id for an (owner, filename) pair.
///
/// Both parts are hex encoded and joined with `-`, which never appears in
/// hex output, so distinct pairs always map to distinct ids.
pub fn record_id(owner_id: &str, filename: &str) -> RecordId {
    format!("{}-{}", hex::encode(owner_id), hex::encode(filename))
}

/// Metadata for one stored file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: RecordId,
    /// Partition key, also the blob container
    pub owner_id: OwnerId,
    /// Blob name within the owner's container
    pub filename: String,
    pub content_type: String,
    pub content_length: u64,
    pub uploaded_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn new(owner_id: &str, filename: &str, content_type: &str, content_length: u64) -> Self {
        let content_type = if content_type.trim().is_empty() {
            DEFAULT_CONTENT_TYPE
        } else {
            content_type
        };

        Self {
            id: record_id(owner_id, filename),
            owner_id: owner_id.to_string(),
            filename: filename.to_string(),
            content_type: content_type.to_string(),
            content_length,
            uploaded_at: Utc::now(),
        }
    }

    pub fn summary(&self) -> FileSummary {
        FileSummary {
            filename: self.filename.clone(),
            content_type: self.content_type.clone(),
            content_length: self.content_length,
        }
    }
}

/// What a listing returns for each file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub filename: String,
    pub content_type: String,
    pub content_length: u64,
}

/// Owner ids and filenames double as container and blob names, so each has
/// to be a single non-empty path component
fn validate_component(field: &str, value: &str) -> Result<(), FileError> {
    if value.trim().is_empty() {
        return Err(FileError::Validation(format!("{} cannot be empty", field)));
    }
    if value == "." || value == ".." || value.contains(['/', '\\', '\0']) {
        return Err(FileError::Validation(format!("invalid {}: {:?}", field, value)));
    }
    if value.len() > MAX_NAME_BYTES {
        return Err(FileError::Validation(format!(
            "{} is {} bytes, limit is {}",
            field,
            value.len(),
            MAX_NAME_BYTES
        )));
    }
    Ok(())
}

/// Reject bad owner ids and filenames before any store is touched
pub fn validate_key(owner_id: &str, filename: &str) -> Result<(), FileError> {
    validate_owner(owner_id)?;
    validate_component("filename", filename)
}

pub fn validate_owner(owner_id: &str) -> Result<(), FileError> {
    validate_component("owner id", owner_id)
}
