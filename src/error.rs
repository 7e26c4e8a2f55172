//! Error types shared by the store clients and the file coordinator.

use std::fmt;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::record::FileRecord;

/// Which backing store produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Metadata,
    Blob,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Metadata => write!(f, "metadata"),
            StoreKind::Blob => write!(f, "blob"),
        }
    }
}

/// Whether a store failure is worth retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Timeouts, throttling, lock contention
    Transient,
    /// Conflicts, malformed keys, corrupt data
    Permanent,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Transient => write!(f, "transient"),
            ErrorKind::Permanent => write!(f, "permanent"),
        }
    }
}

/// Failure reported by one of the backing stores
#[derive(Debug, Clone, Error)]
#[error("{store} store {kind} error: {message}")]
pub struct StoreError {
    pub store: StoreKind,
    pub kind: ErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(store: StoreKind, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            store,
            kind,
            message: message.into(),
        }
    }

    pub fn transient(store: StoreKind, message: impl Into<String>) -> Self {
        Self::new(store, ErrorKind::Transient, message)
    }

    pub fn permanent(store: StoreKind, message: impl Into<String>) -> Self {
        Self::new(store, ErrorKind::Permanent, message)
    }

    pub fn is_transient(&self) -> bool {
        self.kind == ErrorKind::Transient
    }

    /// Classify an I/O error coming out of a store backend
    pub fn from_io(store: StoreKind, err: std::io::Error) -> Self {
        use std::io::ErrorKind as Io;
        let kind = match err.kind() {
            Io::TimedOut | Io::Interrupted | Io::WouldBlock => ErrorKind::Transient,
            _ => ErrorKind::Permanent,
        };
        Self::new(store, kind, err.to_string())
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        let kind = match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked) => {
                ErrorKind::Transient
            }
            _ => ErrorKind::Permanent,
        };
        StoreError::new(StoreKind::Metadata, kind, err.to_string())
    }
}

/// Outcome of a coordinator operation that did not succeed
#[derive(Debug, Error)]
pub enum FileError {
    /// A required field was missing or empty; no store was touched
    #[error("validation error: {0}")]
    Validation(String),

    /// Neither store has the file
    #[error("file not found: owner={owner_id}, filename={filename}")]
    NotFound { owner_id: String, filename: String },

    /// Metadata exists but the blob it points at is missing
    #[error("inconsistent record: metadata exists without blob for owner={owner_id}, filename={filename}")]
    InconsistentRecord { owner_id: String, filename: String },

    /// Metadata was written but the blob write failed
    #[error("partial upload failure for {}/{}: {source}", .record.owner_id, .record.filename)]
    PartialUpload {
        record: Box<FileRecord>,
        #[source]
        source: StoreError,
    },

    /// Metadata was removed but the blob could not be deleted
    #[error("partial delete failure for {owner_id}/{filename}: {source}")]
    PartialDelete {
        owner_id: String,
        filename: String,
        #[source]
        source: StoreError,
    },

    /// A store call failed before anything was committed
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl FileError {
    pub fn not_found(owner_id: &str, filename: &str) -> Self {
        FileError::NotFound {
            owner_id: owner_id.to_string(),
            filename: filename.to_string(),
        }
    }

    /// True when repeating the same call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            FileError::PartialUpload { .. } | FileError::PartialDelete { .. } => true,
            FileError::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl ResponseError for FileError {
    fn status_code(&self) -> StatusCode {
        match self {
            FileError::Validation(_) => StatusCode::BAD_REQUEST,
            FileError::NotFound { .. } => StatusCode::NOT_FOUND,
            FileError::InconsistentRecord { .. } => StatusCode::CONFLICT,
            FileError::PartialUpload { .. } | FileError::PartialDelete { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            FileError::Store(e) if e.is_transient() => StatusCode::SERVICE_UNAVAILABLE,
            FileError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).body(self.to_string())
    }
}
