//! File coordinator
//!
//! Sequences calls to the metadata store and the blob store for each logical
//! file operation. The two stores share no transaction, so every operation is
//! an ordered two-step protocol and a failure between the steps is reported as
//! a named partial failure instead of a generic error.
//!
//! Ordering:
//! - upsert writes metadata first, then the blob
//! - delete removes metadata first, then the blob
//! - fetch reads metadata, then the blob
//! - list only reads metadata
//!
//! Both upsert and delete are idempotent. Retrying the same call after a
//! partial failure converges on a consistent state.

use std::io::Read;
use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::blob::{BlobReader, BlobStore};
use crate::error::{FileError, StoreError, StoreKind};
use crate::metadata::MetadataStore;
use crate::record::{self, record_id, FileRecord, FileSummary};

/// A file being served: its metadata and an open reader on its content
pub struct FetchedFile {
    pub record: FileRecord,
    pub content: BlobReader,
}

impl FetchedFile {
    /// Drain the content into memory
    pub fn into_bytes(self) -> Result<Vec<u8>, FileError> {
        let mut content = self.content;
        let mut buf = Vec::new();
        content
            .read_to_end(&mut buf)
            .map_err(|e| FileError::Store(StoreError::from_io(StoreKind::Blob, e)))?;
        Ok(buf)
    }
}

/// Coordinates the metadata and blob stores. Holds no mutable state, so one
/// instance is shared by every request.
pub struct FileCoordinator {
    metadata: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobStore>,
}

impl FileCoordinator {
    pub fn new(metadata: Arc<dyn MetadataStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { metadata, blobs }
    }

    /// Create or overwrite the file `filename` owned by `owner_id`.
    ///
    /// `content` is consumed and dropped before returning, whatever the outcome.
    pub fn upsert_file<R: Read>(
        &self,
        owner_id: &str,
        filename: &str,
        content_type: &str,
        content_length: u64,
        content: R,
    ) -> Result<FileRecord, FileError> {
        let mut content = content;
        record::validate_key(owner_id, filename)?;

        let record = FileRecord::new(owner_id, filename, content_type, content_length);
        debug!("Upserting {} ({} bytes) for owner {}", record.id, content_length, owner_id);

        // Nothing has been committed if this fails
        self.metadata.put(&record, owner_id)?;

        match self.write_blob(&record, &mut content) {
            Ok(()) => {
                info!("Stored {}/{} ({} bytes)", owner_id, filename, content_length);
                Ok(record)
            }
            Err(source) => {
                warn!(
                    "Metadata for {}/{} written but blob write failed: {}",
                    owner_id, filename, source
                );
                Err(FileError::PartialUpload {
                    record: Box::new(record),
                    source,
                })
            }
        }
    }

    fn write_blob(&self, record: &FileRecord, content: &mut dyn Read) -> Result<(), StoreError> {
        self.blobs.ensure_container(&record.owner_id)?;
        let written = self.blobs.write(&record.owner_id, &record.filename, content)?;
        if written != record.content_length {
            return Err(StoreError::permanent(
                StoreKind::Blob,
                format!(
                    "declared content length {} but {} bytes were written",
                    record.content_length, written
                ),
            ));
        }
        Ok(())
    }

    /// Open a stored file for reading
    pub fn fetch_file(&self, owner_id: &str, filename: &str) -> Result<FetchedFile, FileError> {
        record::validate_key(owner_id, filename)?;
        let id = record_id(owner_id, filename);

        let record = self
            .metadata
            .get(&id, owner_id)?
            .ok_or_else(|| FileError::not_found(owner_id, filename))?;

        match self.blobs.read(owner_id, filename)? {
            Some(content) => Ok(FetchedFile { record, content }),
            None => {
                error!("Metadata {} exists but blob {}/{} is missing", id, owner_id, filename);
                Err(FileError::InconsistentRecord {
                    owner_id: owner_id.to_string(),
                    filename: filename.to_string(),
                })
            }
        }
    }

    /// Metadata of every file the owner has. Does not touch the blob store.
    pub fn list_files(&self, owner_id: &str) -> Result<Vec<FileSummary>, FileError> {
        record::validate_owner(owner_id)?;

        let mut files = Vec::new();
        for record in self.metadata.query(owner_id)? {
            let record = record?;
            if record.owner_id != owner_id {
                warn!("Query for {} returned a record owned by {}", owner_id, record.owner_id);
                continue;
            }
            files.push(record.summary());
        }
        debug!("Listed {} files for owner {}", files.len(), owner_id);
        Ok(files)
    }

    /// Remove a file from both stores.
    ///
    /// Removing the metadata is what makes the file disappear for callers. A
    /// blob left behind after that is reported as `PartialDelete`. When the
    /// metadata is already gone the blob is still removed, which cleans up
    /// after earlier partial failures.
    pub fn delete_file(&self, owner_id: &str, filename: &str) -> Result<(), FileError> {
        record::validate_key(owner_id, filename)?;
        let id = record_id(owner_id, filename);

        let metadata_removed = self.metadata.delete(&id, owner_id)?;

        match self.blobs.delete(owner_id, filename) {
            Ok(blob_removed) => {
                if !metadata_removed && !blob_removed {
                    return Err(FileError::not_found(owner_id, filename));
                }
                if !metadata_removed {
                    info!("Removed orphaned blob {}/{}", owner_id, filename);
                } else if !blob_removed {
                    warn!("Deleted metadata {} which had no blob", id);
                }
                info!("Deleted {}/{}", owner_id, filename);
                Ok(())
            }
            Err(source) if metadata_removed => {
                warn!(
                    "Metadata for {}/{} deleted but blob delete failed: {}",
                    owner_id, filename, source
                );
                Err(FileError::PartialDelete {
                    owner_id: owner_id.to_string(),
                    filename: filename.to_string(),
                    source,
                })
            }
            Err(source) => Err(FileError::Store(source)),
        }
    }
}
