//! Metadata Store Abstraction
//!
//! This module provides an abstraction over the document store that holds one
//! `FileRecord` per file, partitioned by owner. The coordinator only depends on
//! the `MetadataStore` trait, so backends (SQLite, in-memory) can be swapped
//! without touching higher-level services.

pub mod sqlite_store;
pub mod mock_store;


use crate::error::StoreError;
use crate::record::FileRecord;

/// One-shot sequence of records produced by a query
pub type RecordStream = Box<dyn Iterator<Item = Result<FileRecord, StoreError>> + Send>;

/// Operations a metadata backend has to offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataOperation {
    Get,
    Put,
    Query,
    Delete,
}

/// Trait defining the metadata storage interface
pub trait MetadataStore: Send + Sync {
    /// Fetch a record by id within the owner's partition
    fn get(&self, id: &str, owner_id: &str) -> Result<Option<FileRecord>, StoreError>;

    /// Insert or overwrite the record keyed by `record.id`
    fn put(&self, record: &FileRecord, owner_id: &str) -> Result<(), StoreError>;

    /// All records in the owner's partition, in store-defined order
    fn query(&self, owner_id: &str) -> Result<RecordStream, StoreError>;

    /// Remove a record. Returns false when there was nothing to remove.
    fn delete(&self, id: &str, owner_id: &str) -> Result<bool, StoreError>;
}
