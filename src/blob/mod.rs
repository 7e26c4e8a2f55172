//! Blob Store Abstraction
//!
//! This module provides an abstraction over byte-oriented object storage
//! addressed by container + name. Each owner gets one container and each
//! file is a blob named after its filename.

pub mod local_store;
pub mod mock_store;

#[cfg(test)]
mod comprehensive_test;

use std::io::Read;

use crate::error::StoreError;

/// Readable blob content handed back to callers
pub type BlobReader = Box<dyn Read + Send>;

/// Operations a blob backend has to offer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlobOperation {
    EnsureContainer,
    Write,
    Read,
    Delete,
}

/// Trait defining the blob storage interface
pub trait BlobStore: Send + Sync {
    /// Create the container if it does not exist yet. Idempotent.
    fn ensure_container(&self, container: &str) -> Result<(), StoreError>;

    /// Write a blob, replacing any existing one. Returns the number of bytes stored.
    fn write(&self, container: &str, name: &str, content: &mut dyn Read) -> Result<u64, StoreError>;

    /// Open a blob for reading, `None` if it does not exist
    fn read(&self, container: &str, name: &str) -> Result<Option<BlobReader>, StoreError>;

    /// Remove a blob. Returns whether anything was removed; absence is not an error.
    fn delete(&self, container: &str, name: &str) -> Result<bool, StoreError>;

    /// Check whether a blob exists
    fn exists(&self, container: &str, name: &str) -> Result<bool, StoreError>;
}
