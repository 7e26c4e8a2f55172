//! Mock implementation of BlobStore for testing

use crate::blob::{BlobOperation, BlobReader, BlobStore};
use crate::error::{ErrorKind, StoreError, StoreKind};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::{Mutex, MutexGuard, PoisonError};

type Containers = HashMap<String, HashMap<String, Vec<u8>>>;

/// In-memory blob store: container -> name -> bytes
pub struct MockBlobStore {
    data: Mutex<Containers>,
    failures: Mutex<HashMap<BlobOperation, ErrorKind>>,
}

impl MockBlobStore {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Make every call to `op` fail with the given kind until cleared
    pub fn fail_on(&self, op: BlobOperation, kind: ErrorKind) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(op, kind);
    }

    pub fn clear_failures(&self) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Check if a blob exists without going through the trait
    pub fn contains(&self, container: &str, name: &str) -> bool {
        let data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        data.get(container)
            .map(|blobs| blobs.contains_key(name))
            .unwrap_or(false)
    }

    pub fn blob_len(&self, container: &str, name: &str) -> Option<usize> {
        let data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        data.get(container)
            .and_then(|blobs| blobs.get(name))
            .map(|bytes| bytes.len())
    }

    /// Remove a blob behind the coordinator's back
    pub fn remove_raw(&self, container: &str, name: &str) -> bool {
        let mut data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        data.get_mut(container)
            .map(|blobs| blobs.remove(name).is_some())
            .unwrap_or(false)
    }

    pub fn container_exists(&self, container: &str) -> bool {
        self.data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(container)
    }

    fn check(&self, op: BlobOperation) -> Result<(), StoreError> {
        let failures = self
            .failures
            .lock()
            .map_err(|_| StoreError::permanent(StoreKind::Blob, "mock store lock poisoned"))?;
        match failures.get(&op) {
            Some(kind) => Err(StoreError::new(
                StoreKind::Blob,
                *kind,
                format!("injected {:?} failure", op),
            )),
            None => Ok(()),
        }
    }

    fn data(&self) -> Result<MutexGuard<'_, Containers>, StoreError> {
        self.data
            .lock()
            .map_err(|_| StoreError::permanent(StoreKind::Blob, "mock store lock poisoned"))
    }
}

impl Default for MockBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobStore for MockBlobStore {
    fn ensure_container(&self, container: &str) -> Result<(), StoreError> {
        self.check(BlobOperation::EnsureContainer)?;
        self.data()?.entry(container.to_string()).or_default();
        Ok(())
    }

    fn write(&self, container: &str, name: &str, content: &mut dyn Read) -> Result<u64, StoreError> {
        self.check(BlobOperation::Write)?;
        let mut bytes = Vec::new();
        content
            .read_to_end(&mut bytes)
            .map_err(|e| StoreError::from_io(StoreKind::Blob, e))?;

        let mut data = self.data()?;
        let blobs = data.get_mut(container).ok_or_else(|| {
            StoreError::permanent(StoreKind::Blob, format!("container {} does not exist", container))
        })?;
        let written = bytes.len() as u64;
        blobs.insert(name.to_string(), bytes);
        Ok(written)
    }

    fn read(&self, container: &str, name: &str) -> Result<Option<BlobReader>, StoreError> {
        self.check(BlobOperation::Read)?;
        let data = self.data()?;
        Ok(data
            .get(container)
            .and_then(|blobs| blobs.get(name))
            .map(|bytes| Box::new(Cursor::new(bytes.clone())) as BlobReader))
    }

    fn delete(&self, container: &str, name: &str) -> Result<bool, StoreError> {
        self.check(BlobOperation::Delete)?;
        let mut data = self.data()?;
        Ok(data
            .get_mut(container)
            .map(|blobs| blobs.remove(name).is_some())
            .unwrap_or(false))
    }

    fn exists(&self, container: &str, name: &str) -> Result<bool, StoreError> {
        self.check(BlobOperation::Read)?;
        let data = self.data()?;
        Ok(data
            .get(container)
            .map(|blobs| blobs.contains_key(name))
            .unwrap_or(false))
    }
}
