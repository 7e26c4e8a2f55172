//! Mock implementation of MetadataStore for testing

use crate::error::{ErrorKind, StoreError, StoreKind};
use crate::metadata::{MetadataOperation, MetadataStore, RecordStream};
use crate::record::FileRecord;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// In-memory metadata store: owner_id -> id -> record
pub struct MockMetadataStore {
    data: Mutex<HashMap<String, HashMap<String, FileRecord>>>,
    failures: Mutex<HashMap<MetadataOperation, ErrorKind>>,
}

impl MockMetadataStore {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Make every call to `op` fail with the given kind until cleared
    pub fn fail_on(&self, op: MetadataOperation, kind: ErrorKind) {
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

    /// Number of records stored for an owner
    pub fn record_count(&self, owner_id: &str) -> usize {
        let data = self.data.lock().unwrap_or_else(PoisonError::into_inner);
        data.get(owner_id).map(|records| records.len()).unwrap_or(0)
    }

    /// Clear all data from the store
    pub fn clear(&self) {
        self.data
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn check(&self, op: MetadataOperation) -> Result<(), StoreError> {
        let failures = self
            .failures
            .lock()
            .map_err(|_| StoreError::permanent(StoreKind::Metadata, "mock store lock poisoned"))?;
        match failures.get(&op) {
            Some(kind) => Err(StoreError::new(
                StoreKind::Metadata,
                *kind,
                format!("injected {:?} failure", op),
            )),
            None => Ok(()),
        }
    }

    fn data(&self) -> Result<MutexGuard<'_, HashMap<String, HashMap<String, FileRecord>>>, StoreError> {
        self.data
            .lock()
            .map_err(|_| StoreError::permanent(StoreKind::Metadata, "mock store lock poisoned"))
    }
}

impl Default for MockMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataStore for MockMetadataStore {
    fn get(&self, id: &str, owner_id: &str) -> Result<Option<FileRecord>, StoreError> {
        self.check(MetadataOperation::Get)?;
        let data = self.data()?;
        Ok(data.get(owner_id).and_then(|records| records.get(id)).cloned())
    }

    fn put(&self, record: &FileRecord, owner_id: &str) -> Result<(), StoreError> {
        self.check(MetadataOperation::Put)?;
        if record.owner_id != owner_id {
            return Err(StoreError::permanent(
                StoreKind::Metadata,
                "record owner does not match partition",
            ));
        }
        let mut data = self.data()?;
        data.entry(owner_id.to_string())
            .or_default()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn query(&self, owner_id: &str) -> Result<RecordStream, StoreError> {
        self.check(MetadataOperation::Query)?;
        let data = self.data()?;
        let records: Vec<FileRecord> = data
            .get(owner_id)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default();
        Ok(Box::new(records.into_iter().map(Ok)))
    }

    fn delete(&self, id: &str, owner_id: &str) -> Result<bool, StoreError> {
        self.check(MetadataOperation::Delete)?;
        let mut data = self.data()?;
        Ok(data
            .get_mut(owner_id)
            .map(|records| records.remove(id).is_some())
            .unwrap_or(false))
    }
}
