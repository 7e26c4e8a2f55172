//! SQLite implementation of MetadataStore

use crate::config::MetadataConfig;
use crate::error::{StoreError, StoreKind};
use crate::metadata::{MetadataStore, RecordStream};
use crate::record::FileRecord;
use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS files (
    id TEXT NOT NULL,
    owner_id TEXT NOT NULL,
    filename TEXT NOT NULL,
    content_type TEXT NOT NULL,
    content_length INTEGER NOT NULL,
    uploaded_at TEXT NOT NULL,
    PRIMARY KEY (owner_id, id)
)";

const SELECT_COLUMNS: &str =
    "SELECT id, owner_id, filename, content_type, content_length, uploaded_at FROM files";

/// SQLite implementation of MetadataStore
pub struct SqliteMetadataStore {
    conn: Mutex<Connection>,
}

impl SqliteMetadataStore {
    /// Open (or create) the database described by the configuration
    pub fn new(config: &MetadataConfig) -> Result<Self, StoreError> {
        let db_path = Path::new(&config.db_path);
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::from_io(StoreKind::Metadata, e))?;
            }
        }

        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        if config.wal_mode {
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            debug!("SQLite journal mode: {}", mode);
        }
        info!("Opened SQLite metadata store at {}", db_path.display());
        Self::with_connection(conn)
    }

    /// In-memory database, mostly useful for tests
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(CREATE_TABLE, [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::permanent(StoreKind::Metadata, "connection lock poisoned"))
    }
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    let content_length: i64 = row.get(4)?;
    let uploaded_at: String = row.get(5)?;
    let uploaded_at = DateTime::parse_from_rfc3339(&uploaded_at)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e)))?;

    Ok(FileRecord {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        filename: row.get(2)?,
        content_type: row.get(3)?,
        content_length: u64::try_from(content_length).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Integer, Box::new(e))
        })?,
        uploaded_at,
    })
}

impl MetadataStore for SqliteMetadataStore {
    fn get(&self, id: &str, owner_id: &str) -> Result<Option<FileRecord>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("{} WHERE owner_id = ?1 AND id = ?2", SELECT_COLUMNS);
        let record = conn
            .query_row(&sql, params![owner_id, id], row_to_record)
            .optional()?;
        Ok(record)
    }

    fn put(&self, record: &FileRecord, owner_id: &str) -> Result<(), StoreError> {
        if record.owner_id != owner_id {
            return Err(StoreError::permanent(
                StoreKind::Metadata,
                format!("record owner {} does not match partition {}", record.owner_id, owner_id),
            ));
        }
        let content_length = i64::try_from(record.content_length).map_err(|_| {
            StoreError::permanent(StoreKind::Metadata, "content length out of range")
        })?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO files (id, owner_id, filename, content_type, content_length, uploaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (owner_id, id) DO UPDATE SET
                filename = excluded.filename,
                content_type = excluded.content_type,
                content_length = excluded.content_length,
                uploaded_at = excluded.uploaded_at",
            params![
                record.id,
                owner_id,
                record.filename,
                record.content_type,
                content_length,
                record.uploaded_at.to_rfc3339(),
            ],
        )?;
        debug!("Upserted metadata {} for owner {}", record.id, owner_id);
        Ok(())
    }

    fn query(&self, owner_id: &str) -> Result<RecordStream, StoreError> {
        let conn = self.lock()?;
        let sql = format!("{} WHERE owner_id = ?1", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        // Rows borrow the connection guard, so they are drained before it is released
        let rows: Vec<Result<FileRecord, StoreError>> = stmt
            .query_map(params![owner_id], row_to_record)?
            .map(|row| row.map_err(StoreError::from))
            .collect();
        Ok(Box::new(rows.into_iter()))
    }

    fn delete(&self, id: &str, owner_id: &str) -> Result<bool, StoreError> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM files WHERE owner_id = ?1 AND id = ?2",
            params![owner_id, id],
        )?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sqlite_metadata_store_basic_operations() {
        let store = SqliteMetadataStore::in_memory().unwrap();
        let record = FileRecord::new("test_user_sqlite", "report.pdf", "application/pdf", 1024);

        assert!(store.get(&record.id, &record.owner_id).unwrap().is_none());

        store.put(&record, &record.owner_id).unwrap();
        let retrieved = store.get(&record.id, &record.owner_id).unwrap().unwrap();
        assert_eq!(retrieved.filename, "report.pdf");
        assert_eq!(retrieved.content_length, 1024);
        assert_eq!(retrieved.uploaded_at, record.uploaded_at);

        // Upsert overwrites in place
        let updated = FileRecord::new("test_user_sqlite", "report.pdf", "application/pdf", 2048);
        store.put(&updated, &updated.owner_id).unwrap();
        let listed: Vec<FileRecord> = store
            .query("test_user_sqlite")
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].content_length, 2048);

        assert!(store.delete(&record.id, &record.owner_id).unwrap());
        assert!(!store.delete(&record.id, &record.owner_id).unwrap());
        assert!(store.get(&record.id, &record.owner_id).unwrap().is_none());
    }

    #[test]
    fn test_sqlite_query_is_scoped_to_owner() {
        let store = SqliteMetadataStore::in_memory().unwrap();
        for (owner, name) in [("alice", "a.txt"), ("alice", "b.txt"), ("bob", "a.txt")] {
            let record = FileRecord::new(owner, name, "text/plain", 1);
            store.put(&record, owner).unwrap();
        }

        let alice: Vec<FileRecord> = store.query("alice").unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(alice.len(), 2);
        assert!(alice.iter().all(|r| r.owner_id == "alice"));

        let nobody = store.query("carol").unwrap().count();
        assert_eq!(nobody, 0);
    }

    #[test]
    fn test_sqlite_rejects_mismatched_partition() {
        let store = SqliteMetadataStore::in_memory().unwrap();
        let record = FileRecord::new("alice", "a.txt", "text/plain", 1);
        let err = store.put(&record, "bob").unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn test_sqlite_store_persists_to_file() {
        let dir = tempdir().unwrap();
        let config = MetadataConfig {
            db_path: dir.path().join("nested").join("metadata.db").to_string_lossy().into_owned(),
            ..MetadataConfig::default()
        };
        let record = FileRecord::new("u1", "a.txt", "text/plain", 5);

        {
            let store = SqliteMetadataStore::new(&config).unwrap();
            store.put(&record, "u1").unwrap();
        }

        let reopened = SqliteMetadataStore::new(&config).unwrap();
        assert_eq!(reopened.get(&record.id, "u1").unwrap(), Some(record));
    }
}
