//! Application State Management
//!
//! This module provides the application state that contains the file
//! coordinator and its store dependencies, following the dependency
//! injection pattern. Stores are built once here and shared by every worker.

use std::sync::Arc;
use log::info;

use crate::blob::{BlobStore, local_store::LocalBlobStore, mock_store::MockBlobStore};
use crate::config::{AppConfig, BlobBackend, MetadataBackend};
use crate::error::StoreError;
use crate::metadata::{MetadataStore, sqlite_store::SqliteMetadataStore, mock_store::MockMetadataStore};
use crate::service::FileCoordinator;

/// Application state shared by all request handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<FileCoordinator>,
    pub config: AppConfig,
}

impl AppState {
    /// Create application state from configuration
    pub fn from_config(config: AppConfig) -> Result<Self, StoreError> {
        info!("Initializing application state with configuration");

        let metadata: Arc<dyn MetadataStore> = match config.metadata.backend {
            MetadataBackend::SQLite => {
                info!(
                    "Using SQLite metadata backend with db_path: {}, wal_mode: {}",
                    config.metadata.db_path, config.metadata.wal_mode
                );
                Arc::new(SqliteMetadataStore::new(&config.metadata)?)
            }
            MetadataBackend::Mock => {
                info!("Using mock metadata backend");
                Arc::new(MockMetadataStore::new())
            }
        };

        let blobs: Arc<dyn BlobStore> = match config.blob.backend {
            BlobBackend::Local => {
                info!("Using local blob backend with base_path: {}", config.blob.base_path);
                Arc::new(LocalBlobStore::new(&config.blob)?)
            }
            BlobBackend::Mock => {
                info!("Using mock blob backend");
                Arc::new(MockBlobStore::new())
            }
        };

        info!("Application state initialized successfully");
        Ok(Self::with_stores(config, metadata, blobs))
    }

    /// Wire already constructed stores into the coordinator
    pub fn with_stores(
        config: AppConfig,
        metadata: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            coordinator: Arc::new(FileCoordinator::new(metadata, blobs)),
            config,
        }
    }

    /// Create application state for testing with mock backends
    pub fn new_for_testing() -> Self {
        Self::with_stores(
            AppConfig::default(),
            Arc::new(MockMetadataStore::new()),
            Arc::new(MockBlobStore::new()),
        )
    }
}
