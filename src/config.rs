//! Application Configuration
//!
//! This module provides configuration management for the application,
//! supporting YAML configuration files with sensible defaults and
//! environment overrides for the backend selection.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use log::{info, warn};

pub const CONFIG_PATH_ENV: &str = "FILE_SERVER_CONFIG";
pub const METADATA_BACKEND_ENV: &str = "METADATA_BACKEND";
pub const BLOB_BACKEND_ENV: &str = "BLOB_BACKEND";

/// Metadata backend types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub enum MetadataBackend {
    #[default]
    SQLite,
    Mock,
}

impl std::str::FromStr for MetadataBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(MetadataBackend::SQLite),
            "mock" => Ok(MetadataBackend::Mock),
            _ => Err(format!("Unknown metadata backend: {}", s)),
        }
    }
}

/// Blob backend types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub enum BlobBackend {
    #[default]
    Local,
    Mock,
}

impl std::str::FromStr for BlobBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "disk" => Ok(BlobBackend::Local),
            "mock" => Ok(BlobBackend::Mock),
            _ => Err(format!("Unknown blob backend: {}", s)),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Metadata store configuration
    pub metadata: MetadataConfig,
    /// Blob store configuration
    pub blob: BlobConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Number of worker threads
    pub workers: usize,
    /// Maximum upload size in bytes, enforced by the upload handler while it
    /// reads the body
    pub max_payload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9710,
            workers: 4,
            max_payload_size: 1024 * 1024 * 1024,
        }
    }
}

/// Metadata backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub backend: MetadataBackend,
    /// Database file path
    pub db_path: String,
    /// How long SQLite waits on a locked database before giving up
    pub busy_timeout_ms: u64,
    /// Enable WAL mode
    pub wal_mode: bool,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            backend: MetadataBackend::default(),
            db_path: "./data/metadata.db".to_string(),
            busy_timeout_ms: 5000,
            wal_mode: true,
        }
    }
}

/// Blob backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    pub backend: BlobBackend,
    /// Root directory for containers and temporary uploads
    pub base_path: String,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            backend: BlobBackend::default(),
            base_path: "./data/blobs".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Path to log4rs configuration file
    pub config_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            config_file: "server_log.yaml".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the file named by `FILE_SERVER_CONFIG` (or
    /// `config.yaml`), use defaults if not found, then apply env overrides
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| "config.yaml".to_string());
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file, defaults if it does not exist
    pub fn load_from(config_path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = config_path.as_ref();
        if config_path.exists() {
            let content = fs::read_to_string(config_path)?;
            let config: AppConfig = serde_yaml::from_str(&content)?;
            info!("Loaded configuration from {}", config_path.display());
            Ok(config)
        } else {
            warn!("Config file {} not found, using defaults", config_path.display());
            Ok(Self::default())
        }
    }

    /// Backend selection from `METADATA_BACKEND` / `BLOB_BACKEND`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = env::var(METADATA_BACKEND_ENV) {
            match value.parse::<MetadataBackend>() {
                Ok(backend) => {
                    info!("Using metadata backend from environment: {:?}", backend);
                    self.metadata.backend = backend;
                }
                Err(e) => warn!("{}. Keeping {:?}.", e, self.metadata.backend),
            }
        }

        if let Ok(value) = env::var(BLOB_BACKEND_ENV) {
            match value.parse::<BlobBackend>() {
                Ok(backend) => {
                    info!("Using blob backend from environment: {:?}", backend);
                    self.blob.backend = backend;
                }
                Err(e) => warn!("{}. Keeping {:?}.", e, self.blob.backend),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_backend_from_str() {
        assert_eq!("sqlite".parse::<MetadataBackend>().unwrap(), MetadataBackend::SQLite);
        assert_eq!("SQLite".parse::<MetadataBackend>().unwrap(), MetadataBackend::SQLite);
        assert_eq!("MOCK".parse::<MetadataBackend>().unwrap(), MetadataBackend::Mock);
        assert!("cosmos".parse::<MetadataBackend>().is_err());

        assert_eq!("local".parse::<BlobBackend>().unwrap(), BlobBackend::Local);
        assert_eq!("disk".parse::<BlobBackend>().unwrap(), BlobBackend::Local);
        assert_eq!("mock".parse::<BlobBackend>().unwrap(), BlobBackend::Mock);
        assert!("azure".parse::<BlobBackend>().is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = AppConfig::load_from("/definitely/not/here.yaml").unwrap();
        assert_eq!(config.server.port, 9710);
        assert_eq!(config.metadata.backend, MetadataBackend::SQLite);
        assert_eq!(config.blob.backend, BlobBackend::Local);
    }

    #[test]
    fn test_load_partial_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "server:\n  port: 8080\nmetadata:\n  backend: Mock\nblob:\n  base_path: /tmp/blobs"
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.metadata.backend, MetadataBackend::Mock);
        assert_eq!(config.metadata.busy_timeout_ms, 5000);
        assert_eq!(config.blob.base_path, "/tmp/blobs");
        assert_eq!(config.blob.backend, BlobBackend::Local);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        env::set_var(METADATA_BACKEND_ENV, "mock");
        env::set_var(BLOB_BACKEND_ENV, "mock");
        let mut config = AppConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.metadata.backend, MetadataBackend::Mock);
        assert_eq!(config.blob.backend, BlobBackend::Mock);

        // Invalid values leave the configured backend alone
        env::set_var(METADATA_BACKEND_ENV, "invalid");
        env::remove_var(BLOB_BACKEND_ENV);
        let mut config = AppConfig::default();
        config.apply_env_overrides();
        assert_eq!(config.metadata.backend, MetadataBackend::SQLite);
        assert_eq!(config.blob.backend, BlobBackend::Local);

        env::remove_var(METADATA_BACKEND_ENV);
    }
}
