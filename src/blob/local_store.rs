//! Local filesystem blob storage implementation
//!
//! Containers are directories under `<base_path>/containers`, blobs are files
//! inside them. Writes land in `<base_path>/tmp` first and are renamed into
//! place, so a failed or interrupted write never replaces an existing blob
//! with partial content.

use crate::blob::{BlobReader, BlobStore};
use crate::config::BlobConfig;
use crate::error::{StoreError, StoreKind};
use log::{debug, info};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Local filesystem blob store
pub struct LocalBlobStore {
    containers_path: PathBuf,
    temp_path: PathBuf,
    temp_counter: AtomicU64,
}

fn io_error(err: io::Error) -> StoreError {
    StoreError::from_io(StoreKind::Blob, err)
}

/// Container and blob names map straight onto path components
fn check_component(kind: &str, value: &str) -> Result<(), StoreError> {
    if value.is_empty()
        || value == "."
        || value == ".."
        || value.contains('/')
        || value.contains('\\')
        || value.contains('\0')
    {
        return Err(StoreError::permanent(
            StoreKind::Blob,
            format!("malformed {} name: {:?}", kind, value),
        ));
    }
    Ok(())
}

impl LocalBlobStore {
    pub fn new(config: &BlobConfig) -> Result<Self, StoreError> {
        let base_path = PathBuf::from(&config.base_path);
        let containers_path = base_path.join("containers");
        let temp_path = base_path.join("tmp");
        fs::create_dir_all(&containers_path).map_err(io_error)?;
        fs::create_dir_all(&temp_path).map_err(io_error)?;
        info!("Using local blob storage directory: {}", base_path.display());

        Ok(Self {
            containers_path,
            temp_path,
            temp_counter: AtomicU64::new(0),
        })
    }

    fn container_path(&self, container: &str) -> Result<PathBuf, StoreError> {
        check_component("container", container)?;
        Ok(self.containers_path.join(container))
    }

    fn blob_path(&self, container: &str, name: &str) -> Result<PathBuf, StoreError> {
        check_component("blob", name)?;
        Ok(self.container_path(container)?.join(name))
    }

    fn next_temp_path(&self) -> PathBuf {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        self.temp_path.join(format!("upload-{}-{}", std::process::id(), n))
    }

    fn copy_to_temp(temp: &Path, content: &mut dyn Read) -> io::Result<u64> {
        let mut file = File::create(temp)?;
        let written = io::copy(content, &mut file)?;
        file.flush()?;
        file.sync_all()?;
        Ok(written)
    }
}

impl BlobStore for LocalBlobStore {
    fn ensure_container(&self, container: &str) -> Result<(), StoreError> {
        let path = self.container_path(container)?;
        fs::create_dir_all(&path).map_err(io_error)
    }

    fn write(&self, container: &str, name: &str, content: &mut dyn Read) -> Result<u64, StoreError> {
        let target = self.blob_path(container, name)?;
        let temp = self.next_temp_path();

        let written = match Self::copy_to_temp(&temp, content) {
            Ok(written) => written,
            Err(e) => {
                let _ = fs::remove_file(&temp);
                return Err(io_error(e));
            }
        };
        if let Err(e) = fs::rename(&temp, &target) {
            let _ = fs::remove_file(&temp);
            return Err(io_error(e));
        }

        debug!("Wrote blob {}/{} ({} bytes)", container, name, written);
        Ok(written)
    }

    fn read(&self, container: &str, name: &str) -> Result<Option<BlobReader>, StoreError> {
        let path = self.blob_path(container, name)?;
        match File::open(&path) {
            Ok(file) => Ok(Some(Box::new(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error(e)),
        }
    }

    fn delete(&self, container: &str, name: &str) -> Result<bool, StoreError> {
        let path = self.blob_path(container, name)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted blob {}/{}", container, name);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(e)),
        }
    }

    fn exists(&self, container: &str, name: &str) -> Result<bool, StoreError> {
        let path = self.blob_path(container, name)?;
        Ok(path.is_file())
    }
}
