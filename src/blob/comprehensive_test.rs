//! Comprehensive test to verify every blob backend honors the same contract

#[cfg(test)]
mod contract_tests {
    use crate::blob::{BlobStore, local_store::LocalBlobStore, mock_store::MockBlobStore};
    use crate::config::BlobConfig;
    use std::io::Read;
    use tempfile::TempDir;

    fn backends(dir: &TempDir) -> Vec<(&'static str, Box<dyn BlobStore>)> {
        let config = BlobConfig {
            base_path: dir.path().to_string_lossy().into_owned(),
            ..BlobConfig::default()
        };
        vec![
            ("local", Box::new(LocalBlobStore::new(&config).expect("Failed to create local store"))),
            ("mock", Box::new(MockBlobStore::new())),
        ]
    }

    fn read_string(store: &dyn BlobStore, container: &str, name: &str) -> Option<String> {
        store.read(container, name).unwrap().map(|mut reader| {
            let mut content = String::new();
            reader.read_to_string(&mut content).unwrap();
            content
        })
    }

    #[test]
    fn test_blob_contract_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        for (name, store) in backends(&dir) {
            store.ensure_container("owner").unwrap();
            store.ensure_container("owner").expect("ensure_container must be idempotent");

            assert_eq!(store.write("owner", "doc.txt", &mut &b"version one"[..]).unwrap(), 11);
            assert_eq!(store.write("owner", "doc.txt", &mut &b"two"[..]).unwrap(), 3);
            assert_eq!(read_string(store.as_ref(), "owner", "doc.txt").as_deref(), Some("two"), "{}", name);

            assert!(store.exists("owner", "doc.txt").unwrap());
            assert!(store.delete("owner", "doc.txt").unwrap(), "{}: delete should report removal", name);
            assert!(!store.delete("owner", "doc.txt").unwrap(), "{}: absent blob is not an error", name);
            assert_eq!(read_string(store.as_ref(), "owner", "doc.txt"), None);
        }
    }

    #[test]
    fn test_blob_contract_containers_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        for (name, store) in backends(&dir) {
            store.ensure_container("alice").unwrap();
            store.ensure_container("bob").unwrap();
            store.write("alice", "same.txt", &mut &b"alice"[..]).unwrap();
            store.write("bob", "same.txt", &mut &b"bob"[..]).unwrap();

            assert_eq!(read_string(store.as_ref(), "alice", "same.txt").as_deref(), Some("alice"), "{}", name);
            store.delete("alice", "same.txt").unwrap();
            assert_eq!(read_string(store.as_ref(), "bob", "same.txt").as_deref(), Some("bob"), "{}", name);
        }
    }
}
