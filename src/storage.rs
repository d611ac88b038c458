//! Blob store gateway.
//!
//! The pipeline and the download route only ever see the `BlobStore` trait;
//! production uses a directory-rooted store, tests use an in-memory one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Storage transport error: {0}")]
    Transport(String),

    #[error("Invalid blob path: {0}")]
    InvalidPath(String),
}

/// Opaque binary store. No retry logic beyond what the backing client does.
pub trait BlobStore: Send + Sync {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    fn store(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError>;
}

/// SHA-256 content hash, hex-encoded. Used as the document ETag.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Filesystem-rooted blob store. Paths are relative to the root; traversal
/// outside the root is rejected.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl BlobStore for LocalBlobStore {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let full = self.resolve(path)?;
        match std::fs::read(&full) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.to_string()))
            }
            Err(e) => Err(StorageError::Transport(e.to_string())),
        }
    }

    fn store(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Transport(e.to_string()))?;
        }
        std::fs::write(&full, bytes).map_err(|e| StorageError::Transport(e.to_string()))
    }
}

/// In-memory blob store for tests.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(self, path: &str, bytes: &[u8]) -> Self {
        self.blobs
            .lock()
            .unwrap()
            .insert(path.to_string(), bytes.to_vec());
        self
    }
}

impl BlobStore for MemoryBlobStore {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.blobs
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    fn store(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.blobs
            .lock()
            .unwrap()
            .insert(path.to_string(), bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());

        store.store("docs/2026/acta.pdf", b"%PDF-1.7").unwrap();
        let bytes = store.fetch("docs/2026/acta.pdf").unwrap();
        assert_eq!(bytes, b"%PDF-1.7");
    }

    #[test]
    fn local_store_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        assert!(matches!(
            store.fetch("nope.pdf"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path());
        assert!(matches!(
            store.fetch("../etc/passwd"),
            Err(StorageError::InvalidPath(_))
        ));
        assert!(matches!(
            store.store("/abs/path", b"x"),
            Err(StorageError::InvalidPath(_))
        ));
    }

    #[test]
    fn content_hash_is_stable_hex() {
        let h = content_hash(b"hello");
        assert_eq!(h.len(), 64);
        assert_eq!(h, content_hash(b"hello"));
        assert_ne!(h, content_hash(b"hello "));
    }

    #[test]
    fn memory_store_behaves_like_local() {
        let store = MemoryBlobStore::new().with_blob("a.txt", b"abc");
        assert_eq!(store.fetch("a.txt").unwrap(), b"abc");
        assert!(matches!(
            store.fetch("b.txt"),
            Err(StorageError::NotFound(_))
        ));
    }
}
