// Storage collaborator boundary
//
// The batch processor only speaks this trait; production maps
// containers to directories on the local filesystem, tests substitute
// an in-memory fake.

use crate::core::errors::StorageError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Object storage as seen by the pipeline: opaque containers holding
/// byte blobs under `/`-separated keys.
pub trait ObjectStore: Send + Sync {
    fn download(&self, container: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    fn upload(&self, container: &str, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// All keys in `container` starting with `prefix`, in lexicographic
    /// order. The listing reflects storage at call time only; files
    /// arriving mid-listing may or may not appear.
    fn list(&self, container: &str, prefix: &str) -> Result<Vec<String>, StorageError>;
}

/// Filesystem-backed store: each container is a directory under `root`,
/// each key a relative path inside it.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, container: &str, key: &str) -> Result<PathBuf, StorageError> {
        for part in [container, key] {
            let has_escape = Path::new(part)
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
            if part.is_empty() || has_escape {
                return Err(StorageError::InvalidKey {
                    key: format!("{container}/{key}"),
                });
            }
        }
        Ok(self.root.join(container).join(key))
    }

    fn collect_keys(
        dir: &Path,
        base: &Path,
        prefix: &str,
        out: &mut Vec<String>,
    ) -> std::io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                Self::collect_keys(&path, base, prefix, out)?;
            } else if let Ok(rel) = path.strip_prefix(base) {
                let key = rel
                    .components()
                    .filter_map(|c| c.as_os_str().to_str())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.starts_with(prefix) {
                    out.push(key);
                }
            }
        }
        Ok(())
    }
}

impl ObjectStore for LocalStore {
    fn download(&self, container: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.resolve(container, key)?;
        fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StorageError::NotFound {
                container: container.to_string(),
                key: key.to_string(),
            },
            _ => StorageError::Io(e),
        })
    }

    fn upload(&self, container: &str, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.resolve(container, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        debug!(container, key, size = bytes.len(), "stored object");
        Ok(())
    }

    fn list(&self, container: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        let base = self.root.join(container);
        let mut keys = Vec::new();
        match Self::collect_keys(&base, &base, prefix, &mut keys) {
            Ok(()) => {}
            // A container nothing was ever uploaded to is just empty.
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StorageError::Io(e)),
        }
        keys.sort();
        Ok(keys)
    }
}
