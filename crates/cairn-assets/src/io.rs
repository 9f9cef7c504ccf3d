//! Storage access for asset loading.

use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use cairn_core::alloc::HashMap;

use crate::error::{AssetError, AssetResult};

/// A byte stream handed to a loader.
pub type ByteSource = Box<dyn Read + Send>;

/// Access to named resources. Names are paths using `/` as separator.
///
/// Implementations must be callable from several loader threads at once.
pub trait FileSystem: Send + Sync {
    /// Open a file for reading.
    ///
    /// A missing file must be reported as [`AssetError::NotFound`].
    fn open(&self, path: &str) -> AssetResult<ByteSource>;

    /// Check if a path exists.
    fn exists(&self, path: &str) -> bool {
        self.open(path).is_ok()
    }
}

/// Reads files from disk, relative to a root directory.
#[derive(Debug, Clone)]
pub struct DiskFileSystem {
    root: PathBuf,
}

impl DiskFileSystem {
    /// Create a file system rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a path relative to the root. Absolute paths are kept.
    fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl FileSystem for DiskFileSystem {
    fn open(&self, path: &str) -> AssetResult<ByteSource> {
        let full_path = self.resolve_path(path);
        match std::fs::File::open(&full_path) {
            Ok(file) => Ok(Box::new(std::io::BufReader::new(file))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AssetError::NotFound {
                path: full_path.display().to_string(),
            }),
            Err(e) => Err(AssetError::Io {
                path: full_path,
                source: e,
            }),
        }
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve_path(path).is_file()
    }
}

/// In-memory file system for embedded assets and tests.
///
/// Cloning is cheap and clones share the same files, so a test can keep a
/// clone to add files after handing one to the manager.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    files: Arc<RwLock<HashMap<String, Arc<[u8]>>>>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the bytes for a path.
    pub fn insert(&self, path: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        self.files.write().insert(path.into(), bytes.into());
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with_file(self, path: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        self.insert(path, bytes);
        self
    }

    pub fn remove(&self, path: &str) -> Option<Arc<[u8]>> {
        self.files.write().remove(path)
    }

    pub fn len(&self) -> usize {
        self.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().is_empty()
    }
}

/// Reader over shared bytes, so opening a file does not copy it.
struct SharedBytes(Arc<[u8]>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FileSystem for MemoryFileSystem {
    fn open(&self, path: &str) -> AssetResult<ByteSource> {
        let bytes = self
            .files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| AssetError::NotFound {
                path: path.to_string(),
            })?;
        Ok(Box::new(Cursor::new(SharedBytes(bytes))))
    }

    fn exists(&self, path: &str) -> bool {
        self.files.read().contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(mut source: ByteSource) -> Vec<u8> {
        let mut out = Vec::new();
        source.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_memory_fs() {
        let fs = MemoryFileSystem::new().with_file("textures/a.png", vec![1u8, 2, 3]);
        let shared = fs.clone();
        shared.insert("fonts/sans.ttf", b"ttf".to_vec());

        assert_eq!(fs.len(), 2);
        assert!(fs.exists("fonts/sans.ttf"));
        assert_eq!(read_all(fs.open("textures/a.png").unwrap()), vec![1, 2, 3]);

        let err = fs.open("textures/b.png").err().unwrap();
        assert!(err.is_not_found());

        assert!(fs.remove("textures/a.png").is_some());
        assert!(!shared.exists("textures/a.png"));
    }

    #[test]
    fn test_disk_fs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("files")).unwrap();
        std::fs::write(dir.path().join("files/data.bin"), [9u8, 8, 7]).unwrap();

        let fs = DiskFileSystem::new(dir.path());
        assert!(fs.exists("files/data.bin"));
        assert!(!fs.exists("files"));
        assert_eq!(read_all(fs.open("files/data.bin").unwrap()), vec![9, 8, 7]);

        let err = fs.open("files/missing.bin").err().unwrap();
        assert!(matches!(err, AssetError::NotFound { .. }));
    }
}
