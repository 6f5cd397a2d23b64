//! Resource loading boundary.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Supplies the bytes of named resource files.
///
/// Where the bytes come from is the host's business: a directory, an
/// archive, an embedded table. `Ok(None)` means "no such file"; `Err` is
/// reserved for files that exist but could not be read.
pub trait ResourceLoader: Send + Sync {
    /// Loads `file_name`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file exists but cannot be read.
    fn load(&self, file_name: &str) -> io::Result<Option<Vec<u8>>>;
}

/// Serves resources from files below a base directory.
///
/// Names are relative paths using `/`. Absolute paths and `..` components
/// are refused.
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    base: PathBuf,
}

impl DirectoryLoader {
    /// Creates a loader rooted at `base`.
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Returns the base directory.
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn resolve(&self, file_name: &str) -> io::Result<PathBuf> {
        let relative = Path::new(file_name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("resource name '{file_name}' leaves the resource directory"),
            ));
        }
        Ok(self.base.join(relative))
    }
}

impl ResourceLoader for DirectoryLoader {
    fn load(&self, file_name: &str) -> io::Result<Option<Vec<u8>>> {
        let path = self.resolve(file_name)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Serves resources from an in-memory table.
#[derive(Debug, Default)]
pub struct MemoryLoader {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryLoader {
    /// Creates an empty loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file, consuming and returning the loader.
    #[must_use]
    pub fn with_file(self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(name, bytes);
        self
    }

    /// Adds or replaces a file.
    pub fn insert(&self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.write().insert(name.into(), bytes.into());
    }
}

impl ResourceLoader for MemoryLoader {
    fn load(&self, file_name: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.files.read().get(file_name).cloned())
    }
}

/// The loaded content of one resource file.
#[derive(Clone, PartialEq, Eq)]
pub struct Resource {
    name: String,
    bytes: Arc<[u8]>,
}

impl Resource {
    pub(crate) fn new(name: String, bytes: Vec<u8>) -> Self {
        Self {
            name,
            bytes: bytes.into(),
        }
    }

    /// Returns the file name the resource was loaded from.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the raw content.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the content as UTF-8 text, if it is valid UTF-8.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.bytes).ok()
    }

    /// Returns the content length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns `true` for an empty file.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}
