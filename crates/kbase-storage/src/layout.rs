//! On-disk layout of knowledge bases.
//!
//! ```text
//! <root>/
//!   <kb name>/
//!     documents.json       document log
//!     vectors.usearch      ANN index
//!     vectors.meta.json    companion metadata for the ANN index
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use kbase_types::validate_kb_name;

use crate::error::StorageError;

/// Document log file name
pub const DOCUMENTS_FILE: &str = "documents.json";

/// ANN index file name
pub const VECTOR_INDEX_FILE: &str = "vectors.usearch";

/// ANN companion metadata file name
pub const VECTOR_META_FILE: &str = "vectors.meta.json";

/// Paths belonging to one knowledge base.
#[derive(Debug, Clone)]
pub struct KbPaths {
    pub name: String,
    pub dir: PathBuf,
    pub documents: PathBuf,
    pub vector_index: PathBuf,
    pub vector_meta: PathBuf,
}

impl KbPaths {
    /// Whether either vector index file is on disk.
    pub fn has_vector_files(&self) -> bool {
        self.vector_index.exists() || self.vector_meta.exists()
    }

    /// Whether anything of this knowledge base is on disk.
    pub fn exists(&self) -> bool {
        self.documents.exists() || self.has_vector_files()
    }
}

/// Root directory holding all knowledge bases.
#[derive(Debug, Clone)]
pub struct KbLayout {
    root: PathBuf,
}

impl KbLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve paths for a knowledge base, validating the name.
    pub fn paths(&self, name: &str) -> Result<KbPaths, StorageError> {
        validate_kb_name(name)?;
        let dir = self.root.join(name);
        Ok(KbPaths {
            name: name.to_string(),
            documents: dir.join(DOCUMENTS_FILE),
            vector_index: dir.join(VECTOR_INDEX_FILE),
            vector_meta: dir.join(VECTOR_META_FILE),
            dir,
        })
    }

    /// Names of all knowledge bases on disk, sorted.
    pub fn list(&self) -> Result<Vec<String>, StorageError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            match self.paths(&name) {
                Ok(paths) if paths.exists() => names.push(name),
                Ok(_) => debug!(dir = %name, "Skipping empty directory"),
                Err(_) => debug!(dir = %name, "Skipping directory with invalid name"),
            }
        }

        names.sort();
        Ok(names)
    }

    /// Remove a knowledge base wholesale. Returns whether anything existed.
    pub fn remove(&self, name: &str) -> Result<bool, StorageError> {
        let paths = self.paths(name)?;
        match fs::remove_dir_all(&paths.dir) {
            Ok(()) => {
                info!(kb = %name, "Deleted knowledge base");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
