//! Companion metadata for a persisted vector index.
//!
//! The usearch file holds only keys and vectors. Everything else needed to
//! turn a hit back into a record lives here, one entry per index position.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kbase_storage::write_atomic;
use kbase_types::{QuantizationSetting, Record};

use crate::error::VectorError;

/// Current on-disk format version.
pub const META_VERSION: u32 = 1;

/// Contents of `vectors.meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub version: u32,
    pub dimension: usize,
    pub quantization: QuantizationSetting,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    /// Entry `i` describes the vector stored under key `i`.
    pub entries: Vec<Record>,
}

impl IndexMeta {
    pub fn new(dimension: usize, quantization: QuantizationSetting, entries: Vec<Record>) -> Self {
        Self {
            version: META_VERSION,
            dimension,
            quantization,
            updated_at: Utc::now(),
            entries,
        }
    }

    /// Read and parse a metadata file.
    ///
    /// A missing file is an IO `NotFound`; anything unparsable or of an
    /// unknown version is `Corrupted`.
    pub fn read(path: &Path) -> Result<Self, VectorError> {
        let bytes = fs::read(path)?;
        let meta: IndexMeta =
            serde_json::from_slice(&bytes).map_err(|e| VectorError::Corrupted {
                path: path.to_path_buf(),
                reason: format!("unreadable metadata: {}", e),
            })?;

        if meta.version != META_VERSION {
            return Err(VectorError::Corrupted {
                path: path.to_path_buf(),
                reason: format!("unsupported metadata version {}", meta.version),
            });
        }
        if meta.dimension == 0 {
            return Err(VectorError::Corrupted {
                path: path.to_path_buf(),
                reason: "dimension is zero".to_string(),
            });
        }

        Ok(meta)
    }

    /// Persist atomically.
    pub fn write(&self, path: &Path) -> Result<(), VectorError> {
        let bytes = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_read() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vectors.meta.json");

        let meta = IndexMeta::new(
            8,
            QuantizationSetting::F32,
            vec![Record::new("a"), Record::new("b").with_language("de")],
        );
        meta.write(&path).unwrap();

        let loaded = IndexMeta::read(&path).unwrap();
        assert_eq!(loaded.dimension, 8);
        assert_eq!(loaded.entries, meta.entries);
        assert_eq!(
            loaded.updated_at.timestamp_millis(),
            meta.updated_at.timestamp_millis()
        );
    }

    #[test]
    fn test_garbage_is_corrupted() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vectors.meta.json");
        fs::write(&path, b"[1, 2").unwrap();
        assert!(IndexMeta::read(&path).unwrap_err().is_corrupted());
    }

    #[test]
    fn test_unknown_version_is_corrupted() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("vectors.meta.json");
        let mut meta = IndexMeta::new(4, QuantizationSetting::F32, Vec::new());
        meta.version = 99;
        meta.write(&path).unwrap();
        assert!(IndexMeta::read(&path).unwrap_err().is_corrupted());
    }

    #[test]
    fn test_missing_is_io_not_found() {
        let temp = TempDir::new().unwrap();
        let err = IndexMeta::read(&temp.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, VectorError::Io(e) if e.kind() == std::io::ErrorKind::NotFound));
    }
}
