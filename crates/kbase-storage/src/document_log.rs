//! Durable document log.
//!
//! One pretty-printed JSON array of records per knowledge base, rewritten in
//! full on every append. The log is the source of truth for what should
//! exist; a record's index in it is the record's ID.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use kbase_types::Record;

use crate::error::StorageError;
use crate::fs::write_atomic;
use crate::layout::KbLayout;

/// Append/rewrite-durable record store.
#[derive(Debug, Clone)]
pub struct DocumentLog {
    layout: KbLayout,
}

impl DocumentLog {
    pub fn new(layout: KbLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &KbLayout {
        &self.layout
    }

    /// Append records to the end of the log and persist.
    ///
    /// Returns the log length after the append. An existing log that cannot
    /// be parsed is reported as [`StorageError::Corrupted`] and never
    /// overwritten. Callers must not submit the same batch twice.
    pub fn append(&self, name: &str, records: &[Record]) -> Result<usize, StorageError> {
        let paths = self.layout.paths(name)?;
        let mut all = read_log(&paths.documents)?;

        if records.is_empty() {
            debug!(kb = %name, "Nothing to append");
            return Ok(all.len());
        }

        let previous = all.len();
        all.extend_from_slice(records);

        let bytes = serde_json::to_vec_pretty(&all)?;
        write_atomic(&paths.documents, &bytes)?;

        info!(
            kb = %name,
            appended = records.len(),
            previous,
            total = all.len(),
            "Appended records to document log"
        );
        Ok(all.len())
    }

    /// All records in log order; empty if the log does not exist.
    pub fn read_all(&self, name: &str) -> Result<Vec<Record>, StorageError> {
        let paths = self.layout.paths(name)?;
        read_log(&paths.documents)
    }

    /// Number of records in the log.
    pub fn count(&self, name: &str) -> Result<usize, StorageError> {
        Ok(self.read_all(name)?.len())
    }

    /// Case-insensitive substring search over record content.
    ///
    /// Scans in log order and stops after `limit` matches. Returns
    /// `(position, record)` pairs.
    pub fn search(
        &self,
        name: &str,
        keyword: &str,
        limit: usize,
    ) -> Result<Vec<(usize, Record)>, StorageError> {
        let records = self.read_all(name)?;
        Ok(keyword_search(records, keyword, limit))
    }

    /// Remove the log file. Returns whether it existed.
    pub fn delete(&self, name: &str) -> Result<bool, StorageError> {
        let paths = self.layout.paths(name)?;
        match fs::remove_file(&paths.documents) {
            Ok(()) => {
                info!(kb = %name, "Deleted document log");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keyword filter shared by single-log and merged-record searches.
pub fn keyword_search(records: Vec<Record>, keyword: &str, limit: usize) -> Vec<(usize, Record)> {
    let needle = keyword.to_lowercase();
    records
        .into_iter()
        .enumerate()
        .filter(|(_, record)| record.contains_lowercase(&needle))
        .take(limit)
        .collect()
}

fn read_log(path: &Path) -> Result<Vec<Record>, StorageError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    serde_json::from_slice(&bytes).map_err(|e| StorageError::Corrupted {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
