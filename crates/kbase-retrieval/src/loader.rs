//! Loading several knowledge bases as one searchable corpus.

use serde::Serialize;
use tracing::{debug, info, warn};

use kbase_storage::DocumentLog;
use kbase_types::{Record, KB_KEY};
use kbase_vector::{HnswConfig, VectorError, VectorStore};

use crate::error::RetrievalError;

/// Per-knowledge-base contribution to a [`LoadedKnowledge`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KbSource {
    pub name: String,
    pub doc_count: usize,
    pub vector_count: usize,
}

/// A knowledge base whose vectors were left out of the merged index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedIndex {
    pub name: String,
    pub reason: String,
}

/// Records and vectors of several knowledge bases, merged.
///
/// Every record and index entry carries the originating knowledge base name
/// under [`KB_KEY`].
#[derive(Debug)]
pub struct LoadedKnowledge {
    /// All records of all named knowledge bases, in name then log order
    pub records: Vec<Record>,
    /// Merged vector index; `None` when no knowledge base had vectors
    pub index: Option<VectorStore>,
    /// Indexes that could not be merged, with the reason
    pub skipped: Vec<SkippedIndex>,
    pub sources: Vec<KbSource>,
}

impl LoadedKnowledge {
    /// Number of vectors available for semantic search.
    pub fn vector_count(&self) -> usize {
        self.index.as_ref().map(|i| i.count()).unwrap_or(0)
    }
}

/// Read every named document log and merge every named vector index.
///
/// A knowledge base without an index still contributes its records. A
/// corrupted index, or one whose dimension differs from the first loaded
/// index, is skipped with a warning. An unreadable document log is an error.
pub fn load_kbs(
    log: &DocumentLog,
    names: &[String],
    hnsw: &HnswConfig,
) -> Result<LoadedKnowledge, RetrievalError> {
    let mut records = Vec::new();
    let mut merged: Option<VectorStore> = None;
    let mut skipped = Vec::new();
    let mut sources = Vec::with_capacity(names.len());

    for name in names {
        let paths = log.layout().paths(name)?;

        let kb_records = log.read_all(name)?;
        let doc_count = kb_records.len();
        records.extend(
            kb_records
                .into_iter()
                .map(|record| record.with_metadata(KB_KEY, name.as_str())),
        );

        let mut store = match VectorStore::load(&paths, hnsw) {
            Ok(store) => store,
            Err(VectorError::Missing(_)) => {
                debug!(kb = %name, "No vector index, keyword search only");
                sources.push(KbSource {
                    name: name.clone(),
                    doc_count,
                    vector_count: 0,
                });
                continue;
            }
            Err(VectorError::Corrupted { reason, .. }) => {
                warn!(kb = %name, %reason, "Skipping corrupted vector index");
                skipped.push(SkippedIndex {
                    name: name.clone(),
                    reason,
                });
                sources.push(KbSource {
                    name: name.clone(),
                    doc_count,
                    vector_count: 0,
                });
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        store.tag_entries(KB_KEY, name);
        let vector_count = store.count();

        match merged.as_mut() {
            None => merged = Some(store),
            Some(target) => match target.merge(&store) {
                Ok(_) => {}
                Err(VectorError::DimensionMismatch { expected, actual }) => {
                    warn!(
                        kb = %name,
                        expected,
                        actual,
                        "Skipping vector index with a different dimension"
                    );
                    skipped.push(SkippedIndex {
                        name: name.clone(),
                        reason: format!("dimension {} differs from {}", actual, expected),
                    });
                    sources.push(KbSource {
                        name: name.clone(),
                        doc_count,
                        vector_count: 0,
                    });
                    continue;
                }
                Err(e) => return Err(e.into()),
            },
        }

        sources.push(KbSource {
            name: name.clone(),
            doc_count,
            vector_count,
        });
    }

    let loaded = LoadedKnowledge {
        records,
        index: merged,
        skipped,
        sources,
    };
    info!(
        kbs = names.len(),
        records = loaded.records.len(),
        vectors = loaded.vector_count(),
        skipped = loaded.skipped.len(),
        "Loaded knowledge bases"
    );
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbase_embeddings::MockEmbedder;
    use kbase_storage::KbLayout;
    use tempfile::TempDir;

    fn seed(log: &DocumentLog, name: &str, n: usize, with_vectors: bool) {
        let records: Vec<Record> = (0..n)
            .map(|i| Record::new(format!("{} chunk {}", name, i)))
            .collect();
        log.append(name, &records).unwrap();

        if with_vectors {
            let mock = MockEmbedder::new(16);
            let entries = records
                .into_iter()
                .map(|r| {
                    let v = mock.vector_for(&r.content);
                    (r, v)
                })
                .collect();
            let paths = log.layout().paths(name).unwrap();
            VectorStore::from_entries(entries, &HnswConfig::default())
                .unwrap()
                .save(&paths)
                .unwrap();
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_merge_counts_and_tags() {
        let temp = TempDir::new().unwrap();
        let log = DocumentLog::new(KbLayout::new(temp.path()));
        seed(&log, "a", 5, true);
        seed(&log, "b", 7, true);

        let loaded = load_kbs(&log, &names(&["a", "b"]), &HnswConfig::default()).unwrap();
        assert_eq!(loaded.records.len(), 12);
        assert_eq!(loaded.vector_count(), 12);
        assert_eq!(loaded.records[0].metadata[KB_KEY], "a");
        assert_eq!(loaded.records[11].metadata[KB_KEY], "b");

        let index = loaded.index.unwrap();
        assert_eq!(index.entry(4).unwrap().metadata[KB_KEY], "a");
        assert_eq!(index.entry(5).unwrap().metadata[KB_KEY], "b");
    }

    #[test]
    fn test_kb_without_index_contributes_records() {
        let temp = TempDir::new().unwrap();
        let log = DocumentLog::new(KbLayout::new(temp.path()));
        seed(&log, "a", 3, true);
        seed(&log, "plain", 4, false);

        let loaded = load_kbs(&log, &names(&["a", "plain"]), &HnswConfig::default()).unwrap();
        assert_eq!(loaded.records.len(), 7);
        assert_eq!(loaded.vector_count(), 3);
        assert!(loaded.skipped.is_empty());
        assert_eq!(
            loaded.sources[1],
            KbSource { name: "plain".into(), doc_count: 4, vector_count: 0 }
        );
    }

    #[test]
    fn test_corrupted_index_is_skipped() {
        let temp = TempDir::new().unwrap();
        let log = DocumentLog::new(KbLayout::new(temp.path()));
        seed(&log, "good", 2, true);
        seed(&log, "bad", 2, false);
        let paths = log.layout().paths("bad").unwrap();
        std::fs::write(&paths.vector_index, b"garbage").unwrap();

        let loaded = load_kbs(&log, &names(&["good", "bad"]), &HnswConfig::default()).unwrap();
        assert_eq!(loaded.vector_count(), 2);
        assert_eq!(loaded.records.len(), 4);
        assert_eq!(loaded.skipped.len(), 1);
        assert_eq!(loaded.skipped[0].name, "bad");
    }

    #[test]
    fn test_nothing_loaded() {
        let temp = TempDir::new().unwrap();
        let log = DocumentLog::new(KbLayout::new(temp.path()));
        let loaded = load_kbs(&log, &[], &HnswConfig::default()).unwrap();
        assert!(loaded.records.is_empty());
        assert!(loaded.index.is_none());
    }
}
