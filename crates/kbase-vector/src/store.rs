//! Persistent vector index for one knowledge base.
//!
//! Wraps a usearch HNSW index whose keys are positions `0..count`, plus the
//! record each position was embedded from. The index is always loaded fully
//! into memory, extended, and persisted in full.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use tracing::{debug, info, warn};
use usearch::Index;

use kbase_embeddings::Embedding;
use kbase_storage::{commit_temp, temp_path, KbPaths};
use kbase_types::{QuantizationSetting, Record};

use crate::error::VectorError;
use crate::hnsw::{supports_reconstruction, HnswConfig};
use crate::metadata::IndexMeta;

/// A semantic search hit.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    /// Position of the vector in the index
    pub position: usize,
    /// Cosine similarity, higher is closer
    pub score: f32,
    /// Record the vector was embedded from
    pub record: Record,
}

/// ANN index plus per-position records.
pub struct VectorStore {
    index: Index,
    config: HnswConfig,
    dimension: usize,
    entries: Vec<Record>,
}

impl fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorStore")
            .field("dimension", &self.dimension)
            .field("count", &self.entries.len())
            .field("quantization", &self.config.quantization)
            .finish()
    }
}

impl VectorStore {
    /// Create an empty store.
    pub fn new(dimension: usize, config: &HnswConfig) -> Result<Self, VectorError> {
        if dimension == 0 {
            return Err(VectorError::Index("dimension must be positive".to_string()));
        }
        let index = config.new_index(dimension, 0)?;
        Ok(Self {
            index,
            config: config.clone(),
            dimension,
            entries: Vec::new(),
        })
    }

    /// Build a fresh store from `(text, vector)` pairs and parallel metadata.
    pub fn from_pairs(
        pairs: Vec<(String, Embedding)>,
        metadatas: Vec<BTreeMap<String, String>>,
        config: &HnswConfig,
    ) -> Result<Self, VectorError> {
        let dimension = pairs
            .first()
            .map(|(_, embedding)| embedding.dimension())
            .ok_or(VectorError::Empty)?;
        let mut store = Self::new(dimension, config)?;
        store.add(pairs, metadatas)?;
        Ok(store)
    }

    /// Build a fresh store from records and their vectors.
    pub fn from_entries(
        entries: Vec<(Record, Embedding)>,
        config: &HnswConfig,
    ) -> Result<Self, VectorError> {
        let dimension = entries
            .first()
            .map(|(_, embedding)| embedding.dimension())
            .ok_or(VectorError::Empty)?;
        let mut store = Self::new(dimension, config)?;
        store.add_entries(entries)?;
        Ok(store)
    }

    /// Append `(text, vector)` pairs with parallel metadata, in order.
    ///
    /// Returns the new count.
    pub fn add(
        &mut self,
        pairs: Vec<(String, Embedding)>,
        metadatas: Vec<BTreeMap<String, String>>,
    ) -> Result<usize, VectorError> {
        if pairs.len() != metadatas.len() {
            return Err(VectorError::LengthMismatch {
                pairs: pairs.len(),
                metadatas: metadatas.len(),
            });
        }

        let entries = pairs
            .into_iter()
            .zip(metadatas)
            .map(|((content, embedding), metadata)| (Record { content, metadata }, embedding))
            .collect();
        self.add_entries(entries)
    }

    /// Append records with their vectors, in order. Returns the new count.
    ///
    /// All dimensions are checked before anything is inserted, so a rejected
    /// call leaves the store unchanged.
    pub fn add_entries(&mut self, entries: Vec<(Record, Embedding)>) -> Result<usize, VectorError> {
        if let Some((_, bad)) = entries
            .iter()
            .find(|(_, embedding)| embedding.dimension() != self.dimension)
        {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                actual: bad.dimension(),
            });
        }

        self.reserve(entries.len())?;
        for (record, embedding) in entries {
            self.insert(record, &embedding.values)?;
        }

        debug!(count = self.entries.len(), "Added vectors");
        Ok(self.entries.len())
    }

    /// Append every vector of `other` after this store's vectors.
    ///
    /// Vectors are copied out of `other`; stores at reduced precision merge
    /// with that precision's rounding.
    pub fn merge(&mut self, other: &VectorStore) -> Result<usize, VectorError> {
        if other.dimension != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                actual: other.dimension,
            });
        }

        self.reserve(other.count())?;
        for (position, record) in other.entries.iter().enumerate() {
            let values = other.read_vector(position)?;
            self.insert(record.clone(), &values)?;
        }

        debug!(
            merged = other.count(),
            total = self.entries.len(),
            "Merged vector stores"
        );
        Ok(self.entries.len())
    }

    /// Set a metadata key on every entry, in memory only.
    pub fn tag_entries(&mut self, key: &str, value: &str) {
        for entry in &mut self.entries {
            entry.metadata.insert(key.to_string(), value.to_string());
        }
    }

    /// Number of vectors stored.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn quantization(&self) -> QuantizationSetting {
        self.config.quantization
    }

    pub fn entries(&self) -> &[Record] {
        &self.entries
    }

    pub fn entry(&self, position: usize) -> Option<&Record> {
        self.entries.get(position)
    }

    /// The stored vector at `position`.
    ///
    /// Only full-precision indexes give back exactly what was stored; others
    /// report [`VectorError::ReconstructUnsupported`].
    pub fn reconstruct(&self, position: usize) -> Result<Vec<f32>, VectorError> {
        if position >= self.count() {
            return Err(VectorError::OutOfRange {
                position,
                count: self.count(),
            });
        }
        if !supports_reconstruction(self.config.quantization) {
            return Err(VectorError::ReconstructUnsupported(self.config.quantization));
        }
        self.read_vector(position)
    }

    /// Top-`k` nearest neighbours of `query`, best first.
    pub fn search(&self, query: &Embedding, k: usize) -> Result<Vec<VectorHit>, VectorError> {
        if query.dimension() != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                actual: query.dimension(),
            });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let matches = self
            .index
            .search(&query.values, k.min(self.count()))
            .map_err(|e| VectorError::Index(e.to_string()))?;

        let hits: Vec<VectorHit> = matches
            .keys
            .iter()
            .zip(matches.distances.iter())
            .filter_map(|(&key, &distance)| {
                let position = key as usize;
                self.entries.get(position).map(|record| VectorHit {
                    position,
                    score: 1.0 - distance, // Convert distance to similarity
                    record: record.clone(),
                })
            })
            .collect();

        debug!(k, found = hits.len(), "Search complete");
        Ok(hits)
    }

    /// Persist both index files.
    ///
    /// Each file is replaced atomically; the ANN file is committed before the
    /// metadata file.
    pub fn save(&self, paths: &KbPaths) -> Result<(), VectorError> {
        std::fs::create_dir_all(&paths.dir)?;

        let tmp = temp_path(&paths.vector_index);
        self.index
            .save(path_str(&tmp)?)
            .map_err(|e| VectorError::Index(format!("Failed to save: {}", e)))?;
        commit_temp(&tmp, &paths.vector_index)?;

        IndexMeta::new(self.dimension, self.config.quantization, self.entries.clone())
            .write(&paths.vector_meta)?;

        info!(
            kb = %paths.name,
            vectors = self.count(),
            "Saved vector index"
        );
        Ok(())
    }

    /// Load both index files.
    ///
    /// Fails with [`VectorError::Missing`] when neither file exists and
    /// [`VectorError::Corrupted`] when the files are present but unreadable
    /// or disagree with each other. The stored quantization wins over
    /// `config`.
    pub fn load(paths: &KbPaths, config: &HnswConfig) -> Result<Self, VectorError> {
        let has_index = paths.vector_index.exists();
        let has_meta = paths.vector_meta.exists();

        match (has_index, has_meta) {
            (false, false) => return Err(VectorError::Missing(paths.vector_index.clone())),
            (true, false) => {
                return Err(corrupted(&paths.vector_meta, "metadata file missing"));
            }
            (false, true) => {
                return Err(corrupted(&paths.vector_index, "index file missing"));
            }
            (true, true) => {}
        }

        let meta = IndexMeta::read(&paths.vector_meta)?;
        let config = config.clone().with_quantization(meta.quantization);

        let index = config.new_index(meta.dimension, 0)?;
        index
            .load(path_str(&paths.vector_index)?)
            .map_err(|e| corrupted(&paths.vector_index, &format!("failed to load: {}", e)))?;

        if index.dimensions() != meta.dimension {
            return Err(corrupted(
                &paths.vector_index,
                &format!(
                    "index dimension {} but metadata says {}",
                    index.dimensions(),
                    meta.dimension
                ),
            ));
        }
        if index.size() != meta.entries.len() {
            return Err(corrupted(
                &paths.vector_index,
                &format!(
                    "index holds {} vectors but metadata lists {}",
                    index.size(),
                    meta.entries.len()
                ),
            ));
        }

        debug!(
            kb = %paths.name,
            vectors = index.size(),
            dimension = meta.dimension,
            "Loaded vector index"
        );

        Ok(Self {
            index,
            config,
            dimension: meta.dimension,
            entries: meta.entries,
        })
    }

    /// Load, mapping [`VectorError::Missing`] to `None`.
    pub fn load_if_present(
        paths: &KbPaths,
        config: &HnswConfig,
    ) -> Result<Option<Self>, VectorError> {
        match Self::load(paths, config) {
            Ok(store) => Ok(Some(store)),
            Err(VectorError::Missing(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Remove both index files. Returns whether anything was removed.
    pub fn delete_files(paths: &KbPaths) -> Result<bool, VectorError> {
        let mut removed = false;
        for path in [&paths.vector_index, &paths.vector_meta] {
            match std::fs::remove_file(path) {
                Ok(()) => removed = true,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        if removed {
            info!(kb = %paths.name, "Deleted vector index");
        }
        Ok(removed)
    }

    fn reserve(&self, additional: usize) -> Result<(), VectorError> {
        let needed = self.count() + additional;
        if needed > self.index.capacity() {
            self.index
                .reserve(needed)
                .map_err(|e| VectorError::Index(e.to_string()))?;
        }
        Ok(())
    }

    fn insert(&mut self, record: Record, values: &[f32]) -> Result<(), VectorError> {
        let key = self.entries.len() as u64;
        self.index
            .add(key, values)
            .map_err(|e| VectorError::Index(e.to_string()))?;
        self.entries.push(record);
        Ok(())
    }

    fn read_vector(&self, position: usize) -> Result<Vec<f32>, VectorError> {
        let mut values = vec![0.0f32; self.dimension];
        let found = self
            .index
            .get(position as u64, &mut values)
            .map_err(|e| VectorError::Index(e.to_string()))?;
        if found == 0 {
            warn!(position, "Vector listed in metadata but absent from index");
            return Err(VectorError::Index(format!(
                "no vector stored at position {}",
                position
            )));
        }
        Ok(values)
    }
}

fn path_str(path: &Path) -> Result<&str, VectorError> {
    path.to_str()
        .ok_or_else(|| VectorError::Index("Invalid path encoding".to_string()))
}

fn corrupted(path: &Path, reason: &str) -> VectorError {
    VectorError::Corrupted {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
