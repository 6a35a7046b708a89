//! HNSW parameters and usearch index construction.
//!
//! Parameters tuned for quality over speed:
//! - M = 16 (connections per layer)
//! - ef_construction = 200 (build-time quality)
//! - ef_search = 100 (search-time quality)

use usearch::{Index, IndexOptions, MetricKind, ScalarKind};

use kbase_types::{QuantizationSetting, VectorSettings};

use crate::error::VectorError;

/// HNSW index configuration. The dimension is not part of it: it is fixed
/// by the first vector stored in a knowledge base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HnswConfig {
    /// Number of connections per layer (M parameter)
    pub connectivity: usize,
    /// Build-time search depth (ef_construction)
    pub expansion_add: usize,
    /// Query-time search depth (ef_search)
    pub expansion_search: usize,
    /// Storage precision for new indexes
    pub quantization: QuantizationSetting,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self {
            connectivity: 16,
            expansion_add: 200,
            expansion_search: 100,
            quantization: QuantizationSetting::F32,
        }
    }
}

impl HnswConfig {
    pub fn from_settings(settings: &VectorSettings) -> Self {
        Self {
            connectivity: settings.connectivity,
            expansion_add: settings.expansion_add,
            expansion_search: settings.expansion_search,
            quantization: settings.quantization,
        }
    }

    pub fn with_connectivity(mut self, m: usize) -> Self {
        self.connectivity = m;
        self
    }

    pub fn with_expansion(mut self, ef_add: usize, ef_search: usize) -> Self {
        self.expansion_add = ef_add;
        self.expansion_search = ef_search;
        self
    }

    pub fn with_quantization(mut self, quantization: QuantizationSetting) -> Self {
        self.quantization = quantization;
        self
    }

    fn options(&self, dimension: usize) -> IndexOptions {
        IndexOptions {
            dimensions: dimension,
            metric: MetricKind::Cos, // Cosine similarity
            quantization: scalar_kind(self.quantization),
            connectivity: self.connectivity,
            expansion_add: self.expansion_add,
            expansion_search: self.expansion_search,
            multi: false, // Single vector per key
        }
    }

    /// Create an empty usearch index with room for `capacity` vectors.
    pub(crate) fn new_index(&self, dimension: usize, capacity: usize) -> Result<Index, VectorError> {
        let index =
            Index::new(&self.options(dimension)).map_err(|e| VectorError::Index(e.to_string()))?;
        index
            .reserve(capacity.max(1))
            .map_err(|e| VectorError::Index(e.to_string()))?;
        Ok(index)
    }
}

/// usearch scalar type for a quantization setting.
pub fn scalar_kind(quantization: QuantizationSetting) -> ScalarKind {
    match quantization {
        QuantizationSetting::F32 => ScalarKind::F32,
        QuantizationSetting::F16 => ScalarKind::F16,
        QuantizationSetting::I8 => ScalarKind::I8,
    }
}

/// Whether vectors stored at this precision come back bit-exact.
pub fn supports_reconstruction(quantization: QuantizationSetting) -> bool {
    matches!(quantization, QuantizationSetting::F32)
}
