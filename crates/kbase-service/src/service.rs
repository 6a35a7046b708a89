//! Knowledge base engine facade.
//!
//! Composes the document log, indexing controller, health checker and
//! retriever behind the operations front-ends call.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use kbase_embeddings::{
    EmbeddingModel, EmbeddingProvider, HttpEmbedder, HttpEmbedderConfig, ProviderConfig,
};
use kbase_indexing::{
    ControllerConfig, HealthChecker, IndexingController, ResumeProgress, SaveOutcome,
};
use kbase_retrieval::{load_kbs, LoadedKnowledge, RetrievalResult, Retriever, DEFAULT_TOP_K};
use kbase_storage::{DocumentLog, KbLayout};
use kbase_types::{HealthReport, ProgressCallback, Record, Settings};
use kbase_vector::{HnswConfig, VectorError, VectorStore};

use crate::error::ServiceError;

/// Tunables for a [`KnowledgeBaseService`].
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    pub provider: ProviderConfig,
    pub hnsw: HnswConfig,
    pub controller: ControllerConfig,
    pub top_k: usize,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            hnsw: HnswConfig::default(),
            controller: ControllerConfig::default(),
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl ServiceOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            provider: ProviderConfig::from_settings(&settings.embedding),
            hnsw: HnswConfig::from_settings(&settings.vector),
            controller: ControllerConfig::from_settings(&settings.indexing),
            top_k: settings.retrieval.top_k,
        }
    }
}

/// A keyword match within one knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkMatch {
    /// Position in the document log
    pub position: usize,
    pub record: Record,
}

/// A stored vector and the text it was embedded from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkVector {
    /// Position in the vector index
    pub position: usize,
    pub values: Vec<f32>,
    pub content: String,
}

/// Public engine operations over every knowledge base under one root.
pub struct KnowledgeBaseService<M: EmbeddingModel> {
    log: DocumentLog,
    controller: IndexingController<M>,
    health: HealthChecker,
    retriever: Retriever<M>,
    hnsw: HnswConfig,
    top_k: usize,
}

impl KnowledgeBaseService<HttpEmbedder> {
    /// Build a service talking to the configured HTTP embedding endpoint.
    pub fn from_settings(settings: &Settings) -> Result<Self, ServiceError> {
        settings.validate()?;
        let embedder = HttpEmbedder::new(HttpEmbedderConfig::from_settings(&settings.embedding))?;
        let layout = KbLayout::new(settings.expanded_data_dir());

        info!(
            data_dir = %layout.root().display(),
            model = %settings.embedding.model,
            "Opening knowledge base service"
        );

        Ok(Self::new(
            layout,
            Arc::new(embedder),
            ServiceOptions::from_settings(settings),
        ))
    }
}

impl<M: EmbeddingModel> KnowledgeBaseService<M> {
    pub fn new(layout: KbLayout, model: Arc<M>, options: ServiceOptions) -> Self {
        let provider = Arc::new(EmbeddingProvider::new(model, options.provider));
        let log = DocumentLog::new(layout.clone());

        Self {
            controller: IndexingController::new(
                layout,
                provider.clone(),
                options.hnsw.clone(),
                options.controller,
            ),
            health: HealthChecker::new(log.clone(), options.hnsw.clone()),
            retriever: Retriever::new(provider),
            log,
            hnsw: options.hnsw,
            top_k: options.top_k,
        }
    }

    /// Names of all knowledge bases, sorted.
    pub fn list_kbs(&self) -> Result<Vec<String>, ServiceError> {
        Ok(self.log.layout().list()?)
    }

    /// Append records to a knowledge base, creating it if needed, and embed
    /// them.
    pub async fn save_kb(
        &self,
        name: &str,
        records: Vec<Record>,
        language: Option<&str>,
        progress: &dyn ProgressCallback,
    ) -> Result<SaveOutcome, ServiceError> {
        Ok(self
            .controller
            .save_kb(name, records, language, progress)
            .await?)
    }

    /// Embed log entries that have no vector yet. Returns `(current, total)`.
    pub async fn resume_kb_embedding(
        &self,
        name: &str,
        batch_size: Option<usize>,
        progress: &dyn ProgressCallback,
    ) -> Result<ResumeProgress, ServiceError> {
        Ok(self
            .controller
            .resume_kb_embedding(name, batch_size, progress)
            .await?)
    }

    /// Health report comparing the two stores.
    pub fn get_kb_details(&self, name: &str) -> Result<HealthReport, ServiceError> {
        Ok(self.health.classify(name)?)
    }

    /// Case-insensitive keyword search within one knowledge base.
    pub fn search_kb_chunks(
        &self,
        name: &str,
        keyword: &str,
        limit: usize,
    ) -> Result<Vec<ChunkMatch>, ServiceError> {
        let matches = self
            .log
            .search(name, keyword, limit)?
            .into_iter()
            .map(|(position, record)| ChunkMatch { position, record })
            .collect::<Vec<_>>();
        debug!(kb = %name, keyword, found = matches.len(), "Keyword search");
        Ok(matches)
    }

    /// The stored vector at `position` of a knowledge base's index.
    pub fn get_chunk_vector(&self, name: &str, position: usize) -> Result<ChunkVector, ServiceError> {
        let paths = self.log.layout().paths(name)?;
        let store = match VectorStore::load(&paths, &self.hnsw) {
            Ok(store) => store,
            Err(VectorError::Missing(_)) => {
                return Err(ServiceError::NotFound(format!(
                    "knowledge base '{}' has no vector index",
                    name
                )))
            }
            Err(e) => return Err(e.into()),
        };

        let values = store.reconstruct(position)?;
        let content = store
            .entry(position)
            .map(|record| record.content.clone())
            .unwrap_or_default();

        Ok(ChunkVector {
            position,
            values,
            content,
        })
    }

    /// Delete a knowledge base wholesale. Returns whether it existed.
    pub async fn delete_kb(&self, name: &str) -> Result<bool, ServiceError> {
        Ok(self.controller.delete_kb(name).await?)
    }

    /// Load several knowledge bases as one corpus.
    pub fn load_kbs(&self, names: &[String]) -> Result<LoadedKnowledge, ServiceError> {
        Ok(load_kbs(&self.log, names, &self.hnsw)?)
    }

    /// Answer a query over several knowledge bases.
    ///
    /// The query is embedded once and searched against the merged index.
    pub async fn query(
        &self,
        names: &[String],
        question: &str,
        top_k: Option<usize>,
    ) -> Result<RetrievalResult, ServiceError> {
        let knowledge = self.load_kbs(names)?;
        self.search_loaded(&knowledge, question, top_k).await
    }

    /// Search already loaded knowledge, reusing the merged index.
    pub async fn search_loaded(
        &self,
        knowledge: &LoadedKnowledge,
        question: &str,
        top_k: Option<usize>,
    ) -> Result<RetrievalResult, ServiceError> {
        let top_k = top_k.unwrap_or(self.top_k);
        Ok(self.retriever.search(knowledge, question, top_k).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbase_embeddings::MockEmbedder;
    use kbase_retrieval::RetrievalMode;
    use kbase_types::{HealthStatus, NoOpProgress, QuantizationSetting};
    use std::time::Duration;
    use tempfile::TempDir;

    fn service(temp: &TempDir, options: ServiceOptions) -> KnowledgeBaseService<MockEmbedder> {
        KnowledgeBaseService::new(
            KbLayout::new(temp.path()),
            Arc::new(MockEmbedder::new(16)),
            options,
        )
    }

    fn options() -> ServiceOptions {
        let mut options = ServiceOptions::default();
        options.controller = options.controller.with_batch_delay(Duration::ZERO);
        options
    }

    fn records(texts: &[&str]) -> Vec<Record> {
        texts.iter().map(|t| Record::new(*t)).collect()
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, options());
        assert!(service.list_kbs().unwrap().is_empty());

        service
            .save_kb("notes", records(&["alpha", "beta", "gamma"]), None, &NoOpProgress)
            .await
            .unwrap();
        assert_eq!(service.list_kbs().unwrap(), vec!["notes".to_string()]);

        let report = service.get_kb_details("notes").unwrap();
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.doc_count, 3);

        let matches = service.search_kb_chunks("notes", "BET", 10).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].position, 1);

        let vector = service.get_chunk_vector("notes", 2).unwrap();
        assert_eq!(vector.content, "gamma");
        assert_eq!(vector.values.len(), 16);

        assert!(service.delete_kb("notes").await.unwrap());
        assert!(service.list_kbs().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chunk_vector_errors() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, options());
        assert!(matches!(
            service.get_chunk_vector("notes", 0),
            Err(ServiceError::NotFound(_))
        ));

        service
            .save_kb("notes", records(&["a"]), None, &NoOpProgress)
            .await
            .unwrap();
        assert!(matches!(
            service.get_chunk_vector("notes", 5),
            Err(ServiceError::Vector(VectorError::OutOfRange { .. }))
        ));
    }

    #[tokio::test]
    async fn test_quantized_vector_is_unsupported() {
        let temp = TempDir::new().unwrap();
        let mut options = options();
        options.hnsw = options.hnsw.with_quantization(QuantizationSetting::F16);
        let service = service(&temp, options);

        service
            .save_kb("notes", records(&["a", "b"]), None, &NoOpProgress)
            .await
            .unwrap();
        assert!(matches!(
            service.get_chunk_vector("notes", 0),
            Err(ServiceError::Vector(VectorError::ReconstructUnsupported(_)))
        ));
    }

    #[tokio::test]
    async fn test_query_semantic() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, options());
        service
            .save_kb("a", records(&["red apples", "green pears"]), None, &NoOpProgress)
            .await
            .unwrap();
        service
            .save_kb("b", records(&["blue sky"]), None, &NoOpProgress)
            .await
            .unwrap();

        let result = service
            .query(&["a".to_string(), "b".to_string()], "blue sky", Some(1))
            .await
            .unwrap();
        assert_eq!(result.mode, RetrievalMode::Semantic);
        assert_eq!(result.hits.len(), 1);
        assert_eq!(result.hits[0].kb.as_deref(), Some("b"));
    }

    #[test]
    fn test_options_from_settings() {
        let mut settings = Settings::default();
        settings.retrieval.top_k = 9;
        settings.indexing.batch_size = 7;
        let options = ServiceOptions::from_settings(&settings);
        assert_eq!(options.top_k, 9);
        assert_eq!(options.controller.batch_size, 7);
    }

    #[test]
    fn test_chunk_vector_json() {
        let vector = ChunkVector {
            position: 1,
            values: vec![0.5],
            content: "x".to_string(),
        };
        let json = serde_json::to_value(&vector).unwrap();
        assert_eq!(json["position"], 1);
        assert_eq!(json["content"], "x");
    }
}
