//! Query-time search over loaded knowledge bases.
//!
//! Semantic search embeds the query once and looks it up in the merged
//! index. When there are no vectors, or the query cannot be embedded,
//! search falls back to keyword matching over the combined records.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use kbase_embeddings::{EmbeddingModel, EmbeddingProvider};
use kbase_types::{Record, KB_KEY};

use crate::error::RetrievalError;
use crate::loader::LoadedKnowledge;

/// Default number of hits per query.
pub const DEFAULT_TOP_K: usize = 4;

/// Terms shorter than this are ignored by keyword fallback.
const MIN_TERM_LEN: usize = 3;

/// How a result set was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    Semantic,
    Keyword,
}

/// A single search result item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalHit {
    /// Relevance score; cosine similarity for semantic hits, fraction of
    /// query terms matched for keyword hits
    pub score: f32,

    /// Chunk text
    pub content: String,

    /// Record metadata, including the knowledge base name
    pub metadata: BTreeMap<String, String>,

    /// Knowledge base the chunk came from
    pub kb: Option<String>,
}

impl RetrievalHit {
    fn from_record(record: Record, score: f32) -> Self {
        let kb = record.metadata.get(KB_KEY).cloned();
        Self {
            score,
            content: record.content,
            metadata: record.metadata,
            kb,
        }
    }
}

/// Final retrieval result with explainability.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub hits: Vec<RetrievalHit>,
    pub mode: RetrievalMode,
    /// Why semantic search was not used, when it was not
    pub fallback_reason: Option<String>,
}

/// Searches [`LoadedKnowledge`] with a shared embedding provider.
pub struct Retriever<M: EmbeddingModel> {
    provider: Arc<EmbeddingProvider<M>>,
}

impl<M: EmbeddingModel> Retriever<M> {
    pub fn new(provider: Arc<EmbeddingProvider<M>>) -> Self {
        Self { provider }
    }

    /// Semantic search, falling back to keywords.
    pub async fn search(
        &self,
        knowledge: &LoadedKnowledge,
        query: &str,
        top_k: usize,
    ) -> Result<RetrievalResult, RetrievalError> {
        if knowledge.vector_count() == 0 {
            debug!("No vectors loaded, using keyword search");
            return Ok(keyword_result(
                knowledge,
                query,
                top_k,
                "no vectors loaded".to_string(),
            ));
        }

        match self.semantic_search(knowledge, query, top_k).await {
            Ok(hits) => Ok(RetrievalResult {
                hits,
                mode: RetrievalMode::Semantic,
                fallback_reason: None,
            }),
            Err(RetrievalError::Embedding(e)) => {
                warn!(error = %e, "Query embedding failed, using keyword search");
                Ok(keyword_result(
                    knowledge,
                    query,
                    top_k,
                    format!("query embedding failed: {}", e),
                ))
            }
            Err(e) => Err(e),
        }
    }

    /// Embed the query once and look it up in the merged index.
    pub async fn semantic_search(
        &self,
        knowledge: &LoadedKnowledge,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievalHit>, RetrievalError> {
        let Some(index) = knowledge.index.as_ref() else {
            return Ok(Vec::new());
        };
        if query.trim().is_empty() {
            return Err(RetrievalError::InvalidInput("empty query".to_string()));
        }

        let embedding = self.provider.embed_query(query).await?;
        let hits = index
            .search(&embedding, top_k)?
            .into_iter()
            .map(|hit| RetrievalHit::from_record(hit.record, hit.score))
            .collect::<Vec<_>>();

        debug!(top_k, found = hits.len(), "Semantic search complete");
        Ok(hits)
    }
}

fn keyword_result(
    knowledge: &LoadedKnowledge,
    query: &str,
    top_k: usize,
    reason: String,
) -> RetrievalResult {
    RetrievalResult {
        hits: keyword_search(&knowledge.records, query, top_k),
        mode: RetrievalMode::Keyword,
        fallback_reason: Some(reason),
    }
}

/// Rank records by the fraction of query terms their content contains.
///
/// Ties keep record order. Records matching no term are dropped.
pub fn keyword_search(records: &[Record], query: &str, top_k: usize) -> Vec<RetrievalHit> {
    let mut terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TERM_LEN)
        .map(str::to_lowercase)
        .collect();
    terms.sort();
    terms.dedup();

    if terms.is_empty() {
        let whole = query.trim().to_lowercase();
        if whole.is_empty() {
            return Vec::new();
        }
        terms.push(whole);
    }

    let mut scored: Vec<(f32, &Record)> = records
        .iter()
        .filter_map(|record| {
            let content = record.content.to_lowercase();
            let matched = terms.iter().filter(|t| content.contains(t.as_str())).count();
            (matched > 0).then(|| (matched as f32 / terms.len() as f32, record))
        })
        .collect();

    // Stable sort keeps log order among equal scores
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));

    scored
        .into_iter()
        .take(top_k)
        .map(|(score, record)| RetrievalHit::from_record(record.clone(), score))
        .collect()
}
