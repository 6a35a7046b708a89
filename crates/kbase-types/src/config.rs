//! Configuration loading for kbase.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/kbase/config.toml.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::KbaseError;

/// Wire format spoken by the embedding endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingApi {
    /// `POST {base_url}/api/embeddings` with `{model, prompt}`
    #[default]
    Ollama,
    /// `POST {base_url}/embeddings` with `{model, input}`
    Openai,
}

/// Remote embedding service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Wire format
    #[serde(default)]
    pub provider: EmbeddingApi,

    /// Endpoint base URL
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,

    /// Model name sent with every request
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Bearer token (loaded from env var, not stored in config file)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-call timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum simultaneous embedding calls
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Retries on rate limiting (HTTP 429/503) only
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_embedding_base_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_concurrency() -> usize {
    5
}

fn default_max_retries() -> u32 {
    2
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingApi::default(),
            base_url: default_embedding_base_url(),
            model: default_embedding_model(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            concurrency: default_concurrency(),
            max_retries: default_max_retries(),
        }
    }
}

/// Indexing controller settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingSettings {
    /// Records per resume batch (one index persist per batch)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Pause between resume batches in milliseconds
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,

    /// Language tag stamped when the caller supplies none
    #[serde(default = "default_language")]
    pub default_language: String,
}

fn default_batch_size() -> usize {
    50
}

fn default_batch_delay_ms() -> u64 {
    500
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for IndexingSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            default_language: default_language(),
        }
    }
}

/// Scalar type used to store vectors in the ANN index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuantizationSetting {
    #[default]
    F32,
    F16,
    I8,
}

/// HNSW parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorSettings {
    /// Connections per layer (M)
    #[serde(default = "default_connectivity")]
    pub connectivity: usize,

    /// Build-time search depth (ef_construction)
    #[serde(default = "default_expansion_add")]
    pub expansion_add: usize,

    /// Query-time search depth (ef_search)
    #[serde(default = "default_expansion_search")]
    pub expansion_search: usize,

    /// Storage precision; only f32 supports exact reconstruction
    #[serde(default)]
    pub quantization: QuantizationSetting,
}

fn default_connectivity() -> usize {
    16
}

fn default_expansion_add() -> usize {
    200
}

fn default_expansion_search() -> usize {
    100
}

impl Default for VectorSettings {
    fn default() -> Self {
        Self {
            connectivity: default_connectivity(),
            expansion_add: default_expansion_add(),
            expansion_search: default_expansion_search(),
            quantization: QuantizationSetting::default(),
        }
    }
}

/// Query-time settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Default number of semantic hits
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    4
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

/// Text chunking settings used by the CLI front-end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingSettings {
    /// Paragraphs are packed into chunks up to this many characters
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
}

fn default_max_chars() -> usize {
    1000
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Root directory holding one subdirectory per knowledge base
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub embedding: EmbeddingSettings,

    #[serde(default)]
    pub indexing: IndexingSettings,

    #[serde(default)]
    pub vector: VectorSettings,

    #[serde(default)]
    pub retrieval: RetrievalSettings,

    #[serde(default)]
    pub chunking: ChunkingSettings,
}

fn default_data_dir() -> String {
    ProjectDirs::from("", "", "kbase")
        .map(|p| p.data_local_dir().join("knowledge-bases"))
        .unwrap_or_else(|| PathBuf::from("./knowledge-bases"))
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            embedding: EmbeddingSettings::default(),
            indexing: IndexingSettings::default(),
            vector: VectorSettings::default(),
            retrieval: RetrievalSettings::default(),
            chunking: ChunkingSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/kbase/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (KBASE_*, `__` between nested keys)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, KbaseError> {
        let config_dir = ProjectDirs::from("", "", "kbase")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("data_dir", default_data_dir())
            .map_err(|e| KbaseError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| KbaseError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: KBASE_DATA_DIR, KBASE_EMBEDDING__BASE_URL, KBASE_INDEXING__BATCH_SIZE, ...
        builder = builder.add_source(
            Environment::with_prefix("KBASE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| KbaseError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| KbaseError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values that would stall or break indexing.
    pub fn validate(&self) -> Result<(), KbaseError> {
        if self.embedding.concurrency == 0 {
            return Err(KbaseError::Config(
                "embedding.concurrency must be > 0".to_string(),
            ));
        }
        if self.embedding.timeout_secs == 0 {
            return Err(KbaseError::Config(
                "embedding.timeout_secs must be > 0".to_string(),
            ));
        }
        if self.indexing.batch_size == 0 {
            return Err(KbaseError::Config(
                "indexing.batch_size must be > 0".to_string(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(KbaseError::Config("retrieval.top_k must be > 0".to_string()));
        }
        if self.chunking.max_chars == 0 {
            return Err(KbaseError::Config(
                "chunking.max_chars must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Expand ~ in data_dir to the home directory
    pub fn expanded_data_dir(&self) -> PathBuf {
        if let Some(rest) = self.data_dir.strip_prefix("~/") {
            if let Some(home) = directories::BaseDirs::new().map(|b| b.home_dir().to_path_buf()) {
                return home.join(rest);
            }
        }
        PathBuf::from(&self.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.embedding.provider, EmbeddingApi::Ollama);
        assert_eq!(settings.embedding.timeout_secs, 30);
        assert_eq!(settings.embedding.concurrency, 5);
        assert_eq!(settings.indexing.default_language, "en");
        assert_eq!(settings.vector.quantization, QuantizationSetting::F32);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
data_dir = "/tmp/kbase-test"

[embedding]
provider = "openai"
model = "text-embedding-3-small"
concurrency = 3

[indexing]
batch_size = 10
"#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(settings.data_dir, "/tmp/kbase-test");
        assert_eq!(settings.embedding.provider, EmbeddingApi::Openai);
        assert_eq!(settings.embedding.model, "text-embedding-3-small");
        assert_eq!(settings.embedding.concurrency, 3);
        // Untouched nested keys keep their defaults
        assert_eq!(settings.embedding.timeout_secs, 30);
        assert_eq!(settings.indexing.batch_size, 10);
        assert_eq!(settings.indexing.batch_delay_ms, 500);
    }

    #[test]
    fn test_validation() {
        let mut settings = Settings::default();
        settings.embedding.concurrency = 0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.indexing.batch_size = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_expanded_data_dir_plain() {
        let settings = Settings {
            data_dir: "/var/lib/kbase".to_string(),
            ..Default::default()
        };
        assert_eq!(settings.expanded_data_dir(), PathBuf::from("/var/lib/kbase"));
    }

    #[test]
    fn test_settings_serialization() {
        let settings = Settings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let decoded: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.retrieval.top_k, 4);
        assert_eq!(decoded.chunking.max_chars, 1000);
    }
}
