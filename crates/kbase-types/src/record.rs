//! Record type: the atomic unit stored in a knowledge base.
//!
//! A record's identity is positional. Its index in the document log is its
//! canonical ID, and the same index is used as its vector position when no
//! embedding failures occurred.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metadata key stamped with the ingestion language.
pub const LANGUAGE_KEY: &str = "language";

/// Metadata key conventionally holding the originating file or URL.
pub const SOURCE_KEY: &str = "source";

/// Metadata key stamped on retrieval results with the originating knowledge base.
pub const KB_KEY: &str = "kb";

/// A chunk of text plus string metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// The chunk text
    pub content: String,

    /// Free-form metadata (source, page, language, ...)
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Record {
    /// Create a record with empty metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Add a metadata entry (builder pattern).
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Stamp the language tag into metadata, replacing any previous tag.
    pub fn with_language(mut self, language: &str) -> Self {
        self.metadata
            .insert(LANGUAGE_KEY.to_string(), language.to_string());
        self
    }

    /// Language tag, if stamped.
    pub fn language(&self) -> Option<&str> {
        self.metadata.get(LANGUAGE_KEY).map(String::as_str)
    }

    /// Case-insensitive substring match against the content.
    ///
    /// `needle_lower` must already be lowercased.
    pub fn contains_lowercase(&self, needle_lower: &str) -> bool {
        self.content.to_lowercase().contains(needle_lower)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder() {
        let record = Record::new("hello")
            .with_metadata(SOURCE_KEY, "notes.txt")
            .with_language("de");

        assert_eq!(record.content, "hello");
        assert_eq!(record.metadata.get(SOURCE_KEY).unwrap(), "notes.txt");
        assert_eq!(record.language(), Some("de"));
    }

    #[test]
    fn test_language_overwrites() {
        let record = Record::new("x").with_language("en").with_language("fr");
        assert_eq!(record.language(), Some("fr"));
        assert_eq!(record.metadata.len(), 1);
    }

    #[test]
    fn test_contains_lowercase() {
        let record = Record::new("The Borrow Checker");
        assert!(record.contains_lowercase("borrow"));
        assert!(!record.contains_lowercase("garbage"));
    }

    #[test]
    fn test_missing_metadata_deserializes() {
        let record: Record = serde_json::from_str(r#"{"content":"bare"}"#).unwrap();
        assert_eq!(record.content, "bare");
        assert!(record.metadata.is_empty());
    }
}
