//! # NyaySahayak Core
//!
//! ## Overview
//! This library implements the core of a legal-aid retrieval-augmented answering
//! system: it normalizes heterogeneous legal documents into clean structured text,
//! segments them into retrieval-ready chunks that preserve legal section
//! boundaries, and serves a context-bounded answer pipeline whose output is always
//! a complete, safety-checked structured answer.
//!
//! ## Architecture
//! The system is composed of several key modules:
//! - `preprocessing`: Legal-structure-aware text normalization and language detection
//! - `chunking`: Section-aware segmentation with a size-bounded windowed fallback
//! - `index`: Vector index capability interface with in-memory and sled-backed stores
//! - `generation`: Generation capability interface, prompt assembly, answer parsing
//! - `multilingual`: Query translation capability interface (en ↔ hi)
//! - `pipeline`: Ingestion and answer orchestration
//! - `config`: Configuration management and settings
//! - `errors`: Centralized error handling and types
//!
//! ## Input/Output Specification
//! - **Input**: Raw extracted document text with source metadata, user queries
//! - **Output**: Indexed chunks with structural metadata, structured grounded answers
//! - **Guarantee**: The answer path never fails outward; every recoverable failure
//!   resolves to a complete fallback answer with an explicit disclaimer
//!
//! ## Usage
//! ```rust,no_run
//! use std::sync::Arc;
//! use nyay_sahayak::{Config, Document, Language, RagPipeline};
//! use nyay_sahayak::index::{HashingEmbedder, InMemoryVectorIndex};
//! use nyay_sahayak::generation::Generator;
//!
//! # async fn run(generator: Arc<dyn Generator>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let embedder = Arc::new(HashingEmbedder::default());
//! let index = Arc::new(InMemoryVectorIndex::new(embedder));
//! let pipeline = RagPipeline::new(&config, index, generator)?;
//!
//! pipeline.ingest_document(Document::new("Section 106 ...", "tpa.txt", "text")).await?;
//! let answer = pipeline.answer("How much notice must a landlord give?", Language::En).await;
//! println!("{}", answer.summary);
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod chunking;
pub mod config;
pub mod errors;
pub mod generation;
pub mod index;
pub mod multilingual;
pub mod pipeline;
pub mod preprocessing;

// Re-exports for convenience
pub use config::Config;
pub use errors::{RagError, Result};
pub use generation::StructuredAnswer;
pub use pipeline::RagPipeline;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Document-level metadata carried from loader to chunk.
///
/// Keys are free-form; the normalizer adds `language`, `text_length`,
/// `word_count`, `preprocessed` and `boilerplate_removed` without removing any
/// pre-existing entries.
pub type Metadata = HashMap<String, String>;

/// Well-known metadata keys used across the pipeline.
pub mod meta {
    pub const FILENAME: &str = "filename";
    pub const SOURCE_TYPE: &str = "source_type";
    pub const LANGUAGE: &str = "language";
    pub const TEXT_LENGTH: &str = "text_length";
    pub const WORD_COUNT: &str = "word_count";
    pub const PREPROCESSED: &str = "preprocessed";
    pub const BOILERPLATE_REMOVED: &str = "boilerplate_removed";
}

/// Languages the system recognizes. Anything else resolves to English.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Hi,
}

impl Language {
    /// ISO 639-1 code for this language.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Hi => "hi",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw document handed over by an external loader. Consumed once by the
/// normalizer and not retained afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Raw extracted text
    pub text: String,
    /// Source metadata (filename, source type, loader-specific keys)
    pub metadata: Metadata,
}

impl Document {
    /// Create a document from raw text and the two standard metadata keys.
    pub fn new(text: impl Into<String>, filename: &str, source_type: &str) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(meta::FILENAME.to_string(), filename.to_string());
        metadata.insert(meta::SOURCE_TYPE.to_string(), source_type.to_string());
        Self {
            text: text.into(),
            metadata,
        }
    }
}

/// A unit offered to the retrieval index.
///
/// `text` always carries the section title so a chunk is self-describing out of
/// context. `chunk_index` is the zero-based position within the section's
/// windowed subdivision (always 0 when `is_full_section` is true).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk text, prefixed or led by the section title
    pub text: String,
    /// Title of the section this chunk belongs to (e.g. "SECTION 106")
    pub section_title: String,
    /// Zero-based position within the section's subdivision
    pub chunk_index: usize,
    /// Whether this chunk covers its entire section
    pub is_full_section: bool,
    /// Document-level metadata inherited unchanged
    pub metadata: Metadata,
}

impl Chunk {
    /// Deterministic identity used for idempotent upserts: re-ingesting the same
    /// document overwrites its chunks instead of duplicating them.
    pub fn identity(&self) -> String {
        let source = self
            .metadata
            .get(meta::FILENAME)
            .map(String::as_str)
            .unwrap_or("unknown");
        format!("{}:{}:{}", source, self.section_title, self.chunk_index)
    }

    /// Source attribution string used in prompts and answer sources.
    pub fn attribution(&self) -> String {
        let source = self
            .metadata
            .get(meta::FILENAME)
            .map(String::as_str)
            .unwrap_or("unknown");
        format!("{} ({})", self.section_title, source)
    }
}

/// A chunk scored against a query at retrieval time. Ephemeral, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// The stored chunk
    pub chunk: Chunk,
    /// Similarity score, higher is more relevant
    pub relevance_score: f32,
}
