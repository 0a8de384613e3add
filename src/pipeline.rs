//! # Pipeline Orchestration Module
//!
//! ## Purpose
//! Wires normalization, segmentation, retrieval, translation and generation
//! into the two operations callers actually use: ingesting documents and
//! answering questions.
//!
//! ## Input/Output Specification
//! - **Input**: Raw documents for ingestion; user queries with a language tag
//! - **Output**: Indexed chunk counts; complete structured answers
//! - **Guarantee**: `answer` never returns an error. Collaborator failures
//!   (index down, generation erroring, timing out or malformed, translation
//!   failing) are logged under a per-request id and resolve to the fallback
//!   answer. Ingestion errors propagate, a caller must know its corpus
//!   failed to land.
//!
//! ## Answer State Machine
//! Retrieve → Assemble → Generate → Parse → Validate, with every failure edge
//! leading to the fallback state. Translation, when configured and needed,
//! precedes Retrieve and degrades to the untranslated query on failure.

use crate::chunking::LegalChunker;
use crate::config::{Config, GenerationConfig, IngestionConfig, RetrievalConfig};
use crate::errors::{RagError, Result};
use crate::generation::{build_prompt, parse_answer, Generator, StructuredAnswer, DISCLAIMER_TEXT};
use crate::index::VectorIndex;
use crate::multilingual::Translator;
use crate::preprocessing::TextPreprocessor;
use crate::{Document, Language};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore};

/// Running counters over the lifetime of a pipeline instance.
#[derive(Debug, Clone, Default)]
pub struct IngestStats {
    /// Documents successfully normalized, segmented and indexed
    pub documents_ingested: u64,
    /// Total chunks written to the index
    pub chunks_indexed: u64,
    /// Documents that failed to ingest
    pub failures: u64,
}

/// The retrieval-augmented answering pipeline.
///
/// Cheap to share behind an `Arc`; all methods take `&self`.
pub struct RagPipeline {
    preprocessor: TextPreprocessor,
    chunker: LegalChunker,
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn Generator>,
    translator: Option<Arc<dyn Translator>>,
    retrieval: RetrievalConfig,
    generation: GenerationConfig,
    ingestion: IngestionConfig,
    stats: Arc<RwLock<IngestStats>>,
}

impl RagPipeline {
    /// Build a pipeline over the given index and generation backends.
    /// Validates the configuration and compiles the normalizer and chunker.
    pub fn new(
        config: &Config,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            preprocessor: TextPreprocessor::new(config.preprocessing.clone())?,
            chunker: LegalChunker::new(config.chunking.clone())?,
            index,
            generator,
            translator: None,
            retrieval: config.retrieval.clone(),
            generation: config.generation.clone(),
            ingestion: config.ingestion.clone(),
            stats: Arc::new(RwLock::new(IngestStats::default())),
        })
    }

    /// Attach a query translation backend.
    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Snapshot of the ingestion counters.
    pub async fn stats(&self) -> IngestStats {
        self.stats.read().await.clone()
    }

    /// Normalize, segment and index a single document. Returns the number of
    /// chunks written. Errors propagate to the caller.
    pub async fn ingest_document(&self, document: Document) -> Result<usize> {
        let filename = document
            .metadata
            .get(crate::meta::FILENAME)
            .cloned()
            .unwrap_or_else(|| "unknown".to_string());

        let (clean_text, metadata) = self
            .preprocessor
            .preprocess(&document.text, &document.metadata);
        let chunks = self.chunker.segment(&clean_text, &metadata);

        if chunks.is_empty() {
            tracing::warn!(filename = %filename, "Document produced no chunks, skipping");
            let mut stats = self.stats.write().await;
            stats.documents_ingested += 1;
            return Ok(0);
        }

        match self.index.upsert(&chunks).await {
            Ok(()) => {
                let mut stats = self.stats.write().await;
                stats.documents_ingested += 1;
                stats.chunks_indexed += chunks.len() as u64;
                tracing::info!(
                    filename = %filename,
                    chunks = chunks.len(),
                    "Document ingested"
                );
                Ok(chunks.len())
            }
            Err(e) => {
                let mut stats = self.stats.write().await;
                stats.failures += 1;
                tracing::error!(
                    filename = %filename,
                    error = %e,
                    "Failed to index document"
                );
                Err(e)
            }
        }
    }

    /// Ingest a batch of documents with bounded concurrency. Per-document
    /// results come back in input order; one document failing does not abort
    /// the rest.
    pub async fn ingest_documents(&self, documents: Vec<Document>) -> Vec<Result<usize>> {
        let semaphore = Arc::new(Semaphore::new(self.ingestion.max_concurrent_jobs));

        let jobs = documents.into_iter().map(|document| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|e| RagError::Internal {
                        message: format!("ingestion semaphore closed: {}", e),
                    })?;
                self.ingest_document(document).await
            }
        });

        futures::future::join_all(jobs).await
    }

    /// Answer a question over the indexed corpus.
    ///
    /// This is total: whatever fails downstream, the caller receives a
    /// complete `StructuredAnswer`. Failures are logged with the request id.
    pub async fn answer(&self, query: &str, language: Language) -> StructuredAnswer {
        let request_id = uuid::Uuid::new_v4();

        if query.trim().is_empty() {
            tracing::warn!(%request_id, "Empty query, returning fallback answer");
            return StructuredAnswer::fallback();
        }

        tracing::info!(%request_id, %language, query_chars = query.chars().count(), "Answering query");

        let effective_query = self.translate_query(query, language, request_id).await;

        // Retrieve
        let retrieved = match self
            .index
            .search(&effective_query, self.retrieval.top_k)
            .await
        {
            Ok(retrieved) => retrieved,
            Err(e) => {
                tracing::error!(%request_id, error = %e, category = e.category(), "Retrieval failed");
                return StructuredAnswer::fallback();
            }
        };
        if retrieved.is_empty() {
            tracing::info!(%request_id, "No relevant chunks found");
            return StructuredAnswer::fallback();
        }

        // Assemble and generate under the configured deadline
        let prompt = build_prompt(&effective_query, &retrieved);
        let generated = match tokio::time::timeout(
            Duration::from_millis(self.generation.timeout_ms),
            self.generator.generate(&prompt),
        )
        .await
        {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::error!(%request_id, error = %e, "Generation failed");
                return StructuredAnswer::fallback();
            }
            Err(_) => {
                let e = RagError::GenerationTimeout {
                    timeout_ms: self.generation.timeout_ms,
                };
                tracing::error!(%request_id, error = %e, "Generation timed out");
                return StructuredAnswer::fallback();
            }
        };

        // Parse and validate
        let (summary, relevant_law, explanation, next_steps) = match parse_answer(&generated) {
            Ok(fields) => fields,
            Err(e) => {
                tracing::error!(%request_id, error = %e, "Generated answer malformed");
                return StructuredAnswer::fallback();
            }
        };

        let sources: BTreeSet<String> = retrieved
            .iter()
            .map(|r| r.chunk.attribution())
            .collect();

        tracing::info!(%request_id, sources = sources.len(), "Grounded answer produced");

        StructuredAnswer {
            summary,
            relevant_law,
            explanation,
            next_steps,
            disclaimer: DISCLAIMER_TEXT.to_string(),
            sources,
            grounded: true,
        }
    }

    /// Translate a Hindi query into English for retrieval when a translator
    /// is configured. Failure degrades to the untranslated query.
    async fn translate_query(
        &self,
        query: &str,
        language: Language,
        request_id: uuid::Uuid,
    ) -> String {
        if language != Language::Hi {
            return query.to_string();
        }
        let Some(translator) = &self.translator else {
            return query.to_string();
        };
        match translator.translate(query, Language::Hi, Language::En).await {
            Ok(translated) => translated,
            Err(e) => {
                tracing::warn!(
                    %request_id,
                    error = %e,
                    "Query translation failed, retrieving with original query"
                );
                query.to_string()
            }
        }
    }
}
