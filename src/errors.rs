//! # Error Handling Module
//!
//! ## Purpose
//! Centralized error handling for the legal RAG engine, providing structured
//! error types and conversion utilities for all system components.
//!
//! ## Input/Output Specification
//! - **Input**: Error conditions from normalization, segmentation, indexing,
//!   generation and configuration
//! - **Output**: Structured error types with context
//! - **Error Categories**: Configuration, Usage, Index, Generation, Storage
//!
//! ## Error Policy
//! Input-malformation conditions (empty text, missing section markers) are never
//! errors; components recover with documented defaults. Collaborator failures
//! (index unreachable, generation erroring or timing out) and contract violations
//! (generated text missing a required field) route the answer pipeline to its
//! fallback state and never escape `RagPipeline::answer`. The only errors that
//! propagate to callers are programmer errors in interface usage, which fail
//! fast.

use thiserror::Error;

/// Result type used throughout the application
pub type Result<T> = std::result::Result<T, RagError>;

/// Error types for the legal RAG engine
#[derive(Debug, Error)]
pub enum RagError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Programmer error in interface usage; always fails fast
    #[error("Invalid argument '{field}': {reason}")]
    InvalidArgument { field: String, reason: String },

    /// Retrieval index unreachable or failing
    #[error("Index unavailable: {details}")]
    IndexUnavailable { details: String },

    /// Generation capability errored
    #[error("Generation failed: {details}")]
    GenerationFailed { details: String },

    /// Generation capability exceeded the caller-supplied timeout
    #[error("Generation timed out after {timeout_ms}ms")]
    GenerationTimeout { timeout_ms: u64 },

    /// Generated text is missing a required structured field
    #[error("Generated answer missing required field '{missing_field}'")]
    MalformedGeneration { missing_field: String },

    /// Translation capability errored
    #[error("Translation failed: {details}")]
    TranslationFailed { details: String },

    /// Serialization/deserialization errors
    #[error("Serialization failed: {message}")]
    SerializationFailed { message: String },

    /// Embedded database errors
    #[error("Storage error: {details}")]
    Storage { details: String },

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal system errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl RagError {
    /// Whether the answer pipeline absorbs this error into its fallback state
    /// instead of propagating it.
    pub fn routes_to_fallback(&self) -> bool {
        matches!(
            self,
            RagError::IndexUnavailable { .. }
                | RagError::GenerationFailed { .. }
                | RagError::GenerationTimeout { .. }
                | RagError::MalformedGeneration { .. }
                | RagError::TranslationFailed { .. }
        )
    }

    /// Get error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            RagError::Config { .. } => "configuration",
            RagError::InvalidArgument { .. } => "usage",
            RagError::IndexUnavailable { .. } => "index",
            RagError::GenerationFailed { .. }
            | RagError::GenerationTimeout { .. }
            | RagError::MalformedGeneration { .. } => "generation",
            RagError::TranslationFailed { .. } => "multilingual",
            RagError::SerializationFailed { .. } | RagError::Storage { .. } => "storage",
            RagError::Io(_) | RagError::Internal { .. } => "system",
        }
    }
}

// Conversion from common error types
impl From<serde_json::Error> for RagError {
    fn from(err: serde_json::Error) -> Self {
        RagError::SerializationFailed {
            message: format!("JSON serialization error: {}", err),
        }
    }
}

impl From<bincode::Error> for RagError {
    fn from(err: bincode::Error) -> Self {
        RagError::SerializationFailed {
            message: format!("Binary serialization error: {}", err),
        }
    }
}

impl From<sled::Error> for RagError {
    fn from(err: sled::Error) -> Self {
        RagError::Storage {
            details: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for RagError {
    fn from(err: toml::de::Error) -> Self {
        RagError::Config {
            message: format!("TOML parse error: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_routing() {
        let err = RagError::GenerationTimeout { timeout_ms: 30_000 };
        assert!(err.routes_to_fallback());

        let err = RagError::InvalidArgument {
            field: "k".to_string(),
            reason: "must be at least 1".to_string(),
        };
        assert!(!err.routes_to_fallback());
    }

    #[test]
    fn test_categories() {
        assert_eq!(
            RagError::IndexUnavailable {
                details: "down".to_string()
            }
            .category(),
            "index"
        );
        assert_eq!(
            RagError::MalformedGeneration {
                missing_field: "SUMMARY:".to_string()
            }
            .category(),
            "generation"
        );
    }
}
