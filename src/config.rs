//! # Configuration Management Module
//!
//! ## Purpose
//! Centralized configuration for the legal RAG engine: TOML-backed, hierarchical,
//! with defaults and validation for every component.
//!
//! ## Input/Output Specification
//! - **Input**: Configuration files (TOML)
//! - **Output**: Validated configuration structs with defaults
//! - **Validation**: Range checks that fail fast on programmer errors
//!
//! ## Usage
//! ```rust,no_run
//! use nyay_sahayak::config::Config;
//!
//! let config = Config::from_file("config.toml").unwrap();
//! println!("chunk size: {}", config.chunking.chunk_size);
//! ```

use crate::errors::{RagError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure containing all system settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Text normalization settings
    pub preprocessing: PreprocessConfig,
    /// Section segmentation settings
    pub chunking: ChunkingConfig,
    /// Retrieval behavior
    pub retrieval: RetrievalConfig,
    /// Generation behavior
    pub generation: GenerationConfig,
    /// Persistent index settings
    pub index: IndexConfig,
    /// Batch ingestion settings
    pub ingestion: IngestionConfig,
    /// Logging and monitoring
    pub logging: LoggingConfig,
}

/// Text normalization configuration.
///
/// Boilerplate removal is an explicit opt-in; the aggressive variant strips a
/// broader pattern set at the risk of removing borderline legal content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Strip recognized copyright/disclaimer boilerplate lines
    pub remove_boilerplate: bool,
    /// Additionally strip the broader aggressive pattern set
    pub aggressive: bool,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            remove_boilerplate: false,
            aggressive: false,
        }
    }
}

/// Section segmentation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive fallback windows
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per query
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

/// Generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Timeout applied to a single generation call, in milliseconds
    pub timeout_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

/// Persistent index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Path of the embedded database directory
    pub db_path: PathBuf,
    /// Gzip-compress stored chunk records
    pub enable_compression: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("data/index"),
            enable_compression: true,
        }
    }
}

/// Batch ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Maximum documents normalized and segmented concurrently
    pub max_concurrent_jobs: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: num_cpus::get(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Emit JSON-formatted log lines
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self> {
        Self::from_file("config.toml")
    }

    /// Load and validate configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| RagError::Config {
            message: format!(
                "Failed to read config file {:?}: {}",
                path.as_ref(),
                e
            ),
        })?;

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration as pretty TOML.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| RagError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate cross-field constraints. Violations are programmer errors and
    /// fail fast.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(RagError::InvalidArgument {
                field: "chunking.chunk_size".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(RagError::InvalidArgument {
                field: "chunking.chunk_overlap".to_string(),
                reason: format!(
                    "must be smaller than chunk_size ({} >= {})",
                    self.chunking.chunk_overlap, self.chunking.chunk_size
                ),
            });
        }
        if self.retrieval.top_k == 0 {
            return Err(RagError::InvalidArgument {
                field: "retrieval.top_k".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.generation.timeout_ms == 0 {
            return Err(RagError::InvalidArgument {
                field: "generation.timeout_ms".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.ingestion.max_concurrent_jobs == 0 {
            return Err(RagError::InvalidArgument {
                field: "ingestion.max_concurrent_jobs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.retrieval.top_k, 5);
        assert!(!config.preprocessing.remove_boilerplate);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk_size() {
        let mut config = Config::default();
        config.chunking.chunk_overlap = config.chunking.chunk_size;
        assert!(matches!(
            config.validate(),
            Err(RagError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let mut config = Config::default();
        config.retrieval.top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [chunking]
            chunk_size = 700
            "#,
        )
        .unwrap();
        assert_eq!(config.chunking.chunk_size, 700);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.logging.level, "info");
    }
}
