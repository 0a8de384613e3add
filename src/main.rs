//! # NyaySahayak Main Driver
//!
//! ## Purpose
//! Command line entry point for the legal RAG engine: ingest documents into
//! the persistent index, run retrieval queries, and answer questions.
//!
//! ## Input/Output Specification
//! - **Input**: Configuration file, command line arguments, document files
//! - **Output**: Ingestion reports, ranked retrieval results, structured answers
//!
//! ## Architecture Flow
//! 1. Parse command line arguments and load configuration
//! 2. Initialize logging and tracing
//! 3. Open the persistent index and build the pipeline
//! 4. Dispatch the requested subcommand

use clap::{Arg, Command};
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use nyay_sahayak::{
    config::Config,
    errors::{RagError, Result},
    generation::Generator,
    index::{HashingEmbedder, SledVectorIndex, VectorIndex},
    multilingual::IdentityTranslator,
    pipeline::RagPipeline,
    Document, Language,
};

/// Placeholder generation backend for deployments that have not wired one up.
/// Every call fails, which the answer pipeline resolves to its fallback
/// answer, so `ask` stays usable offline.
struct UnconfiguredGenerator;

#[async_trait::async_trait]
impl Generator for UnconfiguredGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(RagError::GenerationFailed {
            details: "no generation backend configured".to_string(),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("nyay")
        .version("0.1.0")
        .author("NyaySahayak Team")
        .about("Legal document ingestion and retrieval-augmented answering")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("ingest")
                .about("Normalize, segment and index document files")
                .arg(
                    Arg::new("files")
                        .value_name("FILE")
                        .help("Plain-text document files to ingest")
                        .num_args(1..)
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("search")
                .about("Retrieve the most relevant chunks for a query")
                .arg(Arg::new("query").value_name("QUERY").required(true))
                .arg(
                    Arg::new("top-k")
                        .short('k')
                        .long("top-k")
                        .value_name("N")
                        .help("Number of chunks to retrieve")
                        .value_parser(clap::value_parser!(usize)),
                ),
        )
        .subcommand(
            Command::new("ask")
                .about("Answer a legal question over the indexed corpus")
                .arg(Arg::new("query").value_name("QUESTION").required(true))
                .arg(
                    Arg::new("language")
                        .long("language")
                        .value_name("LANG")
                        .help("Query language: en or hi")
                        .default_value("en"),
                ),
        )
        .get_matches();

    // Load configuration, falling back to defaults when no file exists
    let config_path = matches.get_one::<String>("config").unwrap();
    let config = if Path::new(config_path).exists() {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };

    init_logging(&config)?;
    info!("NyaySahayak starting");

    let embedder = Arc::new(HashingEmbedder::default());
    let index = Arc::new(SledVectorIndex::open(&config.index, embedder)?);
    let pipeline = RagPipeline::new(
        &config,
        Arc::clone(&index) as Arc<dyn VectorIndex>,
        Arc::new(UnconfiguredGenerator),
    )?
    .with_translator(Arc::new(IdentityTranslator));

    match matches.subcommand() {
        Some(("ingest", sub)) => {
            let files: Vec<&String> = sub.get_many::<String>("files").unwrap().collect();
            run_ingest(&pipeline, &index, &files).await
        }
        Some(("search", sub)) => {
            let query = sub.get_one::<String>("query").unwrap();
            let k = sub
                .get_one::<usize>("top-k")
                .copied()
                .unwrap_or(config.retrieval.top_k);
            run_search(&index, query, k).await
        }
        Some(("ask", sub)) => {
            let query = sub.get_one::<String>("query").unwrap();
            let language = match sub.get_one::<String>("language").unwrap().as_str() {
                "hi" => Language::Hi,
                _ => Language::En,
            };
            run_ask(&pipeline, query, language).await
        }
        _ => unreachable!("subcommand is required"),
    }
}

/// Initialize logging and tracing
fn init_logging(config: &Config) -> Result<()> {
    let log_level: tracing::Level = config.logging.level.parse().map_err(|_| RagError::Config {
        message: format!("Invalid log level: {}", config.logging.level),
    })?;
    let filter = tracing_subscriber::filter::LevelFilter::from_level(log_level);

    if config.logging.json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .json()
                    .with_filter(filter),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_filter(filter),
            )
            .init();
    }

    Ok(())
}

/// Read, normalize, segment and index the given files.
async fn run_ingest(
    pipeline: &RagPipeline,
    index: &SledVectorIndex,
    files: &[&String],
) -> Result<()> {
    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        let text = std::fs::read_to_string(path)?;
        let filename = Path::new(path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| (*path).clone());
        documents.push(Document::new(text, &filename, "text"));
    }

    let results = pipeline.ingest_documents(documents).await;
    for (path, result) in files.iter().zip(&results) {
        match result {
            Ok(chunks) => println!("{}: {} chunks indexed", path, chunks),
            Err(e) => eprintln!("{}: failed ({})", path, e),
        }
    }
    index.flush()?;

    let stats = pipeline.stats().await;
    info!(
        documents = stats.documents_ingested,
        chunks = stats.chunks_indexed,
        failures = stats.failures,
        "Ingestion complete"
    );

    if results.iter().any(|r| r.is_err()) {
        return Err(RagError::Internal {
            message: "one or more documents failed to ingest".to_string(),
        });
    }
    Ok(())
}

/// Print the top-k retrieval results as JSON.
async fn run_search(index: &SledVectorIndex, query: &str, k: usize) -> Result<()> {
    let results = index.search(query, k).await?;
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

/// Answer a question and print the structured answer as JSON.
async fn run_ask(pipeline: &RagPipeline, query: &str, language: Language) -> Result<()> {
    let answer = pipeline.answer(query, language).await;
    println!("{}", serde_json::to_string_pretty(&answer)?);
    Ok(())
}
