//! Command implementations for the quarry CLI.

use std::fs;
use std::io::Read;
use std::sync::Arc;

use anyhow::Context as _;

use crate::chunk::{ChunkerConfig, Segment};
use crate::cli::args::*;
use crate::context::AssemblerConfig;
use crate::engine::{EngineConfig, RetrievalEngine};
use crate::provider::HashingEmbedder;
use crate::storage::{FileStorage, StorageConfig};
use crate::types::{IngestRequest, IngestSource, SearchRequest};

/// Execute a CLI command.
pub async fn execute_command(args: QuarryArgs) -> anyhow::Result<()> {
    match &args.command {
        Command::Ingest(ingest_args) => ingest(ingest_args.clone(), &args).await,
        Command::Search(search_args) => search(search_args.clone(), &args).await,
        Command::Context(context_args) => context(context_args.clone(), &args).await,
        Command::List(list_args) => list(list_args.clone(), &args).await,
    }
}

/// Open an engine over the data directory with the built-in hashing
/// embedder.
fn open_engine(args: &QuarryArgs, dimension: usize, config: EngineConfig) -> anyhow::Result<RetrievalEngine> {
    let storage = FileStorage::new(&args.data_dir, StorageConfig::default())
        .with_context(|| format!("failed to open data directory {}", args.data_dir.display()))?;
    let embedder = HashingEmbedder::new(dimension).context("invalid embedder dimension")?;
    RetrievalEngine::new(Arc::new(storage), Arc::new(embedder), config)
        .context("failed to initialize the engine")
}

/// Build a collection from a file or stdin.
async fn ingest(args: IngestArgs, cli_args: &QuarryArgs) -> anyhow::Result<()> {
    let raw = match &args.input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            buffer
        }
    };

    let source = match args.format {
        IngestFormat::Text => IngestSource::Text(raw),
        IngestFormat::Segments => {
            let segments: Vec<Segment> =
                serde_json::from_str(&raw).context("failed to parse segments JSON")?;
            IngestSource::Segments(segments)
        }
    };

    let config = EngineConfig {
        chunker: ChunkerConfig {
            chunk_size: args.chunk_size,
            overlap: args.overlap,
            ..ChunkerConfig::default()
        },
        ..EngineConfig::default()
    };
    let engine = open_engine(cli_args, args.dimension, config)?;

    let receipt = engine
        .ingest(IngestRequest::new(&args.collection_id, source)?)
        .await?;

    if cli_args.verbosity() > 0 {
        println!(
            "Built collection '{}': {} chunks, dimension {}",
            receipt.collection_id, receipt.chunk_count, receipt.dimension
        );
    }
    Ok(())
}

/// Retrieve the nearest chunks for a query.
async fn search(args: SearchArgs, cli_args: &QuarryArgs) -> anyhow::Result<()> {
    let engine = open_engine(cli_args, args.dimension, EngineConfig::default())?;

    let mut request = SearchRequest::new(&args.query, args.top_k)?;
    if let Some(collection) = &args.collection {
        request = request.with_collection(collection)?;
    }
    let response = engine.search(request).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if cli_args.verbosity() > 0 {
        println!("Collection: {}", response.collection_id);
    }
    for (rank, hit) in response.hits.iter().enumerate() {
        println!(
            "{:>2}. [{:.1}s - {:.1}s] distance {:.4}",
            rank + 1,
            hit.start,
            hit.end,
            hit.distance
        );
        println!("    {}", hit.chunk_text.replace('\n', " "));
    }
    Ok(())
}

/// Show the assembled context block for a query.
async fn context(args: ContextArgs, cli_args: &QuarryArgs) -> anyhow::Result<()> {
    let config = EngineConfig {
        assembler: AssemblerConfig {
            budget_chars: args.budget,
        },
        ..EngineConfig::default()
    };
    let engine = open_engine(cli_args, args.dimension, config)?;

    let mut request = SearchRequest::new(&args.query, args.top_k)?;
    if let Some(collection) = &args.collection {
        request = request.with_collection(collection)?;
    }
    let (collection_id, assembled) = engine.context(request).await?;

    if args.json {
        let value = serde_json::json!({
            "collection_id": collection_id,
            "block": assembled.block,
            "sources": assembled.sources,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if cli_args.verbosity() > 0 {
        println!("Collection: {collection_id}");
        println!();
    }
    println!("{}", assembled.block);
    if cli_args.verbosity() > 0 && !assembled.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &assembled.sources {
            println!(
                "  [{:.1}s - {:.1}s] {}",
                source.start,
                source.end,
                source.preview.replace('\n', " ")
            );
        }
    }
    Ok(())
}

/// List known collections, most recent first.
async fn list(args: ListArgs, cli_args: &QuarryArgs) -> anyhow::Result<()> {
    // The embedder is unused for listing; any dimension works.
    let engine = open_engine(cli_args, 256, EngineConfig::default())?;
    let summaries = engine.list_collections()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        if cli_args.verbosity() > 0 {
            println!("No collections found in {}", cli_args.data_dir.display());
        }
        return Ok(());
    }

    for summary in &summaries {
        println!(
            "{}  {} vectors, dimension {}, built {}",
            summary.collection_id,
            summary.vector_count,
            summary.dimension,
            summary.built_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(())
}
