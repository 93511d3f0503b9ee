//! Command line argument parsing for the quarry CLI using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Quarry - an embedded vector retrieval engine
#[derive(Parser, Debug, Clone)]
#[command(name = "quarry")]
#[command(about = "An embedded vector retrieval engine for grounded question answering")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct QuarryArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Root directory for persisted collections
    #[arg(
        long,
        value_name = "DIR",
        env = "QUARRY_DATA_DIR",
        default_value = "quarry-data",
        global = true
    )]
    pub data_dir: PathBuf,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl QuarryArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build a collection from a document or transcript
    Ingest(IngestArgs),

    /// Retrieve the nearest chunks for a query
    Search(SearchArgs),

    /// Show the assembled context block for a query
    Context(ContextArgs),

    /// List known collections, most recent first
    List(ListArgs),
}

/// Input format accepted by `ingest`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestFormat {
    /// Plain text
    Text,
    /// JSON array of `{ "text", "start", "end" }` segments
    Segments,
}

/// Arguments for building a collection
#[derive(Parser, Debug, Clone)]
pub struct IngestArgs {
    /// Collection id to build or replace
    #[arg(value_name = "COLLECTION_ID")]
    pub collection_id: String,

    /// Input file; reads stdin when omitted
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Input format
    #[arg(long, default_value = "text")]
    pub format: IngestFormat,

    /// Chunk window size in grapheme clusters
    #[arg(long, default_value = "800")]
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in grapheme clusters
    #[arg(long, default_value = "50")]
    pub overlap: usize,

    /// Dimension of the built-in hashing embedder
    #[arg(short, long, default_value = "256")]
    pub dimension: usize,
}

/// Arguments for retrieval
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    /// Query text
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Collection id; defaults to the most recently built collection
    #[arg(short, long, value_name = "COLLECTION_ID")]
    pub collection: Option<String>,

    /// Number of results to return
    #[arg(short = 'k', long, default_value = "5")]
    pub top_k: usize,

    /// Dimension of the built-in hashing embedder (must match ingest)
    #[arg(short, long, default_value = "256")]
    pub dimension: usize,

    /// Emit results as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for context assembly
#[derive(Parser, Debug, Clone)]
pub struct ContextArgs {
    /// Query text
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Collection id; defaults to the most recently built collection
    #[arg(short, long, value_name = "COLLECTION_ID")]
    pub collection: Option<String>,

    /// Number of hits fed to the assembler
    #[arg(short = 'k', long, default_value = "5")]
    pub top_k: usize,

    /// Context budget in characters
    #[arg(short, long, default_value = "1800")]
    pub budget: usize,

    /// Dimension of the built-in hashing embedder (must match ingest)
    #[arg(short, long, default_value = "256")]
    pub dimension: usize,

    /// Emit the block and sources as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for listing collections
#[derive(Parser, Debug, Clone)]
pub struct ListArgs {
    /// Emit summaries as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_ingest_defaults() {
        let args = QuarryArgs::parse_from(["quarry", "ingest", "video1"]);
        match args.command {
            Command::Ingest(ingest) => {
                assert_eq!(ingest.collection_id, "video1");
                assert_eq!(ingest.format, IngestFormat::Text);
                assert_eq!(ingest.chunk_size, 800);
                assert_eq!(ingest.overlap, 50);
                assert_eq!(ingest.dimension, 256);
                assert!(ingest.input.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_search_flags() {
        let args = QuarryArgs::parse_from([
            "quarry", "search", "what happened", "-c", "video1", "-k", "3", "--json",
        ]);
        match args.command {
            Command::Search(search) => {
                assert_eq!(search.query, "what happened");
                assert_eq!(search.collection.as_deref(), Some("video1"));
                assert_eq!(search.top_k, 3);
                assert!(search.json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_data_dir_after_subcommand() {
        let args =
            QuarryArgs::parse_from(["quarry", "list", "--data-dir", "/tmp/collections"]);
        assert_eq!(args.data_dir.to_str(), Some("/tmp/collections"));
    }

    #[test]
    fn test_verbosity_levels() {
        let args = QuarryArgs::parse_from(["quarry", "-vv", "list"]);
        assert_eq!(args.verbosity(), 2);

        let args = QuarryArgs::parse_from(["quarry", "-q", "-v", "list"]);
        assert_eq!(args.verbosity(), 0);
    }
}
