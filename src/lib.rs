//! # Quarry
//!
//! An embedded vector retrieval engine for grounded question answering.
//!
//! ## Features
//!
//! - Per-collection exact nearest-neighbor indexes with aligned chunk metadata
//! - Atomic build/persist/load with generation-named blobs and a manifest commit
//! - Bounded LRU cache of loaded collections with per-id build serialization
//! - Overlapping text chunking with best-effort time-span provenance
//! - Deduplicated, budget-bounded context assembly for prompt grounding
//! - Pluggable storage backends and async provider seams

pub mod chunk;
pub mod context;
pub mod engine;
pub mod error;
pub mod metadata;
pub mod provider;
pub mod storage;
pub mod store;
pub mod types;
pub mod util;
pub mod vector;

pub mod cli;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
