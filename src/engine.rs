//! The retrieval engine facade: ingest, search, context, answer.

use std::sync::Arc;

use crate::chunk::{Chunker, ChunkerConfig};
use crate::context::{AssembledContext, AssemblerConfig, ContextAssembler};
use crate::error::{QuarryError, Result};
use crate::metadata::ChunkMetadata;
use crate::provider::{EmbeddingProvider, GenerationProvider};
use crate::storage::Storage;
use crate::store::{CollectionStore, StoreConfig};
use crate::types::{
    AnswerRequest, AnswerResponse, CollectionSummary, IngestReceipt, IngestRequest, IngestSource,
    SearchRequest, SearchResponse,
};

/// The fixed fallback answer for queries with no usable context.
pub const NO_RELEVANT_INFORMATION: &str = "No relevant information found.";

/// Engine configuration, aggregating the component configs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub chunker: ChunkerConfig,
    pub assembler: AssemblerConfig,
    pub store: StoreConfig,
    /// Context blocks shorter than this skip generation entirely.
    pub min_context_chars: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            chunker: ChunkerConfig::default(),
            assembler: AssemblerConfig::default(),
            store: StoreConfig::default(),
            min_context_chars: 20,
        }
    }
}

/// Wires chunker, store, assembler and providers behind typed
/// request/response structs.
#[derive(Debug)]
pub struct RetrievalEngine {
    chunker: Chunker,
    store: CollectionStore,
    assembler: ContextAssembler,
    generator: Option<Arc<dyn GenerationProvider>>,
    min_context_chars: usize,
}

impl RetrievalEngine {
    pub fn new(
        storage: Arc<dyn Storage>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: EngineConfig,
    ) -> Result<Self> {
        Ok(RetrievalEngine {
            chunker: Chunker::new(config.chunker)?,
            store: CollectionStore::new(storage, embedder, config.store),
            assembler: ContextAssembler::new(config.assembler),
            generator: None,
            min_context_chars: config.min_context_chars,
        })
    }

    /// Attach a generation provider, enabling `answer`.
    pub fn with_generator(mut self, generator: Arc<dyn GenerationProvider>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Chunk, embed and persist the request's source as a collection,
    /// replacing any prior collection with the same id.
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestReceipt> {
        let chunks = match &request.source {
            IngestSource::Text(text) => self.chunker.chunk_text(text)?,
            IngestSource::Segments(segments) => self.chunker.chunk_segments(segments)?,
        };

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let metadatas: Vec<ChunkMetadata> = chunks
            .into_iter()
            .map(|c| ChunkMetadata::new(c.text, c.start, c.end))
            .collect();

        let path = self
            .store
            .build(&request.collection_id, &texts, metadatas)
            .await?;
        let loaded = self.store.load(&request.collection_id)?;

        Ok(IngestReceipt {
            collection_id: request.collection_id,
            chunk_count: texts.len(),
            dimension: loaded.manifest.dimension,
            path,
        })
    }

    /// Raw nearest-neighbor retrieval.
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        let collection_id = self
            .store
            .resolve_collection_id(request.collection_id.as_deref())?;
        let hits = self
            .store
            .search(Some(&collection_id), &request.query, request.top_k)
            .await?;
        Ok(SearchResponse {
            collection_id,
            hits,
        })
    }

    /// Retrieval plus context assembly, without generation.
    pub async fn context(&self, request: SearchRequest) -> Result<(String, AssembledContext)> {
        let response = self.search(request).await?;
        let context = self.assembler.assemble(&response.hits);
        Ok((response.collection_id, context))
    }

    /// The full answer pipeline: retrieve, assemble, generate.
    ///
    /// When the assembled block is shorter than `min_context_chars` the
    /// generation provider is not invoked and the fixed fallback answer
    /// is returned with no sources.
    pub async fn answer(&self, request: AnswerRequest) -> Result<AnswerResponse> {
        let generator = self.generator.clone().ok_or_else(|| {
            QuarryError::invalid_argument("no generation provider is configured")
        })?;

        let collection_id = self
            .store
            .resolve_collection_id(request.collection_id.as_deref())?;
        let hits = self
            .store
            .search(Some(&collection_id), &request.question, request.top_k)
            .await?;
        let context = self.assembler.assemble(&hits);

        if context.block.chars().count() < self.min_context_chars {
            log::info!(
                "context for collection '{collection_id}' below threshold, skipping generation"
            );
            return Ok(AnswerResponse {
                collection_id,
                answer: NO_RELEVANT_INFORMATION.to_string(),
                sources: Vec::new(),
            });
        }

        let prompt = render_prompt(&context.block, &request.question);
        let answer = generator
            .generate(&prompt, request.max_output_tokens)
            .await?;

        Ok(AnswerResponse {
            collection_id,
            answer,
            sources: context.sources,
        })
    }

    /// Every known collection, most recent first.
    pub fn list_collections(&self) -> Result<Vec<CollectionSummary>> {
        self.store.list_collections()
    }

    /// The id of the most recently built collection, if any.
    pub fn latest_collection_id(&self) -> Result<Option<String>> {
        self.store.latest_collection_id()
    }
}

fn render_prompt(context: &str, question: &str) -> String {
    format!(
        "You are an assistant answering questions using ONLY the CONTEXT below.\n\
         If the answer can't be found in CONTEXT, reply EXACTLY: \"No relevant information found.\"\n\
         Do NOT invent facts. Be concise.\n\
         \n\
         CONTEXT:\n\
         {context}\n\
         \n\
         QUESTION:\n\
         {question}\n\
         \n\
         Answer (short and factual):"
    )
}
