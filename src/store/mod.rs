//! Collection lifecycle: build, persist, load, discover, search.
//!
//! Every collection lives in a storage namespace named by its id. Blob
//! files are written under a fresh generation UUID and become visible
//! only when the manifest rename commits them, so a reader never sees a
//! half-written collection. Loaded collections are shared through a
//! bounded LRU cache; builds for one id are serialized by an RAII
//! permit.

mod io;
mod manifest;

pub use manifest::{CollectionManifest, MANIFEST_FILE, MANIFEST_VERSION};

use std::fmt;
use std::io::{Read, Write};
use std::num::NonZeroUsize;
use std::sync::Arc;

use ahash::AHashSet;
use lru::LruCache;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::error::{QuarryError, Result};
use crate::metadata::{ChunkMetadata, MetadataStore};
use crate::provider::EmbeddingProvider;
use crate::storage::{PrefixedStorage, Storage};
use crate::types::{validate_collection_id, CollectionSummary, RetrievalHit};
use crate::vector::FlatVectorIndex;

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum number of collections kept loaded in memory.
    pub cache_capacity: usize,
    /// Chunk texts embedded per provider call.
    pub embed_batch_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            cache_capacity: 8,
            embed_batch_size: 64,
        }
    }
}

/// One collection resident in memory.
#[derive(Debug)]
pub struct LoadedCollection {
    pub manifest: CollectionManifest,
    pub index: FlatVectorIndex,
    pub metadata: MetadataStore,
}

/// Builds, persists, loads and searches collections over a `Storage`
/// root, with a keyed cache of loaded collections.
pub struct CollectionStore {
    storage: Arc<dyn Storage>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: StoreConfig,
    cache: Mutex<LruCache<String, Arc<LoadedCollection>>>,
    building: Mutex<AHashSet<String>>,
}

impl fmt::Debug for CollectionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionStore")
            .field("config", &self.config)
            .field("cached", &self.cache.lock().len())
            .finish()
    }
}

/// RAII guard serializing builds per collection id.
struct BuildPermit<'a> {
    building: &'a Mutex<AHashSet<String>>,
    collection_id: String,
}

impl Drop for BuildPermit<'_> {
    fn drop(&mut self) {
        self.building.lock().remove(&self.collection_id);
    }
}

impl CollectionStore {
    pub fn new(
        storage: Arc<dyn Storage>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: StoreConfig,
    ) -> Self {
        let capacity =
            NonZeroUsize::new(config.cache_capacity).unwrap_or(NonZeroUsize::MIN);
        CollectionStore {
            storage,
            embedder,
            config,
            cache: Mutex::new(LruCache::new(capacity)),
            building: Mutex::new(AHashSet::new()),
        }
    }

    /// Build and commit a collection from aligned chunk texts and
    /// metadata, replacing any prior collection with the same id.
    ///
    /// Blobs land under a fresh generation; the manifest rename is the
    /// commit point. A failure after blob writes removes the orphaned
    /// generation, so a partial collection is never visible.
    pub async fn build(
        &self,
        collection_id: &str,
        chunk_texts: &[String],
        metadatas: Vec<ChunkMetadata>,
    ) -> Result<String> {
        validate_collection_id(collection_id)?;
        if chunk_texts.is_empty() {
            return Err(QuarryError::empty_input(format!(
                "no chunks to index for collection '{collection_id}'"
            )));
        }
        if chunk_texts.len() != metadatas.len() {
            return Err(QuarryError::empty_input(format!(
                "{} chunks but {} metadata records for collection '{collection_id}'",
                chunk_texts.len(),
                metadatas.len()
            )));
        }

        let _permit = self.acquire_build_permit(collection_id)?;

        // Embedding is the slow part; it runs with no lock held.
        let vectors = self.embed_chunks(chunk_texts).await?;
        let dimension = vectors.first().map(Vec::len).unwrap_or(0);
        if dimension == 0 {
            return Err(QuarryError::provider(
                "embedding provider returned zero-dimension vectors",
            ));
        }

        let mut index = FlatVectorIndex::new(dimension)?;
        index.add(&vectors)?;
        let metadata = MetadataStore::from_records(metadatas);

        let storage = self.collection_storage(collection_id);
        // Generations the live manifest no longer references are
        // unreachable; sweep them now. The referenced generation stays
        // until the next build, so a reader that picked up the current
        // manifest can still open its blobs after this build commits.
        let prior = self.read_manifest(collection_id).ok();
        self.sweep_stale_generations(&storage, prior.as_ref());

        let generation = Uuid::new_v4().to_string();
        let manifest =
            CollectionManifest::new(collection_id, dimension, index.len(), &generation);

        if let Err(e) = self.persist(&storage, &manifest, &index, &metadata) {
            self.remove_generation(&storage, &manifest);
            return Err(e);
        }

        self.cache.lock().pop(collection_id);

        log::info!(
            "built collection '{collection_id}': {} vectors of dimension {dimension}",
            index.len()
        );
        Ok(format!("{collection_id}/{MANIFEST_FILE}"))
    }

    /// Load a collection, via the cache when the on-disk manifest still
    /// carries the cached `built_at`.
    pub fn load(&self, collection_id: &str) -> Result<Arc<LoadedCollection>> {
        validate_collection_id(collection_id)?;
        let manifest = self.read_manifest(collection_id)?;

        {
            let mut cache = self.cache.lock();
            if let Some(loaded) = cache.get(collection_id) {
                if loaded.manifest.built_at == manifest.built_at {
                    log::debug!("cache hit for collection '{collection_id}'");
                    return Ok(loaded.clone());
                }
            }
        }

        let storage = self.collection_storage(collection_id);
        let index = io::read_vectors_blob(&storage, &manifest.vectors_file)?;
        let metadata = io::read_metadata_blob(&storage, &manifest.metadata_file)?;

        if index.len() != manifest.vector_count || metadata.len() != manifest.vector_count {
            return Err(QuarryError::corrupt_collection(format!(
                "collection '{collection_id}' disagrees on vector count: \
                 manifest {}, index {}, metadata {}",
                manifest.vector_count,
                index.len(),
                metadata.len()
            )));
        }
        if index.dimension() != manifest.dimension {
            return Err(QuarryError::corrupt_collection(format!(
                "collection '{collection_id}' disagrees on dimension: \
                 manifest {}, index {}",
                manifest.dimension,
                index.dimension()
            )));
        }

        log::info!(
            "loaded collection '{collection_id}': {} vectors of dimension {}",
            manifest.vector_count,
            manifest.dimension
        );
        let loaded = Arc::new(LoadedCollection {
            manifest,
            index,
            metadata,
        });
        self.cache
            .lock()
            .put(collection_id.to_string(), loaded.clone());
        Ok(loaded)
    }

    /// The id with the most recent `built_at`, or `None` on an empty
    /// store. Unreadable sibling manifests are skipped, not fatal.
    /// Ties resolve to the lexicographically smaller id, matching the
    /// head of `list_collections`.
    pub fn latest_collection_id(&self) -> Result<Option<String>> {
        let summaries = self.scan_manifests()?;
        Ok(summaries
            .into_iter()
            .max_by(|a, b| {
                a.built_at
                    .cmp(&b.built_at)
                    .then_with(|| b.collection_id.cmp(&a.collection_id))
            })
            .map(|summary| summary.collection_id))
    }

    /// Every readable collection, most recent first.
    pub fn list_collections(&self) -> Result<Vec<CollectionSummary>> {
        let mut summaries = self.scan_manifests()?;
        summaries.sort_by(|a, b| {
            b.built_at
                .cmp(&a.built_at)
                .then_with(|| a.collection_id.cmp(&b.collection_id))
        });
        Ok(summaries)
    }

    /// Resolve an explicit or implicit collection id.
    pub fn resolve_collection_id(&self, collection_id: Option<&str>) -> Result<String> {
        match collection_id {
            Some(id) => {
                validate_collection_id(id)?;
                Ok(id.to_string())
            }
            None => self.latest_collection_id()?.ok_or_else(|| {
                QuarryError::collection_not_found("no collections have been built")
            }),
        }
    }

    /// Embed the query and return the `top_k` nearest chunks, joined
    /// with their metadata. `collection_id = None` targets the latest
    /// collection.
    pub async fn search(
        &self,
        collection_id: Option<&str>,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievalHit>> {
        if query_text.trim().is_empty() {
            return Err(QuarryError::empty_input("query text is blank"));
        }
        let collection_id = self.resolve_collection_id(collection_id)?;
        let loaded = self.load(&collection_id)?;

        let mut vectors = self.embedder.embed(&[query_text.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(QuarryError::provider(format!(
                "embedding provider returned {} vectors for one query",
                vectors.len()
            )));
        }
        let query = vectors.pop().unwrap_or_default();

        let neighbors = loaded.index.search(&query, top_k)?;
        let mut hits = Vec::with_capacity(neighbors.len());
        for neighbor in neighbors {
            let record = loaded.metadata.get(neighbor.ordinal)?;
            hits.push(RetrievalHit {
                chunk_text: record.chunk_text.clone(),
                start: record.start,
                end: record.end,
                distance: neighbor.distance,
            });
        }
        Ok(hits)
    }

    fn acquire_build_permit(&self, collection_id: &str) -> Result<BuildPermit<'_>> {
        let mut building = self.building.lock();
        if !building.insert(collection_id.to_string()) {
            return Err(QuarryError::build_in_progress(format!(
                "a build for collection '{collection_id}' is already running"
            )));
        }
        Ok(BuildPermit {
            building: &self.building,
            collection_id: collection_id.to_string(),
        })
    }

    async fn embed_chunks(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch_size = self.config.embed_batch_size.max(1);
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            let mut batch_vectors = self.embedder.embed(batch).await?;
            if batch_vectors.len() != batch.len() {
                return Err(QuarryError::provider(format!(
                    "embedding provider returned {} vectors for {} texts",
                    batch_vectors.len(),
                    batch.len()
                )));
            }
            vectors.append(&mut batch_vectors);
        }
        Ok(vectors)
    }

    fn collection_storage(&self, collection_id: &str) -> PrefixedStorage {
        PrefixedStorage::new(collection_id, self.storage.clone())
    }

    fn persist(
        &self,
        storage: &PrefixedStorage,
        manifest: &CollectionManifest,
        index: &FlatVectorIndex,
        metadata: &MetadataStore,
    ) -> Result<()> {
        io::write_vectors_blob(storage, &manifest.vectors_file, index)?;
        io::write_metadata_blob(storage, &manifest.metadata_file, metadata)?;
        self.commit_manifest(storage, manifest)
    }

    fn commit_manifest(
        &self,
        storage: &PrefixedStorage,
        manifest: &CollectionManifest,
    ) -> Result<()> {
        let bytes = manifest.to_json()?;
        let tmp_name = format!("{MANIFEST_FILE}.tmp");
        let mut output = storage.create_output(&tmp_name)?;
        output.write_all(&bytes)?;
        output.flush_and_sync()?;
        output.close()?;
        // The rename replaces any prior manifest in one step; a reader
        // sees either the old collection or the new one, never neither.
        storage.rename_file(&tmp_name, MANIFEST_FILE)?;
        Ok(())
    }

    fn read_manifest(&self, collection_id: &str) -> Result<CollectionManifest> {
        let storage = self.collection_storage(collection_id);
        if !storage.file_exists(MANIFEST_FILE) {
            return Err(QuarryError::collection_not_found(collection_id));
        }
        let mut input = storage.open_input(MANIFEST_FILE)?;
        let mut bytes = Vec::new();
        input.read_to_end(&mut bytes)?;
        input.close()?;
        CollectionManifest::from_json(collection_id, &bytes)
    }

    fn scan_manifests(&self) -> Result<Vec<CollectionSummary>> {
        let files = self.storage.list_files()?;
        let mut summaries = Vec::new();
        for file in files {
            let Some(collection_id) = file.strip_suffix(&format!("/{MANIFEST_FILE}")) else {
                continue;
            };
            if collection_id.contains('/') {
                continue;
            }
            match self.read_manifest(collection_id) {
                Ok(manifest) => summaries.push(manifest.summary()),
                Err(e) => {
                    log::warn!("skipping unreadable collection '{collection_id}': {e}");
                }
            }
        }
        Ok(summaries)
    }

    /// Delete the blobs of a build that failed to commit. Best-effort.
    fn remove_generation(&self, storage: &PrefixedStorage, manifest: &CollectionManifest) {
        for name in [&manifest.vectors_file, &manifest.metadata_file] {
            if storage.file_exists(name) {
                if let Err(e) = storage.delete_file(name) {
                    log::warn!("failed to remove orphaned blob '{name}': {e}");
                }
            }
        }
    }

    /// Remove blob files from generations the live manifest does not
    /// reference (failed builds, generations replaced two builds ago).
    /// Best-effort.
    fn sweep_stale_generations(&self, storage: &PrefixedStorage, live: Option<&CollectionManifest>) {
        let Ok(files) = storage.list_files() else {
            return;
        };
        for file in files {
            if file == MANIFEST_FILE {
                continue;
            }
            if let Some(manifest) = live {
                if file == manifest.vectors_file || file == manifest.metadata_file {
                    continue;
                }
            }
            let stale = file.ends_with(".bin")
                && (file.starts_with("vectors-") || file.starts_with("metadata-"));
            if stale {
                if let Err(e) = storage.delete_file(&file) {
                    log::warn!("failed to sweep stale blob '{file}': {e}");
                }
            }
        }
    }
}
