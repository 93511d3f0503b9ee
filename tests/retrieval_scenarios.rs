//! End-to-end retrieval scenarios over in-memory storage.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use quarry::chunk::Segment;
use quarry::engine::{EngineConfig, RetrievalEngine, NO_RELEVANT_INFORMATION};
use quarry::error::{QuarryError, Result};
use quarry::metadata::ChunkMetadata;
use quarry::provider::{EmbeddingProvider, GenerationProvider, HashingEmbedder};
use quarry::storage::MemoryStorage;
use quarry::store::{CollectionStore, StoreConfig};
use quarry::types::{AnswerRequest, IngestRequest, IngestSource, SearchRequest};

/// Maps each known phrase to a distinct axis of a 3-dimensional space.
#[derive(Debug)]
struct AxisEmbedder;

impl AxisEmbedder {
    fn vector_for(text: &str) -> Vec<f32> {
        match text {
            "the cat sat" => vec![1.0, 0.0, 0.0],
            "the dog ran" => vec![0.0, 1.0, 0.0],
            "a bird flew" => vec![0.0, 0.0, 1.0],
            // Queries land near the first axis.
            _ => vec![0.9, 0.1, 0.0],
        }
    }
}

#[async_trait]
impl EmbeddingProvider for AxisEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
    }
}

/// Answers with a fixed string so the pipeline is observable.
#[derive(Debug)]
struct CannedGenerator;

#[async_trait]
impl GenerationProvider for CannedGenerator {
    async fn generate(&self, _prompt: &str, _max_output_tokens: usize) -> Result<String> {
        Ok("the canned answer".to_string())
    }
}

/// Signals when a build reaches embedding, then blocks until released.
#[derive(Debug)]
struct GatedEmbedder {
    entered: mpsc::UnboundedSender<()>,
    release: Arc<Notify>,
}

#[async_trait]
impl EmbeddingProvider for GatedEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let _ = self.entered.send(());
        self.release.notified().await;
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

fn axis_store() -> CollectionStore {
    CollectionStore::new(
        Arc::new(MemoryStorage::new_default()),
        Arc::new(AxisEmbedder),
        StoreConfig::default(),
    )
}

fn axis_chunks() -> (Vec<String>, Vec<ChunkMetadata>) {
    let texts = vec![
        "the cat sat".to_string(),
        "the dog ran".to_string(),
        "a bird flew".to_string(),
    ];
    let metadatas = texts
        .iter()
        .enumerate()
        .map(|(i, t)| ChunkMetadata::new(t.clone(), i as f64, (i + 1) as f64))
        .collect();
    (texts, metadatas)
}

#[tokio::test]
async fn query_near_first_axis_returns_first_chunk() {
    let store = axis_store();
    let (texts, metadatas) = axis_chunks();
    store.build("animals", &texts, metadatas).await.unwrap();

    let hits = store
        .search(Some("animals"), "which animal sat down", 3)
        .await
        .unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].chunk_text, "the cat sat");
    assert!(hits[0].distance < hits[1].distance);
}

#[tokio::test]
async fn searching_own_chunk_text_returns_it_at_distance_zero() {
    let store = CollectionStore::new(
        Arc::new(MemoryStorage::new_default()),
        Arc::new(HashingEmbedder::new(64).unwrap()),
        StoreConfig::default(),
    );
    let (texts, metadatas) = axis_chunks();
    store.build("animals", &texts, metadatas).await.unwrap();

    let hits = store
        .search(Some("animals"), "the dog ran", 1)
        .await
        .unwrap();
    assert_eq!(hits[0].chunk_text, "the dog ran");
    assert!(hits[0].distance.abs() < 1e-6);
}

#[tokio::test]
async fn requesting_more_hits_than_vectors_returns_all_sorted() {
    let store = axis_store();
    let (texts, metadatas) = axis_chunks();
    store.build("animals", &texts, metadatas).await.unwrap();

    let hits = store
        .search(Some("animals"), "anything at all", 50)
        .await
        .unwrap();
    assert_eq!(hits.len(), 3);
    for pair in hits.windows(2) {
        assert!(pair[0].distance <= pair[1].distance);
    }
}

#[tokio::test]
async fn unknown_collection_is_a_typed_error() {
    let store = axis_store();
    match store.search(Some("nope"), "query", 1).await {
        Err(QuarryError::CollectionNotFound(_)) => {}
        other => panic!("expected collection not found, got {other:?}"),
    }
}

#[tokio::test]
async fn identical_rebuild_answers_identical_queries() {
    let store = axis_store();
    let (texts, metadatas) = axis_chunks();

    store
        .build("animals", &texts, metadatas.clone())
        .await
        .unwrap();
    let first = store
        .search(Some("animals"), "which animal sat down", 3)
        .await
        .unwrap();

    store.build("animals", &texts, metadatas).await.unwrap();
    let second = store
        .search(Some("animals"), "which animal sat down", 3)
        .await
        .unwrap();

    let first_texts: Vec<&str> = first.iter().map(|h| h.chunk_text.as_str()).collect();
    let second_texts: Vec<&str> = second.iter().map(|h| h.chunk_text.as_str()).collect();
    assert_eq!(first_texts, second_texts);
}

#[tokio::test]
async fn concurrent_build_for_same_id_is_rejected() {
    let (entered_tx, mut entered_rx) = mpsc::unbounded_channel();
    let release = Arc::new(Notify::new());
    let store = Arc::new(CollectionStore::new(
        Arc::new(MemoryStorage::new_default()),
        Arc::new(GatedEmbedder {
            entered: entered_tx,
            release: release.clone(),
        }),
        StoreConfig::default(),
    ));

    let texts = vec!["some chunk".to_string()];
    let metadatas = vec![ChunkMetadata::new("some chunk", 0.0, 1.0)];

    let background = {
        let store = store.clone();
        let texts = texts.clone();
        let metadatas = metadatas.clone();
        tokio::spawn(async move { store.build("shared", &texts, metadatas).await })
    };

    // Wait until the first build holds its permit inside embedding.
    entered_rx.recv().await.unwrap();

    match store.build("shared", &texts, metadatas.clone()).await {
        Err(QuarryError::BuildInProgress(_)) => {}
        other => panic!("expected build in progress, got {other:?}"),
    }

    release.notify_one();
    background.await.unwrap().unwrap();

    // The permit is released after the first build; a retry succeeds.
    release.notify_one();
    store.build("shared", &texts, metadatas).await.unwrap();

    let loaded = store.load("shared").unwrap();
    assert_eq!(loaded.index.len(), loaded.metadata.len());
}

#[tokio::test]
async fn segment_ingest_carries_spans_into_answers() {
    let engine = RetrievalEngine::new(
        Arc::new(MemoryStorage::new_default()),
        Arc::new(HashingEmbedder::new(64).unwrap()),
        EngineConfig::default(),
    )
    .unwrap()
    .with_generator(Arc::new(CannedGenerator));

    let segments = vec![
        Segment {
            text: "The bridge opened in 1937 after four years of construction.".into(),
            start: 12.0,
            end: 19.5,
        },
        Segment {
            text: "Its towers rise 227 meters above the strait.".into(),
            start: 19.5,
            end: 26.0,
        },
    ];
    engine
        .ingest(IngestRequest::new("bridge", IngestSource::Segments(segments)).unwrap())
        .await
        .unwrap();

    let response = engine
        .answer(AnswerRequest::new("when did the bridge open?"))
        .await
        .unwrap();

    assert_eq!(response.answer, "the canned answer");
    assert!(!response.sources.is_empty());
    assert_eq!(response.sources[0].start, 12.0);
}

#[tokio::test]
async fn question_with_no_overlap_gets_the_fallback_answer() {
    let engine = RetrievalEngine::new(
        Arc::new(MemoryStorage::new_default()),
        Arc::new(HashingEmbedder::new(64).unwrap()),
        EngineConfig {
            // Force the threshold above any assembled block.
            min_context_chars: 10_000,
            ..EngineConfig::default()
        },
    )
    .unwrap()
    .with_generator(Arc::new(CannedGenerator));

    engine
        .ingest(
            IngestRequest::new(
                "notes",
                IngestSource::Text("a few words about nothing much".to_string()),
            )
            .unwrap(),
        )
        .await
        .unwrap();

    let response = engine
        .answer(AnswerRequest::new("completely unrelated question"))
        .await
        .unwrap();
    assert_eq!(response.answer, NO_RELEVANT_INFORMATION);
    assert!(response.sources.is_empty());
}

#[tokio::test]
async fn search_request_without_collection_uses_latest() {
    let engine = RetrievalEngine::new(
        Arc::new(MemoryStorage::new_default()),
        Arc::new(HashingEmbedder::new(64).unwrap()),
        EngineConfig::default(),
    )
    .unwrap();

    engine
        .ingest(
            IngestRequest::new("first", IngestSource::Text("first document text".to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    engine
        .ingest(
            IngestRequest::new(
                "second",
                IngestSource::Text("second document text".to_string()),
            )
            .unwrap(),
        )
        .await
        .unwrap();

    let response = engine
        .search(SearchRequest::new("document", 1).unwrap())
        .await
        .unwrap();
    assert_eq!(response.collection_id, "second");
}
