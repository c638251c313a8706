//! End-to-end tests for ingestion and question answering with test doubles.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use docqa_rag::{
    Embedder, Generator, INSUFFICIENT_INFORMATION, NewChunk, RagConfig, RagError, RagPipeline,
    Result, VectorIndex,
};

const DIM: usize = 32;

/// Deterministic bag-of-words embedder that counts its calls.
#[derive(Default)]
struct HashEmbedder {
    calls: AtomicUsize,
}

impl HashEmbedder {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn bucket(word: &str) -> usize {
    // FNV-1a
    let hash = word.bytes().fold(0xcbf2_9ce4_8422_2325u64, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    });
    (hash % DIM as u64) as usize
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut embedding = vec![0.0; DIM];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            embedding[bucket(&word.to_lowercase())] += 1.0;
        }
        Ok(embedding)
    }
}

/// Returns one vector too few for every batch.
struct ShortBatchEmbedder;

#[async_trait]
impl Embedder for ShortBatchEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0; DIM])
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(vec![vec![1.0; DIM]; texts.len().saturating_sub(1)])
    }
}

/// Returns a NaN component in the second vector of every batch.
struct NanEmbedder;

#[async_trait]
impl Embedder for NanEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(vec![1.0; DIM])
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = vec![vec![1.0; DIM]; texts.len()];
        if let Some(second) = embeddings.get_mut(1) {
            second[0] = f32::NAN;
        }
        Ok(embeddings)
    }
}

struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::EmbeddingError {
            provider: "test".to_string(),
            message: "service unavailable".to_string(),
        })
    }
}

/// Records every prompt and answers with a fixed reply.
#[derive(Default)]
struct RecordingGenerator {
    prompts: Mutex<Vec<String>>,
}

impl RecordingGenerator {
    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok("The capital of Brazil is Brasília.".to_string())
    }
}

#[derive(Default)]
struct FailingGenerator {
    calls: AtomicUsize,
}

#[async_trait]
impl Generator for FailingGenerator {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RagError::GenerationError {
            provider: "test".to_string(),
            message: "timed out".to_string(),
        })
    }
}

fn pipeline(
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    config: RagConfig,
) -> RagPipeline {
    RagPipeline::builder()
        .config(config)
        .embedder(embedder)
        .generator(generator)
        .build()
        .unwrap()
}

#[tokio::test]
async fn empty_index_query_skips_embedding_and_generation() {
    let embedder = Arc::new(HashEmbedder::default());
    let generator = Arc::new(RecordingGenerator::default());
    let rag = pipeline(embedder.clone(), generator.clone(), RagConfig::default());

    let answer = rag.query("What is the capital of Brazil?", 4, 0.8).await.unwrap();

    assert_eq!(answer.answer, INSUFFICIENT_INFORMATION);
    assert!(answer.chunks_used.is_empty());
    assert_eq!(answer.chunk_count, 0);
    assert_eq!(generator.calls(), 0);
    assert_eq!(embedder.calls(), 0);
}

#[tokio::test]
async fn ingest_then_exact_match_query() {
    let embedder = Arc::new(HashEmbedder::default());
    let generator = Arc::new(RecordingGenerator::default());
    let rag = pipeline(embedder.clone(), generator.clone(), RagConfig::default());

    let document = "The capital of Brazil is Brasília.";
    let inserted = rag.ingest(document, 600, 0, "\n", "brazil.txt").await.unwrap();
    assert_eq!(inserted, 1);

    let answer = rag.query("What is the capital of Brazil?", 1, 0.8).await.unwrap();
    assert_eq!(answer.chunk_count, 1);
    assert_eq!(answer.chunks_used.len(), 1);
    assert!(answer.chunks_used[0].contains("Brasília"));
    assert!(answer.answer.contains("Brasília"));

    let prompts = generator.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains(&answer.chunks_used[0]));
    assert!(prompts[0].contains("What is the capital of Brazil?"));
}

#[tokio::test]
async fn k_larger_than_index_returns_every_chunk_once() {
    let generator = Arc::new(RecordingGenerator::default());
    let rag = pipeline(Arc::new(HashEmbedder::default()), generator.clone(), RagConfig::default());

    let inserted =
        rag.ingest("alpha line\nbeta line\n", 12, 0, "\n", "lines.txt").await.unwrap();
    assert_eq!(inserted, 2);

    let answer = rag.query("alpha", 5, 0.5).await.unwrap();
    assert_eq!(answer.chunk_count, 2);
    let mut used = answer.chunks_used.clone();
    used.sort();
    assert_eq!(used, vec!["alpha line\n", "beta line\n"]);
    assert_eq!(generator.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_inserts_lose_nothing() {
    let index = Arc::new(VectorIndex::new());

    let writers: Vec<_> = (0..2)
        .map(|writer| {
            let index = index.clone();
            tokio::spawn(async move {
                let chunks = (0..10)
                    .map(|i| {
                        let text = format!("writer {writer} chunk {i}");
                        NewChunk::new(text, vec![1.0, i as f32, 0.5], "doc", i)
                    })
                    .collect();
                index.insert(chunks).await
            })
        })
        .collect();
    for writer in writers {
        assert_eq!(writer.await.unwrap().unwrap(), 10);
    }

    assert_eq!(index.count().await, 20);
    let all = index.search_by_vector(&[1.0, 0.0, 0.0], 100).await.unwrap();
    let mut ids: Vec<_> = all.iter().map(|r| r.chunk.id.clone()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_observe_a_partial_batch() {
    let index = Arc::new(VectorIndex::new());
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let index = index.clone();
            let done = done.clone();
            tokio::spawn(async move {
                let mut observed = Vec::new();
                loop {
                    let finished = done.load(Ordering::SeqCst);
                    observed.push(index.count().await);
                    let hits = index.search_by_vector(&[1.0, 0.0, 0.5], 1000).await.unwrap();
                    observed.push(hits.len());
                    if finished {
                        return observed;
                    }
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    let writers: Vec<_> = (0..4)
        .map(|writer| {
            let index = index.clone();
            tokio::spawn(async move {
                for batch in 0..5 {
                    let chunks = (0..10)
                        .map(|i| {
                            let text = format!("writer {writer} batch {batch} chunk {i}");
                            NewChunk::new(text, vec![1.0, i as f32, 0.5], "doc", i)
                        })
                        .collect();
                    index.insert(chunks).await.unwrap();
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap();
    }
    done.store(true, Ordering::SeqCst);

    for reader in readers {
        let observed = reader.await.unwrap();
        assert!(!observed.is_empty());
        assert!(observed.iter().all(|count| count % 10 == 0), "partial batch seen: {observed:?}");
        assert_eq!(observed.last(), Some(&200));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_ingestion_through_shared_pipeline() {
    let rag = Arc::new(pipeline(
        Arc::new(HashEmbedder::default()),
        Arc::new(RecordingGenerator::default()),
        RagConfig::default(),
    ));

    let tasks: Vec<_> = (0..4)
        .map(|n| {
            let rag = rag.clone();
            tokio::spawn(async move {
                let text: String = (0..10).map(|i| format!("document {n} line {i}\n")).collect();
                rag.ingest(&text, 20, 0, "\n", &format!("doc-{n}.txt")).await
            })
        })
        .collect();

    let mut total = 0;
    for task in tasks {
        total += task.await.unwrap().unwrap();
    }
    assert_eq!(rag.status().await.chunk_count, total);
}

#[tokio::test]
async fn dimension_mismatch_leaves_the_index_unchanged() {
    let index = Arc::new(VectorIndex::new());
    index.insert(vec![NewChunk::new("seed", vec![1.0, 0.0, 0.0], "seed.txt", 0)]).await.unwrap();

    let rag = RagPipeline::builder()
        .embedder(Arc::new(HashEmbedder::default()))
        .generator(Arc::new(RecordingGenerator::default()))
        .index(index.clone())
        .build()
        .unwrap();

    let err = rag.ingest_text("some new text", "new.txt").await.unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 3, actual: DIM }));
    assert_eq!(index.count().await, 1);
}

#[tokio::test]
async fn wrong_embedding_count_is_an_embedding_error() {
    let rag = pipeline(
        Arc::new(ShortBatchEmbedder),
        Arc::new(RecordingGenerator::default()),
        RagConfig::default(),
    );

    let err = rag.ingest("one\ntwo\n", 4, 0, "\n", "short.txt").await.unwrap_err();
    assert!(matches!(err, RagError::EmbeddingError { .. }));
    assert_eq!(rag.status().await.chunk_count, 0);
}

#[tokio::test]
async fn non_finite_embedding_is_an_embedding_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.json");
    let rag = pipeline(
        Arc::new(NanEmbedder),
        Arc::new(RecordingGenerator::default()),
        RagConfig::default(),
    );

    let err = rag.ingest("one\ntwo\nthree\n", 4, 0, "\n", "nan.txt").await.unwrap_err();
    assert!(matches!(err, RagError::EmbeddingError { .. }));
    assert_eq!(rag.status().await.chunk_count, 0);

    rag.index().save(&path).await.unwrap();
    assert_eq!(VectorIndex::load(&path).await.unwrap().count().await, 0);
}

#[tokio::test]
async fn empty_document_inserts_nothing() {
    let embedder = Arc::new(HashEmbedder::default());
    let generator = Arc::new(RecordingGenerator::default());
    let rag = pipeline(embedder.clone(), generator, RagConfig::default());

    assert_eq!(rag.ingest_text("", "empty.txt").await.unwrap(), 0);
    assert_eq!(embedder.calls(), 0);
    assert!(!rag.status().await.has_documents);
}

#[tokio::test]
async fn generation_failure_is_propagated_without_retry() {
    let generator = Arc::new(FailingGenerator::default());
    let rag = pipeline(Arc::new(HashEmbedder::default()), generator.clone(), RagConfig::default());
    rag.ingest_text("Rust has no garbage collector.", "rust.txt").await.unwrap();

    let err = rag.query("Does Rust have a GC?", 2, 0.8).await.unwrap_err();
    assert!(matches!(err, RagError::GenerationError { ref message, .. } if message == "timed out"));
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn query_embedding_failure_is_an_embedding_error() {
    let index = Arc::new(VectorIndex::new());
    index.insert(vec![NewChunk::new("seed", vec![1.0; DIM], "seed.txt", 0)]).await.unwrap();
    let generator = Arc::new(RecordingGenerator::default());
    let rag = RagPipeline::builder()
        .embedder(Arc::new(FailingEmbedder))
        .generator(generator.clone())
        .index(index)
        .build()
        .unwrap();

    let err = rag.query("anything", 1, 0.5).await.unwrap_err();
    assert!(matches!(err, RagError::EmbeddingError { .. }));
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn query_default_uses_configured_top_k() {
    let config = RagConfig { top_k: 1, ..RagConfig::default() };
    let generator = Arc::new(RecordingGenerator::default());
    let rag = pipeline(Arc::new(HashEmbedder::default()), generator, config);
    rag.ingest("red apples\ngreen pears\nblue berries\n", 14, 0, "\n", "fruit.txt").await.unwrap();

    let answer = rag.query_default("green pears").await.unwrap();
    assert_eq!(answer.chunk_count, 1);
    assert_eq!(answer.chunks_used, vec!["green pears\n"]);
}

#[tokio::test]
async fn retrieve_reports_provenance_without_generating() {
    let generator = Arc::new(RecordingGenerator::default());
    let rag = pipeline(Arc::new(HashEmbedder::default()), generator.clone(), RagConfig::default());
    rag.ingest("cats purr\ndogs bark\n", 10, 0, "\n", "pets.txt").await.unwrap();

    let results = rag.retrieve("dogs bark", 1, 1.0).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk.text, "dogs bark\n");
    assert_eq!(results[0].chunk.metadata.source_id, "pets.txt");
    assert_eq!(results[0].chunk.metadata.chunk_index, 1);
    assert!((results[0].score - 1.0).abs() < 1e-5);
    assert_eq!(generator.calls(), 0);
}

#[tokio::test]
async fn clear_returns_to_insufficient_information() {
    let generator = Arc::new(RecordingGenerator::default());
    let rag = pipeline(Arc::new(HashEmbedder::default()), generator.clone(), RagConfig::default());
    rag.ingest_text("Some fact.", "facts.txt").await.unwrap();
    rag.clear().await;

    let answer = rag.query("Some fact?", 3, 0.8).await.unwrap();
    assert_eq!(answer.answer, INSUFFICIENT_INFORMATION);
    assert_eq!(generator.calls(), 0);
    assert_eq!(rag.status().await.dimensions, None);
}

#[tokio::test]
async fn ingest_file_uses_the_file_name_as_source() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.md");
    std::fs::write(&path, "Pedro Álvares Cabral reached Brazil in 1500.\n").unwrap();

    let rag = pipeline(
        Arc::new(HashEmbedder::default()),
        Arc::new(RecordingGenerator::default()),
        RagConfig::default(),
    );
    assert_eq!(rag.ingest_file(&path).await.unwrap(), 1);

    let results = rag.retrieve("Who reached Brazil?", 1, 0.8).await.unwrap();
    assert_eq!(results[0].chunk.metadata.source_id, "history.md");

    let missing = rag.ingest_file(dir.path().join("missing.txt")).await.unwrap_err();
    assert!(matches!(missing, RagError::Io(_)));
}

#[tokio::test]
async fn restored_snapshot_answers_queries() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("index.json");

    let rag = pipeline(
        Arc::new(HashEmbedder::default()),
        Arc::new(RecordingGenerator::default()),
        RagConfig::default(),
    );
    rag.ingest_text("The capital of Brazil is Brasília.", "brazil.txt").await.unwrap();
    rag.index().save(&path).await.unwrap();

    let generator = Arc::new(RecordingGenerator::default());
    let restored = RagPipeline::builder()
        .embedder(Arc::new(HashEmbedder::default()))
        .generator(generator.clone())
        .index(Arc::new(VectorIndex::load(&path).await.unwrap()))
        .build()
        .unwrap();

    let answer = restored.query("What is the capital of Brazil?", 1, 0.8).await.unwrap();
    assert_eq!(answer.chunks_used, vec!["The capital of Brazil is Brasília."]);
    assert_eq!(generator.calls(), 1);
}
