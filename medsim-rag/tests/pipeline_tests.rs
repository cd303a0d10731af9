//! End-to-end indexing and retrieval against the in-memory store.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::{CountingEmbedder, HashEmbedder, alphabet_text};
use medsim_rag::{
    Document, EmbeddingProvider, FixedSizeChunker, InMemoryVectorStore, Indexer, MetadataFilter,
    RagConfig, RagError, Retriever, SequentialRecordIds, VectorStore,
};

const DIM: usize = 8;

struct Harness {
    store: Arc<InMemoryVectorStore>,
    indexer: Indexer,
    retriever: Retriever,
}

fn harness_with(embedder: Arc<dyn EmbeddingProvider>, batch_size: usize) -> Harness {
    let config = RagConfig::builder()
        .collection("cases")
        .chunk_size(1000)
        .chunk_overlap(150)
        .batch_size(batch_size)
        .build()
        .unwrap();
    let store = Arc::new(InMemoryVectorStore::new());
    let indexer = Indexer::builder()
        .config(config.clone())
        .embedding_provider(embedder.clone())
        .vector_store(store.clone())
        .build()
        .unwrap();
    let retriever = Retriever::builder()
        .config(config)
        .embedding_provider(embedder)
        .vector_store(store.clone())
        .build()
        .unwrap();
    Harness { store, indexer, retriever }
}

fn harness() -> Harness {
    harness_with(Arc::new(HashEmbedder::new(DIM)), 256)
}

#[tokio::test]
async fn indexes_and_retrieves_a_case_report() {
    let h = harness();
    let report = h
        .indexer
        .index(vec![
            Document::new("DOC1", alphabet_text(2400)),
            Document::new("DOC2", "An unrelated report about a fractured wrist."),
        ])
        .await
        .unwrap();
    assert_eq!(report.documents, 2);
    assert_eq!(report.chunks, 4);
    assert_eq!(report.batches, 1);

    let metadata = h.store.get("cases", &MetadataFilter::source("DOC1"), 10).await.unwrap();
    let indices: Vec<usize> = metadata.iter().map(|m| m.chunk_index).collect();
    assert_eq!(indices, vec![0, 1, 2]);

    let hits = h.retriever.retrieve("abcdefg", 2, Some("DOC1")).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|r| r.source_id == "DOC1"));
    assert!(hits[0].score <= hits[1].score);
}

#[tokio::test]
async fn chunk_texts_follow_the_window_offsets() {
    let h = harness();
    let text = alphabet_text(2400);
    h.indexer.index(vec![Document::new("DOC1", text.clone())]).await.unwrap();

    let mut hits = h.retriever.retrieve("q", 10, Some("DOC1")).await.unwrap();
    hits.sort_by_key(|r| r.chunk_index);
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].text, text[0..1000]);
    assert_eq!(hits[1].text, text[850..1850]);
    assert_eq!(hits[2].text, text[1700..2400]);
}

#[tokio::test]
async fn retrieval_is_capped_at_top_k_and_at_available_records() {
    let h = harness();
    let docs = (0..5).map(|i| Document::new(format!("S{i}"), format!("short report {i}")));
    h.indexer.index(docs).await.unwrap();

    assert_eq!(h.retriever.retrieve("report", 3, None).await.unwrap().len(), 3);
    assert_eq!(h.retriever.retrieve("report", 50, None).await.unwrap().len(), 5);
    assert_eq!(h.retriever.retrieve_default("report", None).await.unwrap().len(), 4);
    assert!(h.retriever.retrieve("report", 5, Some("unknown")).await.unwrap().is_empty());
}

#[tokio::test]
async fn distinct_sources_never_collide() {
    let h = harness();
    let docs = vec![
        Document::new("A", alphabet_text(1200)),
        Document::new("B", alphabet_text(1200)),
        Document::new("A-1", "tricky id"),
    ];
    let report = h.indexer.index(docs).await.unwrap();
    assert_eq!(h.store.count("cases").await.unwrap(), report.chunks);
}

#[tokio::test]
async fn reset_empties_the_collection() {
    let h = harness();
    h.indexer.index(vec![Document::new("DOC1", "fever, rash and joint pain")]).await.unwrap();
    assert_eq!(h.retriever.count().await.unwrap(), 1);

    h.indexer.reset().await.unwrap();
    assert!(h.retriever.retrieve("fever", 4, None).await.unwrap().is_empty());
    assert_eq!(h.retriever.sample_source_id().await, None);
}

#[tokio::test]
async fn reindexing_without_reset_appends_duplicates() {
    let h = harness();
    let doc = || vec![Document::new("DOC1", "chest pain on exertion")];
    h.indexer.index(doc()).await.unwrap();
    h.indexer.index(doc()).await.unwrap();
    assert_eq!(h.store.count("cases").await.unwrap(), 2);

    let hits = h.store.query("cases", &[1.0; DIM], 4, &MetadataFilter::source("DOC1")).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].record.text, hits[1].record.text);
    assert_ne!(hits[0].record.id, hits[1].record.id);
}

#[tokio::test]
async fn sequential_ids_collide_on_reindex() {
    let h = harness();
    let sequential = Indexer::builder()
        .collection("cases")
        .embedding_provider(Arc::new(HashEmbedder::new(DIM)))
        .vector_store(h.store.clone())
        .record_ids(Arc::new(SequentialRecordIds))
        .build()
        .unwrap();
    let doc = || vec![Document::new("DOC1", "chest pain on exertion")];
    sequential.index(doc()).await.unwrap();

    let err = sequential.index(doc()).await.unwrap_err();
    assert!(matches!(err, RagError::VectorStore { .. }));
    assert_eq!(h.store.count("cases").await.unwrap(), 1);

    let ids = h.store.query("cases", &[1.0; DIM], 1, &MetadataFilter::any()).await.unwrap();
    assert_eq!(ids[0].record.id, "DOC1-0-0");
}

#[tokio::test]
async fn embedder_is_called_once_per_batch() {
    let embedder = Arc::new(CountingEmbedder::new(DIM));
    let h = harness_with(embedder.clone(), 4);
    let docs = (0..10).map(|i| Document::new(format!("D{i}"), format!("note {i}")));
    let report = h.indexer.index(docs).await.unwrap();

    assert_eq!(report.chunks, 10);
    assert_eq!(report.batches, 3);
    assert_eq!(embedder.calls(), 3);
    assert_eq!(embedder.batch_sizes(), vec![4, 4, 2]);
}

#[tokio::test]
async fn failed_batch_keeps_earlier_batches() {
    let embedder = Arc::new(CountingEmbedder::new(DIM).failing_on(2));
    let h = harness_with(embedder.clone(), 3);
    let docs = (0..9).map(|i| Document::new(format!("D{i}"), format!("note {i}")));

    let err = h.indexer.index(docs).await.unwrap_err();
    assert!(matches!(err, RagError::Embedding { .. }));
    assert_eq!(embedder.calls(), 2);
    assert_eq!(h.store.count("cases").await.unwrap(), 3);
}

#[tokio::test]
async fn stored_embeddings_are_unit_length() {
    let h = harness();
    h.indexer.index(vec![Document::new("DOC1", "dyspnea")]).await.unwrap();
    let hits = h.store.query("cases", &[1.0; DIM], 1, &MetadataFilter::any()).await.unwrap();
    let norm: f32 = hits[0].record.embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-5);
}

#[tokio::test]
async fn sampling_returns_an_indexed_source() {
    let h = harness();
    assert_eq!(h.retriever.sample_source_id().await, None);

    let ids = ["PMC1", "PMC2", "PMC3"];
    let docs = ids.iter().map(|id| Document::new(*id, alphabet_text(1500)));
    h.indexer.index(docs).await.unwrap();

    let known: HashSet<&str> = ids.into_iter().collect();
    for _ in 0..20 {
        let picked = h.retriever.sample_source_id().await.unwrap();
        assert!(known.contains(picked.as_str()), "{picked}");
    }
}

#[tokio::test]
async fn custom_chunker_is_used() {
    let store = Arc::new(InMemoryVectorStore::new());
    let indexer = Indexer::builder()
        .collection("tiny")
        .embedding_provider(Arc::new(HashEmbedder::new(DIM)))
        .vector_store(store.clone())
        .chunker(Arc::new(FixedSizeChunker::new(4, 1).unwrap()))
        .build()
        .unwrap();
    indexer.index(vec![Document::new("X", "abcdefghij")]).await.unwrap();
    assert_eq!(store.count("tiny").await.unwrap(), 3);
}
