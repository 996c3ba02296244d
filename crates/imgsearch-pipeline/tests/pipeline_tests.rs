use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{DynamicImage, ImageFormat as Codec, Rgb, RgbImage};

use imgsearch_core::error::{Error, Result};
use imgsearch_core::partition::{RejectReason, Rejection};
use imgsearch_core::types::{DistanceMetric, IndexEntry, IndexSpec, Namespace, QueryMatch};
use imgsearch_embed::{EmbeddingEngine, FakeEmbedder, CLIP_EMBEDDING_DIM};
use imgsearch_pipeline::{IndexingPipeline, SearchPipeline};
use imgsearch_source::{load_from_folder, to_common_format, SourceBatch};
use imgsearch_vector::{IndexService, LanceIndexService, QueryRequest, VectorIndexClient};

const COLORS: [[u8; 3]; 3] = [[250, 10, 10], [10, 250, 10], [10, 10, 250]];

fn engine() -> EmbeddingEngine {
    EmbeddingEngine::new(Box::new(FakeEmbedder::new(CLIP_EMBEDDING_DIM)))
}

fn write_fixtures(dir: &std::path::Path) {
    for (i, c) in COLORS.iter().enumerate() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 6, Rgb(*c)));
        img.save_with_format(dir.join(format!("color{i}.png")), Codec::Png).unwrap();
    }
    std::fs::write(dir.join("notes.txt"), "not an image").unwrap();
}

async fn lance_client(dir: &std::path::Path) -> VectorIndexClient<LanceIndexService> {
    let service = LanceIndexService::open(&dir.to_string_lossy()).await.unwrap();
    VectorIndexClient::create_index(&service, "nli-search", CLIP_EMBEDDING_DIM, DistanceMetric::Cosine)
        .await
        .unwrap();
    VectorIndexClient::connect(service, "nli-search").await.unwrap()
}

#[tokio::test]
async fn folder_round_trip_finds_each_image_by_its_own_embedding() {
    let images = tempfile::tempdir().unwrap();
    let db = tempfile::tempdir().unwrap();
    write_fixtures(images.path());

    let engine = engine();
    let client = lance_client(db.path()).await;
    let ns = Namespace::new("test").unwrap();

    let batches = load_from_folder(images.path(), 2).unwrap();
    let report = IndexingPipeline::new(&engine, &client).index_all(batches, &ns).await.unwrap();
    assert_eq!(report.indexed, 3);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.batches, 2);
    assert_eq!(report.upsert_calls, 2);

    for batch in load_from_folder(images.path(), 10).unwrap() {
        for record in batch.unwrap().records {
            let own = engine.embed_images(&[to_common_format(&record.pixels)]).unwrap().remove(0);
            let hits = client.query(own, 3, &ns).await.unwrap();
            // ids are fresh per load, so match on the stored file name
            assert_eq!(hits[0].metadata["name"], record.metadata.name.as_str());
            assert_eq!(hits[0].metadata["file_type"], "PNG");
            assert_eq!(hits[0].metadata["source"], "local_file_system");
        }
    }

    let search = SearchPipeline::new(&engine, &client);
    let hits = search.search("a red square", 2, &ns).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert!(search.top_match("anything", &ns).await.unwrap().is_some());
    let other = Namespace::new("empty").unwrap();
    assert_eq!(search.top_match("anything", &other).await.unwrap(), None);
}

#[derive(Clone, Default)]
struct Recording {
    calls: Arc<Mutex<usize>>,
    fail_from_call: Option<usize>,
}

#[async_trait]
impl IndexService for Recording {
    async fn create_index(&self, _spec: &IndexSpec) -> Result<()> {
        Ok(())
    }
    async fn describe_index(&self, name: &str) -> Result<IndexSpec> {
        IndexSpec::new(name, CLIP_EMBEDDING_DIM, DistanceMetric::Cosine)
    }
    async fn upsert(&self, _index: &str, _ns: &Namespace, entries: &[IndexEntry]) -> Result<usize> {
        let mut calls = self.calls.lock().unwrap();
        if self.fail_from_call.is_some_and(|n| *calls >= n) {
            return Err(Error::Backend("service unavailable".into()));
        }
        *calls += 1;
        Ok(entries.len())
    }
    async fn query(&self, _index: &str, _ns: &Namespace, _request: &QueryRequest) -> Result<Vec<QueryMatch>> {
        Ok(Vec::new())
    }
}

fn rejected_only() -> SourceBatch {
    SourceBatch {
        origin: "remote batch 0".into(),
        records: Vec::new(),
        rejected: vec![Rejection::new("zzz", RejectReason::UnknownId)],
    }
}

#[tokio::test]
async fn all_rejected_batch_skips_embedding_and_upsert() {
    let service = Recording::default();
    let client = VectorIndexClient::connect(service.clone(), "images").await.unwrap();
    let engine = engine();

    let report = IndexingPipeline::new(&engine, &client)
        .index_batch(rejected_only(), &Namespace::new("default").unwrap())
        .await
        .unwrap();
    assert_eq!((report.indexed, report.rejected, report.upsert_calls), (0, 1, 0));
    assert_eq!(*service.calls.lock().unwrap(), 0);
}

#[tokio::test]
async fn failing_batch_is_named_and_stops_the_run() {
    let images = tempfile::tempdir().unwrap();
    write_fixtures(images.path());

    let service = Recording { fail_from_call: Some(1), ..Default::default() };
    let client = VectorIndexClient::connect(service.clone(), "images").await.unwrap();
    let engine = engine();

    let batches = load_from_folder(images.path(), 1).unwrap();
    let err = IndexingPipeline::new(&engine, &client)
        .index_all(batches, &Namespace::new("default").unwrap())
        .await
        .unwrap_err();
    match err {
        Error::Batch { batch, source } => {
            assert_eq!(batch, 1);
            assert!(matches!(*source, Error::Index { chunk: 0, committed: 0, .. }));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(*service.calls.lock().unwrap(), 1);
}
