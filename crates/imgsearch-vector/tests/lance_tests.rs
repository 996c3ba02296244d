use serde_json::{json, Map, Value};

use imgsearch_core::error::Error;
use imgsearch_core::types::{DistanceMetric, IndexEntry, Namespace};
use imgsearch_vector::{IndexService, LanceIndexService, VectorIndexClient};

fn entry(id: &str, values: Vec<f32>, name: &str) -> IndexEntry {
    let mut metadata = Map::new();
    metadata.insert("id".into(), Value::from(id));
    metadata.insert("name".into(), Value::from(name));
    IndexEntry { id: id.into(), values, metadata }
}

fn axis(dim: usize, hot: usize) -> Vec<f32> {
    let mut v = vec![0.0; dim];
    v[hot] = 1.0;
    v
}

async fn fresh(dim: usize) -> (tempfile::TempDir, VectorIndexClient<LanceIndexService>) {
    let tmp = tempfile::tempdir().unwrap();
    let uri = tmp.path().to_string_lossy().to_string();
    let service = LanceIndexService::open(&uri).await.unwrap();
    VectorIndexClient::create_index(&service, "nli-search", dim, DistanceMetric::Cosine).await.unwrap();
    let client = VectorIndexClient::connect(service, "nli-search").await.unwrap();
    (tmp, client)
}

#[tokio::test]
async fn single_vector_is_found_with_its_metadata() {
    let (_tmp, client) = fresh(512).await;
    let test = Namespace::new("test").unwrap();

    client.upsert(vec![entry("A", vec![0.1; 512], "a.png")], &test).await.unwrap();
    let hits = client.query(vec![0.1; 512], 1, &test).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "A");
    assert_eq!(hits[0].metadata.get("name"), Some(&json!("a.png")));
    assert!(hits[0].score > 0.99, "identical direction scores ~1, got {}", hits[0].score);
}

#[tokio::test]
async fn namespaces_do_not_leak() {
    let (_tmp, client) = fresh(8).await;
    let left = Namespace::new("left").unwrap();
    let right = Namespace::new("right").unwrap();

    client.upsert(vec![entry("L", axis(8, 0), "l")], &left).await.unwrap();
    client.upsert(vec![entry("R", axis(8, 0), "r")], &right).await.unwrap();

    let hits = client.query(axis(8, 0), 5, &left).await.unwrap();
    let ids: Vec<&str> = hits.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec!["L"]);

    let empty = Namespace::new("nobody").unwrap();
    assert!(client.query(axis(8, 0), 5, &empty).await.unwrap().is_empty());
}

#[tokio::test]
async fn ranking_and_replacement() {
    let (_tmp, client) = fresh(8).await;
    let ns = Namespace::new("default").unwrap();
    let batch: Vec<IndexEntry> = (0..4).map(|i| entry(&format!("img{i}"), axis(8, i), "x")).collect();
    client.upsert(batch, &ns).await.unwrap();

    // each image is its own nearest neighbour
    for i in 0..4 {
        let hits = client.query(axis(8, i), 4, &ns).await.unwrap();
        assert_eq!(hits[0].id, format!("img{i}"));
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    // re-upserting an id replaces vector and metadata
    client.upsert(vec![entry("img0", axis(8, 7), "moved")], &ns).await.unwrap();
    let hits = client.query(axis(8, 7), 1, &ns).await.unwrap();
    assert_eq!(hits[0].id, "img0");
    assert_eq!(hits[0].metadata.get("name"), Some(&json!("moved")));
    assert_eq!(client.query(axis(8, 1), 10, &ns).await.unwrap().len(), 4);
}

#[tokio::test]
async fn create_twice_fails_and_unknown_index_is_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let uri = tmp.path().to_string_lossy().to_string();
    let service = LanceIndexService::open(&uri).await.unwrap();

    VectorIndexClient::create_index(&service, "nli-search", 16, DistanceMetric::Euclidean).await.unwrap();
    let again = VectorIndexClient::create_index(&service, "nli-search", 16, DistanceMetric::Euclidean).await;
    assert!(matches!(again, Err(Error::IndexExists(_))));

    let spec = service.describe_index("nli-search").await.unwrap();
    assert_eq!((spec.dimension, spec.metric), (16, DistanceMetric::Euclidean));

    let missing = VectorIndexClient::connect(service, "other").await;
    assert!(matches!(missing, Err(Error::IndexNotFound(_))));
}

#[tokio::test]
async fn zero_k_is_rejected() {
    let (_tmp, client) = fresh(4).await;
    let ns = Namespace::new("test").unwrap();
    assert!(matches!(client.query(vec![0.5; 4], 0, &ns).await, Err(Error::InvalidArgument(_))));
}
