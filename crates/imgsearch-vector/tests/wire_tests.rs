use serde_json::{json, Map};

use imgsearch_core::config::IndexSettings;
use imgsearch_core::error::Error;
use imgsearch_core::types::{DistanceMetric, IndexEntry};
use imgsearch_vector::http::{CreateIndexRequest, QueryBody, QueryResponse, Serverless, ServerlessSpec, UpsertBody};
use imgsearch_vector::HttpIndexService;

#[test]
fn query_body_uses_camel_case_flags() {
    let vector = [0.5f32, 0.25];
    let body = QueryBody { vector: &vector, top_k: 3, namespace: "test", include_metadata: true, include_values: false };
    assert_eq!(
        serde_json::to_value(&body).unwrap(),
        json!({"vector": [0.5, 0.25], "topK": 3, "namespace": "test", "includeMetadata": true, "includeValues": false})
    );
}

#[test]
fn upsert_and_create_bodies() {
    let mut metadata = Map::new();
    metadata.insert("name".into(), json!("cat.jpg"));
    let vectors = vec![IndexEntry { id: "a".into(), values: vec![1.0], metadata }];
    let body = UpsertBody { vectors: &vectors, namespace: "default" };
    assert_eq!(
        serde_json::to_value(&body).unwrap(),
        json!({"vectors": [{"id": "a", "values": [1.0], "metadata": {"name": "cat.jpg"}}], "namespace": "default"})
    );

    let create = CreateIndexRequest {
        name: "nli-search".into(),
        dimension: 512,
        metric: DistanceMetric::Cosine,
        spec: ServerlessSpec { serverless: Serverless { cloud: "aws".into(), region: "us-west-2".into() } },
    };
    assert_eq!(
        serde_json::to_value(&create).unwrap(),
        json!({"name": "nli-search", "dimension": 512, "metric": "cosine",
               "spec": {"serverless": {"cloud": "aws", "region": "us-west-2"}}})
    );
}

#[test]
fn query_response_tolerates_extra_fields() {
    let raw = r#"{"matches":[{"id":"x","score":0.8,"values":[],"metadata":{"name":"x.png"}},{"id":"y","score":0.1}],"namespace":"test"}"#;
    let parsed: QueryResponse = serde_json::from_str(raw).unwrap();
    assert_eq!(parsed.matches.len(), 2);
    assert_eq!(parsed.matches[0].metadata["name"], "x.png");
    assert!(parsed.matches[1].metadata.is_empty());
}

#[test]
fn missing_api_key_is_a_config_error() {
    let settings = IndexSettings::default();
    assert!(matches!(HttpIndexService::from_settings(&settings), Err(Error::Config(_))));

    let settings = IndexSettings { api_key: Some("  ".into()), ..Default::default() };
    assert!(matches!(HttpIndexService::from_settings(&settings), Err(Error::Config(_))));

    let settings = IndexSettings { api_key: Some("secret".into()), ..Default::default() };
    assert!(HttpIndexService::from_settings(&settings).is_ok());
}
