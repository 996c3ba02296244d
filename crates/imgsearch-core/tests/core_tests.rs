use std::collections::BTreeMap;

use imgsearch_core::batch::{chunked, non_zero};
use imgsearch_core::config::{Config, IndexBackend};
use imgsearch_core::partition::{partition, RejectReason, Rejection};
use imgsearch_core::types::{DistanceMetric, ImageFormat, ImageMetadata, ImageSourceKind, IndexSpec, Namespace};
use imgsearch_core::Error;

fn sample_metadata() -> ImageMetadata {
    ImageMetadata {
        id: "img-1".to_string(),
        name: "beach.jpg".to_string(),
        source: ImageSourceKind::LocalFileSystem,
        image_height: 480,
        image_width: 640,
        file_type: ImageFormat::Jpeg,
        file_size: 12_345,
        local_file_path: Some("/photos/beach.jpg".to_string()),
        external_ref: None,
        extra: BTreeMap::new(),
    }
}

#[test]
fn chunk_counts_and_order() {
    for (n, c) in [(0usize, 3usize), (1, 3), (3, 3), (7, 3), (250, 100), (10, 1)] {
        let items: Vec<usize> = (0..n).collect();
        let chunks: Vec<Vec<usize>> = chunked(items.clone(), non_zero(c)).collect();
        assert_eq!(chunks.len(), n.div_ceil(c), "n={n} c={c}");
        for (i, chunk) in chunks.iter().enumerate() {
            if i + 1 < chunks.len() { assert_eq!(chunk.len(), c); }
            assert!(!chunk.is_empty() && chunk.len() <= c);
        }
        let flat: Vec<usize> = chunks.into_iter().flatten().collect();
        assert_eq!(flat, items, "concatenation reproduces the input");
    }
}

#[test]
fn chunking_pulls_source_once() {
    let mut pulled = 0usize;
    let source = std::iter::from_fn(|| {
        pulled += 1;
        if pulled <= 5 { Some(pulled) } else { None }
    });
    let sizes: Vec<usize> = chunked(source, non_zero(2)).map(|c| c.len()).collect();
    assert_eq!(sizes, vec![2, 2, 1]);
}

#[test]
fn partition_keeps_both_sides_in_order() {
    let out = partition(vec![1, 2, 3, 4, 5], |n| {
        if n % 2 == 0 { Err(Rejection::new(n.to_string(), RejectReason::NotAnImage)) } else { Ok(n * 10) }
    });
    assert_eq!(out.accepted, vec![10, 30, 50]);
    let items: Vec<&str> = out.rejected.iter().map(|r| r.item.as_str()).collect();
    assert_eq!(items, vec!["2", "4"]);
}

#[test]
fn metadata_serializes_flat_with_extras() {
    let mut meta = sample_metadata();
    meta.extra.insert("album".into(), serde_json::json!("summer"));
    let map = meta.to_json().expect("json");
    assert_eq!(map["file_type"], "JPEG");
    assert_eq!(map["source"], "local_file_system");
    assert_eq!(map["image_width"], 640);
    assert_eq!(map["album"], "summer");
    assert!(!map.contains_key("external_ref"));

    let back: ImageMetadata = serde_json::from_value(serde_json::Value::Object(map)).expect("parse");
    assert_eq!(back, meta);
}

#[test]
fn metadata_validation_rejects_incomplete_records() {
    assert!(sample_metadata().validated().is_ok());

    let mut no_ref = sample_metadata();
    no_ref.local_file_path = None;
    assert!(matches!(no_ref.validated(), Err(Error::Metadata(_))));

    let mut zero = sample_metadata();
    zero.image_width = 0;
    assert!(matches!(zero.validated(), Err(Error::Metadata(_))));

    let mut blank = sample_metadata();
    blank.id = "  ".into();
    assert!(matches!(blank.validated(), Err(Error::Metadata(_))));
}

#[test]
fn namespace_and_index_spec_validation() {
    assert!(Namespace::new("").is_err());
    assert_eq!(Namespace::new("barekind").expect("ns").as_str(), "barekind");
    assert!(matches!(IndexSpec::new("nli-search", 0, DistanceMetric::Cosine), Err(Error::Config(_))));
    let too_wide = i32::MAX as usize + 1;
    assert!(matches!(IndexSpec::new("nli-search", too_wide, DistanceMetric::Cosine), Err(Error::Config(_))));
    assert!(IndexSpec::new("nli-search", i32::MAX as usize, DistanceMetric::Cosine).is_ok());
    assert_eq!("dot".parse::<DistanceMetric>().expect("metric"), DistanceMetric::Dotproduct);
    assert!("manhattan".parse::<DistanceMetric>().is_err());
}

#[test]
fn config_layers_file_and_env() {
    figment::Jail::expect_with(|jail| {
        jail.clear_env();
        jail.set_env("RUST_ENV", "test");
        jail.create_file(
            "config.toml",
            r#"
            [source]
            batch_size = 4

            [index]
            name = "photos"
            backend = "http"
            "#,
        )?;
        jail.create_file("config.test.toml", "[index]\nnamespace = \"tests\"\n")?;
        jail.set_env("APP_INDEX__API_KEY", "secret");

        let settings = Config::load().map_err(|e| e.to_string())?.settings().map_err(|e| e.to_string())?;
        assert_eq!(settings.source.batch_size, 4);
        assert_eq!(settings.source.temp_quality, 95);
        assert_eq!(settings.index.name, "photos");
        assert_eq!(settings.index.namespace, "tests");
        assert_eq!(settings.index.dimension, 512);
        assert_eq!(settings.index.backend, IndexBackend::Http);
        assert_eq!(settings.index.require_api_key().map_err(|e| e.to_string())?, "secret");
        Ok(())
    });
}

#[test]
fn missing_api_key_is_a_config_error() {
    figment::Jail::expect_with(|jail| {
        jail.clear_env();
        let settings = Config::load().map_err(|e| e.to_string())?.settings().map_err(|e| e.to_string())?;
        assert!(matches!(settings.index.require_api_key(), Err(Error::Config(_))));
        Ok(())
    });
}

#[test]
fn zero_batch_size_fails_validation() {
    figment::Jail::expect_with(|jail| {
        jail.clear_env();
        jail.set_env("APP_SOURCE__BATCH_SIZE", "0");
        let config = Config::load().map_err(|e| e.to_string())?;
        assert!(matches!(config.settings(), Err(Error::Config(_))));
        Ok(())
    });
}
