use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use std::path::Path;
use tempfile::tempdir;
use termdex::{index_documents, Document, IndexConfig, StandardAnalyzer};
use tower::ServiceExt;

fn build_tiny_index(dir: &Path) -> String {
    let docs = vec![
        Document::new("doc0", "Rust is great. Rust systems programming."),
        Document::new("doc1", "Learning rust."),
    ];
    let config = IndexConfig { partitions: 2, apply_stemming: false, compressor: "gzip".into(), ..IndexConfig::new(dir) };
    let (_, meta_path) = index_documents(&config, &StandardAnalyzer::new(), &docs).unwrap();
    meta_path.to_string_lossy().to_string()
}

async fn call(app: Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::get(uri).body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

#[tokio::test]
async fn term_vector_is_served() {
    let dir = tempdir().unwrap();
    let app = server::open_app(&build_tiny_index(dir.path()), 8).unwrap();

    let (status, json) = call(app, "/termvector/rust").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["term"], "rust");
    assert_eq!(json["total_term_freq"], 3);
    assert_eq!(json["postings"]["doc0"]["term_freq"], 2);
    assert_eq!(json["postings"]["doc0"]["positions"], serde_json::json!([1, 3]));
    assert_eq!(json["postings"]["doc1"]["positions"], serde_json::json!([2]));
}

#[tokio::test]
async fn missing_term_and_document_are_404() {
    let dir = tempdir().unwrap();
    let app = server::open_app(&build_tiny_index(dir.path()), 8).unwrap();

    let (status, json) = call(app.clone(), "/termvector/python").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("python"));

    let (status, _) = call(app, "/doc/doc9/length").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stats_and_lengths_are_served() {
    let dir = tempdir().unwrap();
    let app = server::open_app(&build_tiny_index(dir.path()), 8).unwrap();

    let (status, json) = call(app.clone(), "/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_documents"], 2);
    // doc0: rust great rust systems programming; doc1: learning rust
    assert_eq!(json["vocabulary_size"], 5);
    assert_eq!(json["average_document_length"], 3.5);
    assert_eq!(json["compressor"], "gzip");

    let (status, json) = call(app.clone(), "/doc/doc0/length").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["length"], 5);

    let (_, json) = call(app, "/docs").await;
    assert_eq!(json, serde_json::json!(["doc0", "doc1"]));
}

#[test]
fn cache_capacity_comes_from_config_unless_overridden() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("termdex.json");
    std::fs::write(&path, r#"{"cache_capacity": 42}"#).unwrap();
    assert_eq!(server::reader_config(Some(&path), None).unwrap().cache_capacity(), 42);
    assert_eq!(server::reader_config(Some(&path), Some(7)).unwrap().cache_capacity(), 7);
    assert_eq!(server::reader_config(None, None).unwrap().cache_capacity(), 10_000);
    assert!(server::reader_config(Some(&dir.path().join("missing.json")), None).is_err());
}
