//! Loads a corpus from disk and searches it through a mocked embedding API.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use pr_context_corpus::{CorpusStore, CorpusWriter, PrRecord, build_text};
use pr_context_server::search::render_outcome;
use pr_context_server::{EmbeddingConfig, SearchQuery, SearchService};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn record(repo: &str, pr_id: u64, title: &str, embedding: Vec<f32>) -> PrRecord {
    let created_at = Utc.with_ymd_and_hms(2024, 1, 10, 8, 0, 0).unwrap();
    PrRecord {
        domain: "github.com".to_string(),
        org: "acme".to_string(),
        repo: repo.to_string(),
        pr_id,
        title: title.to_string(),
        body: String::new(),
        author: "octocat".to_string(),
        created_at,
        merged: false,
        merged_at: None,
        state: "open".to_string(),
        comments: Vec::new(),
        files: Vec::new(),
        embedding,
        text: build_text(title, "", &[] as &[&str]),
    }
}

async fn write_corpus(dir: &TempDir) -> std::path::PathBuf {
    let output = dir.path().join("prs.jsonl");
    let mut writer = CorpusWriter::create(&output).await.unwrap();
    for record in [
        record("widgets", 10, "Speed up cache", vec![0.9, 0.1, 0.0]),
        record("widgets", 11, "Docs typo", vec![0.0, 0.0, 1.0]),
        record("widgets", 12, "Cache eviction", vec![1.0, 0.0, 0.0]),
        record("gadgets", 13, "Cache layer", vec![1.0, 0.0, 0.0]),
        record("widgets", 14, "Unembedded", Vec::new()),
    ] {
        writer.append(&record).await.unwrap();
    }
    writer.commit().await.unwrap();
    output
}

fn embedding_body(embedding: &[f32]) -> serde_json::Value {
    json!({
        "object": "list",
        "data": [{"object": "embedding", "index": 0, "embedding": embedding}],
        "model": "text-embedding-3-small",
        "usage": {"prompt_tokens": 5, "total_tokens": 5}
    })
}

async fn service(server: &MockServer, dir: &TempDir) -> SearchService {
    let store = CorpusStore::load(write_corpus(dir).await).await.unwrap();
    let config = EmbeddingConfig {
        base_url: server.uri(),
        api_key: Some("sk-test".to_string()),
        ..EmbeddingConfig::default()
    };
    SearchService::new(Arc::new(store), Arc::new(config.provider()))
        .with_embed_timeout(config.timeout())
}

#[tokio::test]
async fn test_search_ranks_loaded_corpus() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "input": "Title: Cache bug\nBody: stale reads\nsrc/cache.rs\nsrc/lib.rs"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(embedding_body(&[1.0, 0.0, 0.0])))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let svc = service(&server, &dir).await;
    let query = SearchQuery {
        url: "https://github.com/acme/widgets/pull/77".to_string(),
        title: "Cache bug".to_string(),
        body: "stale reads".to_string(),
        files: vec!["src/cache.rs".to_string(), "src/lib.rs".to_string()],
    };

    let matches = svc.search(&query).await.unwrap();

    let urls: Vec<&str> = matches.iter().map(|m| m.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://github.com/acme/widgets/pull/12",
            "https://github.com/acme/widgets/pull/10",
            "https://github.com/acme/widgets/pull/11",
        ]
    );
}

#[tokio::test]
async fn test_provider_error_keeps_serving() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(embedding_body(&[0.0, 0.0, 1.0])))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let svc = service(&server, &dir).await;
    let query = SearchQuery {
        url: "https://github.com/acme/widgets".to_string(),
        title: "Fix docs".to_string(),
        ..SearchQuery::default()
    };

    let first = svc.search(&query).await;
    let message = render_outcome(&first).unwrap_err();
    assert!(message.starts_with("search failed"), "{message}");

    let second = svc.search(&query).await.unwrap();
    assert_eq!(second[0].title, "Docs typo");
}
