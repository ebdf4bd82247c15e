//! Full pipeline against a scripted page, a fake image host and a fake Ollama.

mod common;

use common::*;
use phai_lib::config::InferenceConfig;
use phai_lib::error::PhaiError;
use phai_lib::scan::describe::{DESCRIPTION_UNAVAILABLE, NO_DESCRIPTION};
use phai_lib::scan::fetch::PREALLOCATE_LIMIT;
use phai_lib::scan::{
    DescribeInputs, DescriptionService, HttpImageFetcher, ImageFetcher, OllamaClient,
    Orchestrator, ScanState,
};
use phai_lib::view::BrowsingSession;
use serde_json::json;
use std::sync::Arc;
use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

fn ollama_config(server: &MockServer) -> InferenceConfig {
    InferenceConfig {
        endpoint: server.uri(),
        model: "llava:7b".into(),
        timeout_seconds: 5,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_sunset_photo_end_to_end() {
    let images = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path_regex(r"^/img/abc=w\d+-h\d+-no$"))
        .and(matchers::query_param("authuser", "0"))
        .and(matchers::header("cookie", "SID=secret; HSID=x"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"IMG".to_vec()))
        .expect(1)
        .mount(&images)
        .await;

    let ollama = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/api/generate"))
        .and(matchers::body_partial_json(json!({
            "model": "llava:7b",
            "prompt": "Describe it",
            // reference first, subject last
            "images": ["UkVG", "SU1H"],
            "stream": false
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "response": "A sunset over water", "done": true })),
        )
        .expect(1)
        .mount(&ollama)
        .await;

    let mut photo = MockPhoto::new("abc", &images.uri());
    photo.details = vec![("Taken".into(), "Jan 1, 2024".into())];
    let view = Arc::new(MockView::with_photos(vec![photo]));
    view.page.lock().session = BrowsingSession {
        cookie_header: Some("SID=secret; HSID=x".into()),
        user_agent: Some("Mozilla/5.0 test".into()),
    };

    let state = Arc::new(ScanState::new());
    let inputs = DescribeInputs {
        prompt: "Describe it".into(),
        reference: Some(b"REF".to_vec()),
    };
    Orchestrator::new(
        view,
        Arc::new(HttpImageFetcher::new()),
        state.clone(),
        fast_scan_config(1),
    )
    .with_describer(Arc::new(OllamaClient::new(&ollama_config(&ollama))), inputs)
    .run()
    .await
    .unwrap();

    let records = state.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.sequence_number, 1);
    assert_eq!(record.details[0].get("Taken"), Some("Jan 1, 2024"));

    let image = record.image.as_ref().unwrap();
    assert_eq!(image.id, "abc");
    assert!((1000..=1100).contains(&image.width));
    assert_eq!(image.height, image.width / 2);
    assert!(image.source_url.starts_with(&format!("{}/img/abc=w", images.uri())));
    assert_eq!(image.bytes.as_deref(), Some(&b"IMG"[..]));
    assert_eq!(image.description.as_deref(), Some("A sunset over water"));
    assert!(record.structured.is_none());
}

// ---------------------------------------------------------------------------
// Image fetcher
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_fetch_replays_session_headers() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .and(matchers::path("/img/x=w10-h5-no"))
        .and(matchers::header("cookie", "SID=1"))
        .and(matchers::header("user-agent", "TestAgent/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
        .mount(&server)
        .await;

    let session = BrowsingSession {
        cookie_header: Some("SID=1".into()),
        user_agent: Some("TestAgent/1.0".into()),
    };
    let bytes = HttpImageFetcher::new()
        .fetch(&format!("{}/img/x=w10-h5-no?authuser=0", server.uri()), &session)
        .await
        .unwrap();
    assert_eq!(bytes, vec![7u8; 4096]);
}

#[tokio::test]
async fn test_fetch_body_larger_than_preallocation() {
    let body = vec![3u8; PREALLOCATE_LIMIT as usize + 4096];
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&server)
        .await;

    let bytes = HttpImageFetcher::new()
        .fetch(&format!("{}/img/big", server.uri()), &BrowsingSession::default())
        .await
        .unwrap();
    assert_eq!(bytes.len(), body.len());
    assert_eq!(bytes, body);
}

#[tokio::test]
async fn test_fetch_non_success_is_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("GET"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = HttpImageFetcher::new()
        .fetch(&format!("{}/img/y", server.uri()), &BrowsingSession::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PhaiError::Fetch(_)));
}

// ---------------------------------------------------------------------------
// Description client
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_describe_server_error_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/api/generate"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
        .mount(&server)
        .await;

    let client = OllamaClient::new(&ollama_config(&server));
    assert!(matches!(
        client.generate(b"img", None, "p").await,
        Err(PhaiError::Inference(_))
    ));
    assert_eq!(client.describe(b"img", None, "p").await, DESCRIPTION_UNAVAILABLE);
}

#[tokio::test]
async fn test_describe_without_response_field() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .and(matchers::path("/api/generate"))
        .and(matchers::body_partial_json(json!({ "images": ["aW1n"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "done": true })))
        .mount(&server)
        .await;

    let client = OllamaClient::new(&ollama_config(&server));
    assert_eq!(client.describe(b"img", None, "p").await, NO_DESCRIPTION);
}

#[tokio::test]
async fn test_describe_unreachable_endpoint_is_unavailable() {
    let config = InferenceConfig {
        // Nothing listens on the discard port
        endpoint: "127.0.0.1:9".into(),
        timeout_seconds: 2,
        ..Default::default()
    };
    let client = OllamaClient::new(&config);
    assert_eq!(client.describe(b"img", None, "p").await, DESCRIPTION_UNAVAILABLE);
}

#[tokio::test]
async fn test_request_dump_is_written() {
    let server = MockServer::start().await;
    Mock::given(matchers::method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "response": "ok" })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let dump = dir.path().join("dumps").join("request.json");
    let config = InferenceConfig {
        dump_request: Some(dump.clone()),
        ..ollama_config(&server)
    };
    OllamaClient::new(&config)
        .describe(b"img", Some(b"ref"), "Describe")
        .await;

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&dump).unwrap()).unwrap();
    assert_eq!(written["prompt"], "Describe");
    assert_eq!(written["images"], json!(["cmVm", "aW1n"]));
}
