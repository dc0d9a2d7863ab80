//! Resumable download tests against a mock HTTP server

use std::time::Duration;

use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sema_bench::benchmarks::{DownloadError, DownloadOutcome, Downloader};
use sema_bench::runner::RetryPolicy;

const PAYLOAD: &[u8] = b"[{\"question\": \"q\", \"answer\": \"a\"}]";

fn downloader() -> Downloader {
    Downloader::new()
        .unwrap()
        .with_retry(RetryPolicy::default().with_delays(Duration::ZERO, Duration::ZERO))
}

#[tokio::test]
async fn test_fresh_download_creates_parent_dirs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/train.json"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PAYLOAD))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("nested/train.json");
    let outcome = downloader()
        .download(&format!("{}/data/train.json", server.uri()), &destination)
        .await
        .unwrap();

    assert_eq!(outcome, DownloadOutcome::Downloaded { bytes: PAYLOAD.len() as u64 });
    assert_eq!(std::fs::read(&destination).unwrap(), PAYLOAD);
}

#[tokio::test]
async fn test_partial_file_is_resumed_with_range() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/dev.json"))
        .and(header("range", "bytes=4-"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(&PAYLOAD[4..]))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("dev.json");
    std::fs::write(&destination, &PAYLOAD[..4]).unwrap();

    let outcome = downloader()
        .download(&format!("{}/data/dev.json", server.uri()), &destination)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        DownloadOutcome::Resumed {
            from: 4,
            bytes: (PAYLOAD.len() - 4) as u64
        }
    );
    assert_eq!(std::fs::read(&destination).unwrap(), PAYLOAD);
}

#[tokio::test]
async fn test_range_ignored_by_server_rewrites_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/dev.json"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PAYLOAD))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("dev.json");
    std::fs::write(&destination, b"garbage").unwrap();

    let outcome = downloader()
        .download(&format!("{}/data/dev.json", server.uri()), &destination)
        .await
        .unwrap();

    assert_eq!(outcome, DownloadOutcome::Downloaded { bytes: PAYLOAD.len() as u64 });
    assert_eq!(std::fs::read(&destination).unwrap(), PAYLOAD);
}

#[tokio::test]
async fn test_unsatisfiable_range_means_complete() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data/test.json"))
        .respond_with(ResponseTemplate::new(416))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("test.json");
    std::fs::write(&destination, PAYLOAD).unwrap();

    let outcome = downloader()
        .download(&format!("{}/data/test.json", server.uri()), &destination)
        .await
        .unwrap();

    assert_eq!(outcome, DownloadOutcome::AlreadyComplete);
    assert_eq!(std::fs::read(&destination).unwrap(), PAYLOAD);
}

#[tokio::test]
async fn test_file_at_advertised_size_is_left_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/data/dev.json"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PAYLOAD))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data/dev.json"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PAYLOAD))
        .expect(0)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("dev.json");
    std::fs::write(&destination, PAYLOAD).unwrap();

    let outcome = downloader()
        .download(&format!("{}/data/dev.json", server.uri()), &destination)
        .await
        .unwrap();

    assert_eq!(outcome, DownloadOutcome::AlreadyComplete);
    assert_eq!(std::fs::read(&destination).unwrap(), PAYLOAD);
}

#[tokio::test]
async fn test_file_shorter_than_advertised_size_is_resumed() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/data/dev.json"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PAYLOAD))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data/dev.json"))
        .and(header("range", "bytes=10-"))
        .respond_with(ResponseTemplate::new(206).set_body_bytes(&PAYLOAD[10..]))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("dev.json");
    std::fs::write(&destination, &PAYLOAD[..10]).unwrap();

    let outcome = downloader()
        .download(&format!("{}/data/dev.json", server.uri()), &destination)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        DownloadOutcome::Resumed {
            from: 10,
            bytes: (PAYLOAD.len() - 10) as u64
        }
    );
    assert_eq!(std::fs::read(&destination).unwrap(), PAYLOAD);
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky.json"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky.json"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(PAYLOAD))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let destination = dir.path().join("flaky.json");
    let outcome = downloader()
        .download(&format!("{}/flaky.json", server.uri()), &destination)
        .await
        .unwrap();

    assert!(matches!(outcome, DownloadOutcome::Downloaded { .. }));
    assert_eq!(std::fs::read(&destination).unwrap(), PAYLOAD);
}

#[tokio::test]
async fn test_missing_file_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.json"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let err = downloader()
        .download(&format!("{}/gone.json", server.uri()), &dir.path().join("gone.json"))
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::Status { status: 404, .. }), "{}", err);
    assert!(!dir.path().join("gone.json").exists());
}
