//! HTTP document retrieval against a mock server.

use mockito::Server;
use quizgen_cache::context::{DocumentFetcher, HttpDocumentFetcher, SourceDocument};
use std::time::Duration;

fn document(url: Option<String>) -> SourceDocument {
    let doc = SourceDocument::new("cn-5a", "Ciencias Naturales 5", "Ciencias", "5A");
    match url {
        Some(url) => doc.with_url(url),
        None => doc,
    }
}

#[tokio::test]
async fn test_successful_fetch_returns_body() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/books/cn-5a.txt")
        .with_status(200)
        .with_header("content-type", "text/plain")
        .with_body("primera página\u{c}segunda página")
        .create_async()
        .await;

    let fetcher = HttpDocumentFetcher::with_timeout(Duration::from_secs(5)).unwrap();
    let body = fetcher
        .fetch(&document(Some(format!("{}/books/cn-5a.txt", server.url()))))
        .await
        .unwrap();
    assert_eq!(&body[..], "primera página\u{c}segunda página".as_bytes());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_error_status_is_absent() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/books/missing.txt")
        .with_status(404)
        .create_async()
        .await;

    let fetcher = HttpDocumentFetcher::with_timeout(Duration::from_secs(5)).unwrap();
    let body = fetcher
        .fetch(&document(Some(format!("{}/books/missing.txt", server.url()))))
        .await;
    assert!(body.is_none());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_document_without_url_is_absent() {
    let fetcher = HttpDocumentFetcher::with_timeout(Duration::from_secs(5)).unwrap();
    assert!(fetcher.fetch(&document(None)).await.is_none());
}

#[tokio::test]
async fn test_unreachable_host_is_absent() {
    let fetcher = HttpDocumentFetcher::with_timeout(Duration::from_millis(500)).unwrap();
    let body = fetcher
        .fetch(&document(Some("http://127.0.0.1:9/book.txt".to_string())))
        .await;
    assert!(body.is_none());
}
