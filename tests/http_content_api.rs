use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json as AxumJson, Router};
use selah_lib::application::ports::{BibleContentApi, ConnectivityProbe, RemoteVerse};
use selah_lib::infrastructure::connectivity::HttpConnectivityProbe;
use selah_lib::infrastructure::content::HttpBibleContentApi;
use selah_lib::shared::error::AppError;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

const API_KEY: &str = "test-key";

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("api-key")
        .and_then(|value| value.to_str().ok())
        == Some(API_KEY)
}

async fn books(Path(bible): Path<String>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    match bible.as_str() {
        "kjv" => AxumJson(json!({
            "data": [
                { "id": "GEN", "bibleId": "kjv", "abbreviation": "Gen", "name": "Genesis" },
                { "id": "EXO", "bibleId": "kjv", "name": "Exodus" }
            ]
        }))
        .into_response(),
        "busy" => StatusCode::TOO_MANY_REQUESTS.into_response(),
        "broken" => (StatusCode::OK, "not json").into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn chapters(Path((_bible, book)): Path<(String, String)>, headers: HeaderMap) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    AxumJson(json!({
        "data": [
            { "id": format!("{book}.intro"), "bookId": book, "number": "intro" },
            { "id": format!("{book}.1"), "bookId": book, "number": "1", "reference": "Genesis 1" },
            { "id": format!("{book}.2"), "bookId": book, "number": "2" }
        ]
    }))
    .into_response()
}

async fn chapter(
    Path((_bible, chapter)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if query.get("include-verse-numbers").map(String::as_str) != Some("true") {
        return StatusCode::BAD_REQUEST.into_response();
    }
    AxumJson(json!({
        "data": {
            "id": chapter,
            "bookId": "GEN",
            "reference": "Genesis 1",
            "content": "     [1] In the beginning God created the heaven and the earth.\n     [2] And the earth was without form, and void;  and darkness was upon the face of the deep."
        }
    }))
    .into_response()
}

async fn spawn_content_mock() -> (String, JoinHandle<()>) {
    let app = Router::new()
        .route("/v1/bibles/{bible}/books", get(books))
        .route("/v1/bibles/{bible}/books/{book}/chapters", get(chapters))
        .route("/v1/bibles/{bible}/chapters/{chapter}", get(chapter));

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind content mock");
    let addr = listener.local_addr().expect("content mock addr");
    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("serve content mock");
    });

    (format!("http://{addr}/v1/"), handle)
}

fn client(base_url: &str, key: Option<&str>) -> HttpBibleContentApi {
    HttpBibleContentApi::new(
        base_url,
        key.map(str::to_string),
        Duration::from_secs(5),
    )
    .expect("build client")
}

#[tokio::test]
async fn lists_books_with_abbreviation_fallback() {
    let (base_url, server) = spawn_content_mock().await;
    let api = client(&base_url, Some(API_KEY));

    let books = api.list_books("kjv").await.expect("books");
    assert_eq!(books.len(), 2);
    assert_eq!(books[0].abbreviation, "Gen");
    assert_eq!(books[1].abbreviation, "EXO");
    assert_eq!(books[1].name, "Exodus");

    server.abort();
}

#[tokio::test]
async fn intro_chapters_are_skipped() {
    let (base_url, server) = spawn_content_mock().await;
    let api = client(&base_url, Some(API_KEY));

    let chapters = api.list_chapters("kjv", "GEN").await.expect("chapters");
    let ids: Vec<_> = chapters.iter().map(|chapter| chapter.id.as_str()).collect();
    assert_eq!(ids, vec!["GEN.1", "GEN.2"]);
    assert_eq!(chapters[0].reference, "Genesis 1");
    assert_eq!(chapters[1].reference, "GEN 2");

    server.abort();
}

#[tokio::test]
async fn chapter_text_is_split_into_verses() {
    let (base_url, server) = spawn_content_mock().await;
    let api = client(&base_url, Some(API_KEY));

    let content = api.chapter_content("kjv", "GEN.1").await.expect("chapter");
    assert_eq!(content.reference, "Genesis 1");
    assert_eq!(
        content.verses,
        vec![
            RemoteVerse {
                number: 1,
                text: "In the beginning God created the heaven and the earth.".to_string(),
            },
            RemoteVerse {
                number: 2,
                text: "And the earth was without form, and void; and darkness was upon the face of the deep."
                    .to_string(),
            },
        ]
    );

    server.abort();
}

#[tokio::test]
async fn http_failures_map_to_app_errors() {
    let (base_url, server) = spawn_content_mock().await;

    let err = client(&base_url, None)
        .list_books("kjv")
        .await
        .expect_err("missing key");
    assert!(matches!(err, AppError::ConfigurationError(_)));

    let api = client(&base_url, Some(API_KEY));
    let err = api.list_books("unknown").await.expect_err("unknown bible");
    assert!(matches!(err, AppError::NotFound(_)));

    let err = api.list_books("busy").await.expect_err("rate limited");
    assert!(matches!(err, AppError::Network(_)));

    let err = api.list_books("broken").await.expect_err("bad body");
    assert!(matches!(err, AppError::DeserializationError(_)));

    server.abort();
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let err = client(&format!("http://{addr}"), Some(API_KEY))
        .list_books("kjv")
        .await
        .expect_err("connection refused");
    assert!(matches!(err, AppError::Network(_)));
}

#[tokio::test]
async fn connectivity_check_reports_reachability() {
    let (base_url, server) = spawn_content_mock().await;
    let probe = HttpConnectivityProbe::new(base_url, Duration::from_secs(2)).expect("probe");
    // 404 でも応答があればオンライン
    assert!(probe.check().await);

    server.abort();
    let _ = server.await;

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    let probe = HttpConnectivityProbe::new(format!("http://{addr}/"), Duration::from_secs(2))
        .expect("probe");
    assert!(!probe.check().await);
}
