// HTTP surface tests: status codes and bodies for every recorder outcome.
#![cfg(feature = "server")]

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use vitals_sheet::{api, Cell, InMemoryStore, Recorder, RecorderConfig, Row, TabularStore};

fn app(store: &InMemoryStore) -> Router {
    let store: Arc<dyn TabularStore> = Arc::new(store.clone());
    api::router(Arc::new(Recorder::new(store, RecorderConfig::default())))
}

fn reading(date: &str, time: &str, sys: i64, dia: i64) -> Row {
    vec![date.into(), time.into(), Cell::from(sys), Cell::from(dia)]
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_get_returns_entries() {
    let store = InMemoryStore::new().with_table("dad", vec![reading("2024-01-01", "AM", 120, 80)]);

    let (status, body) = send(app(&store), get("/records?name=dad")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([{"date": "2024-01-01", "time": "AM", "sys": 120, "dia": 80}])
    );
}

#[tokio::test]
async fn test_get_empty_table_is_empty_array() {
    let store = InMemoryStore::new();
    let (status, body) = send(app(&store), get("/records?name=dad")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_get_uses_default_category_and_limit() {
    let rows = (1..=12)
        .map(|day| reading(&format!("2024-01-{:02}", day), "AM", 120, 80))
        .collect();
    let store = InMemoryStore::new().with_table("爸爸", rows);

    let (status, body) = send(app(&store), get("/api/records")).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 10);
    assert_eq!(entries[0]["date"], "2024-01-03");
    assert_eq!(entries[9]["date"], "2024-01-12");

    let (_, body) = send(app(&store), get("/api/records?limit=all")).await;
    assert_eq!(body.as_array().unwrap().len(), 12);
}

#[tokio::test]
async fn test_get_encoded_category_name() {
    let store = InMemoryStore::new().with_table("媽媽", vec![reading("2024-01-01", "PM", 118, 79)]);
    let uri = format!("/records?name={}", urlencoding::encode("媽媽"));

    let (status, body) = send(app(&store), get(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["time"], "PM");
}

#[tokio::test]
async fn test_get_rejects_bad_limit() {
    let store = InMemoryStore::new();
    let (status, body) = send(app(&store), get("/records?limit=lots")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_get_read_failure_is_500_with_details() {
    let store = InMemoryStore::new();
    store.set_fail_reads(true);

    let (status, body) = send(app(&store), get("/records?name=dad")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "failed to read records");
    assert!(body["details"].as_str().unwrap().contains("injected read failure"));
}

#[tokio::test]
async fn test_post_records_entry() {
    let store = InMemoryStore::new();
    let payload = json!({"name": "dad", "date": "2024-01-01", "time": "AM", "sys": 120, "dia": 80});

    let (status, body) = send(app(&store), post("/records", payload)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].is_string());
    assert_eq!(store.rows("dad"), vec![reading("2024-01-01", "AM", 120, 80)]);
}

#[tokio::test]
async fn test_post_accepts_numeric_time_slot() {
    let store = InMemoryStore::new();
    let payload = json!({"name": "dad", "date": "2024-01-01", "time": 8, "sys": 120, "dia": 80});

    let (status, _) = send(app(&store), post("/records", payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.rows("dad")[0][1], Cell::from(8));

    // Same slot written as text is the same slot
    let again = json!({"name": "dad", "date": "2024-01-01", "time": "8", "sys": 118, "dia": 79});
    let (status, _) = send(app(&store), post("/records", again)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(store.row_count("dad"), 1);
}

#[tokio::test]
async fn test_post_duplicate_is_409() {
    let store = InMemoryStore::new().with_table("dad", vec![reading("2024-01-01", "AM", 120, 80)]);
    let payload = json!({"name": "dad", "date": "2024-01-01", "time": "AM", "sys": 118, "dia": 79});

    let (status, body) = send(app(&store), post("/api/records", payload)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].is_string());
    assert_eq!(store.row_count("dad"), 1);
}

#[tokio::test]
async fn test_post_missing_field_is_400_without_store_calls() {
    let store = InMemoryStore::new();
    let payload = json!({"name": "dad", "time": "AM", "sys": 120, "dia": 80});

    let (status, body) = send(app(&store), post("/records", payload)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("date"));
    assert!(body.get("details").is_none());
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_post_malformed_json_is_400() {
    let store = InMemoryStore::new();
    let request = Request::builder()
        .method("POST")
        .uri("/records")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"name\": "))
        .unwrap();

    let (status, body) = send(app(&store), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "malformed record");
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_post_write_failure_is_500_with_details() {
    let store = InMemoryStore::new();
    store.set_fail_writes(true);
    let payload = json!({"name": "dad", "date": "2024-01-01", "time": "AM", "sys": 120, "dia": 80});

    let (status, body) = send(app(&store), post("/records", payload)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "failed to write record");
    assert!(body["details"].as_str().unwrap().contains("injected write failure"));
}

#[tokio::test]
async fn test_health() {
    let store = InMemoryStore::new();
    let (status, body) = send(app(&store), get("/api/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["backend"], "memory");
}

#[tokio::test]
async fn test_cors_headers_present() {
    let store = InMemoryStore::new();
    let request = Request::builder()
        .uri("/records")
        .header(header::ORIGIN, "https://example.com")
        .body(Body::empty())
        .unwrap();

    let response = app(&store).oneshot(request).await.unwrap();
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}
