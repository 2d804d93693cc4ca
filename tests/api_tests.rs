//! Integration tests for the songlike HTTP API
//!
//! Drives the router directly through `tower::ServiceExt::oneshot`.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use songlike::loader::build_catalog;
use songlike::server::{create_router, AppState};
use songlike::{RecommendEngine, Row, StaticSource, TableSource, MAX_TITLE_CHARS};

fn song_row(title: &str, artist: &str, tempo: f64, energy: f64, instrumentalness: f64) -> Row {
    json!({
        "TRACK_NAME": title,
        "TRACK_ARTIST": artist,
        "TEMPO": tempo,
        "LOUDNESS": -7.0,
        "TRACK_POPULARITY": 50,
        "DANCEABILITY": 0.5,
        "ENERGY": energy,
        "LIVENESS": 0.1,
        "INSTRUMENTALNESS": instrumentalness
    })
    .as_object()
    .unwrap()
    .clone()
}

fn songs() -> Vec<Row> {
    vec![
        song_row("Fast Lane", "Racers", 170.0, 0.95, 0.0),
        song_row("Faster Lane", "Racers", 168.0, 0.9, 0.05),
        song_row("Slow Dance", "Ballads", 70.0, 0.2, 0.1),
        song_row("Quiet Piano", "Ballads", 65.0, 0.1, 0.95),
        song_row("Faster Lane", "Racers", 168.0, 0.9, 0.05),
    ]
}

/// Test helper to create a router over static tables
fn setup_app(with_engine: bool) -> axum::Router {
    let source = StaticSource::new()
        .with_table("spotify_songs", songs())
        .with_table("empty_table", vec![]);
    let engine = with_engine.then(|| RecommendEngine::new(build_catalog(songs()).catalog));
    let source: Arc<dyn TableSource> = Arc::new(source);
    let state = AppState::new(
        source,
        ["spotify_songs".to_string(), "empty_table".to_string(), "ghost_table".to_string()],
        engine,
    );
    create_router(state)
}

async fn make_request(
    app: &axum::Router,
    method: Method,
    path: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(path);
    if body.is_some() {
        request = request.header("content-type", "application/json");
    }
    let request = match body {
        Some(json_body) => request.body(Body::from(json_body.to_string())).unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn test_home_and_health() {
    let app = setup_app(true);

    let (status, body) = make_request(&app, Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("/get_data/<table_name>"));

    let (status, body) = make_request(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["catalog_songs"], 4);
}

#[tokio::test]
async fn test_get_data_returns_rows() {
    let app = setup_app(true);
    let (status, body) = make_request(&app, Method::GET, "/get_data/spotify_songs", None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0]["TRACK_NAME"], "Fast Lane");
}

#[tokio::test]
async fn test_get_data_rejects_unlisted_table() {
    let app = setup_app(true);
    let (status, body) = make_request(&app, Method::GET, "/get_data/users", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Unauthorized access to table");
}

#[tokio::test]
async fn test_get_data_empty_table() {
    let app = setup_app(true);
    let (status, body) = make_request(&app, Method::GET, "/get_data/empty_table", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "No data found in the table.");
}

#[tokio::test]
async fn test_get_data_source_failure() {
    let app = setup_app(true);
    let (status, body) = make_request(&app, Method::GET, "/get_data/ghost_table", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("An unexpected error occurred"));
    assert_eq!(body["details"], "source: static");
}

#[tokio::test]
async fn test_recommend_exact_title() {
    let app = setup_app(true);
    let (status, body) = make_request(
        &app,
        Method::POST,
        "/recommend",
        Some(json!({"title": "fast lane", "n": 2})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query"], "Fast Lane");
    assert!(body.get("corrected_from").is_none());
    let recs = body["recommendations"].as_array().unwrap();
    assert_eq!(recs.len(), 2);
    assert_eq!(recs[0]["title"], "Faster Lane");
    assert_eq!(recs[0]["artist"], "Racers");
    assert!(recs[0].get("score").is_none());
}

#[tokio::test]
async fn test_recommend_explain_includes_scores() {
    let app = setup_app(true);
    let (status, body) = make_request(
        &app,
        Method::POST,
        "/recommend",
        Some(json!({"title": "Quiet Piano", "explain": true, "weights": {"INSTRUMENTALNESS": 10}})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let recs = body["recommendations"].as_array().unwrap();
    assert_eq!(recs.len(), 3);
    let scores: Vec<f64> = recs.iter().map(|r| r["score"].as_f64().unwrap()).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn test_recommend_misspelled_title() {
    let app = setup_app(true);

    let (status, body) = make_request(
        &app,
        Method::POST,
        "/recommend",
        Some(json!({"title": "Slow Dence"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Song 'Slow Dence' not found in the dataset.");
    assert_eq!(body["suggestion"]["title"], "Slow Dance");

    let (status, body) = make_request(
        &app,
        Method::POST,
        "/recommend",
        Some(json!({"title": "Slow Dence", "auto_correct": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query"], "Slow Dance");
    assert_eq!(body["corrected_from"], "Slow Dence");
}

#[tokio::test]
async fn test_recommend_rejects_bad_input() {
    let app = setup_app(true);

    let (status, body) = make_request(
        &app,
        Method::POST,
        "/recommend",
        Some(json!({"title": "Fast Lane", "weights": {"ENERGY": -1}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid weights");
    assert!(body["details"].as_str().unwrap().contains("ENERGY"));

    let (status, _) = make_request(
        &app,
        Method::POST,
        "/recommend",
        Some(json!({"title": "Fast Lane", "n": 0})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = make_request(
        &app,
        Method::POST,
        "/recommend",
        Some(json!({"title": "Fast Lane", "weights": {"BPM": 3}})),
    )
    .await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_recommend_with_extreme_weights() {
    let app = setup_app(true);
    let mut rankings = Vec::new();
    for w in [1.0, 1e200, 1e-200] {
        let weights: serde_json::Map<String, Value> = [
            "TEMPO",
            "LOUDNESS",
            "TRACK_POPULARITY",
            "DANCEABILITY",
            "ENERGY",
            "LIVENESS",
            "INSTRUMENTALNESS",
        ]
        .iter()
        .map(|f| (f.to_string(), json!(w)))
        .collect();
        let (status, body) = make_request(
            &app,
            Method::POST,
            "/recommend",
            Some(json!({"title": "Fast Lane", "weights": weights})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        rankings.push(body["recommendations"].clone());
    }
    assert_eq!(rankings[0][0]["title"], "Faster Lane");
    assert!(rankings.windows(2).all(|w| w[0] == w[1]));
}

#[tokio::test]
async fn test_overlong_title_rejected() {
    let app = setup_app(true);
    let title = "a".repeat(MAX_TITLE_CHARS + 1);

    let (status, body) = make_request(
        &app,
        Method::POST,
        "/recommend",
        Some(json!({"title": title, "auto_correct": true})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Title is too long");
    assert!(body["details"].as_str().unwrap().contains("257 characters"));

    let path = format!("/resolve?title={}", title);
    let (status, _) = make_request(&app, Method::GET, &path, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_gibberish_title_is_not_corrected() {
    let app = setup_app(true);

    let (status, body) = make_request(
        &app,
        Method::POST,
        "/recommend",
        Some(json!({"title": "xqzvwk", "auto_correct": true})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Song 'xqzvwk' not found in the dataset.");
    assert!(body.get("suggestion").is_none());

    let (status, _) = make_request(&app, Method::GET, "/resolve?title=xqzvwk", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_recommend_without_catalog() {
    let app = setup_app(false);
    let (status, _) = make_request(
        &app,
        Method::POST,
        "/recommend",
        Some(json!({"title": "Fast Lane"})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    // The table proxy still works
    let (status, _) = make_request(&app, Method::GET, "/get_data/spotify_songs", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_resolve() {
    let app = setup_app(true);

    let (status, body) =
        make_request(&app, Method::GET, "/resolve?title=QUIET%20PIANO", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Quiet Piano");
    assert_eq!(body["exact"], true);
    assert_eq!(body["score"], 100);

    let (status, body) = make_request(&app, Method::GET, "/resolve?title=quiet%20pino", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Quiet Piano");
    assert_eq!(body["exact"], false);
}
