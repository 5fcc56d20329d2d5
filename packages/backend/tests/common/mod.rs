#![allow(dead_code)]

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use savant_backend::config::Config;
use savant_backend::services::study::StudyService;
use savant_backend::state::AppState;
use savant_backend::store::Store;

pub fn test_config() -> Config {
    Config::default()
}

pub fn create_test_app() -> Router {
    let state = AppState::new(StudyService::new(Store::memory(), test_config()));
    savant_backend::create_app(state)
}

/// Photosynthesis chain: light -> chlorophyll -> photosynthesis, plus an
/// independent node.
pub fn biology_graph() -> Value {
    json!({
        "id": "bio",
        "title": "Biologie végétale",
        "created_at": "2024-05-01T08:00:00Z",
        "source_text": "Les plantes...",
        "nodes": [
            {
                "id": "light",
                "label": "Lumière",
                "description": "Énergie lumineuse",
                "content_atoms": ["La lumière fournit l'énergie", "Le spectre visible"],
                "prerequisites": [],
                "difficulty_weight": 1
            },
            {
                "id": "chlorophyll",
                "label": "Chlorophylle",
                "description": "Pigment vert",
                "content_atoms": ["La chlorophylle absorbe le rouge et le bleu"],
                "prerequisites": ["light"],
                "difficulty_weight": 2
            },
            {
                "id": "photosynthesis",
                "label": "Photosynthèse",
                "description": "Production de glucose",
                "content_atoms": ["CO2 + H2O donnent du glucose", "Libère de l'O2", "A lieu dans le chloroplaste"],
                "prerequisites": ["chlorophyll"],
                "difficulty_weight": 3
            },
            {
                "id": "roots",
                "label": "Racines",
                "description": "Absorption de l'eau",
                "content_atoms": ["Les racines absorbent l'eau"],
                "prerequisites": [],
                "difficulty_weight": 1
            }
        ]
    })
}

pub fn flashcard(id: &str, node_id: &str) -> Value {
    json!({
        "id": id,
        "type": "flashcard",
        "question": format!("Question about {node_id}"),
        "answer": "An answer",
        "difficulty": 2,
        "sm2": {"interval": 0, "repetitions": 0, "efactor": 2.5},
        "lastReviewedAt": null,
        "nextReviewAt": null,
        "sourceNodeId": node_id
    })
}

pub async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, _, text) = send_raw(app, method, uri, body.map(|b| b.to_string())).await;
    let value = if text.is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).unwrap()
    };
    (status, value)
}

pub async fn send_raw(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<String>,
) -> (StatusCode, HeaderMap, String) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let request = builder.body(body.map(Body::from).unwrap_or_else(Body::empty)).unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Method::GET, uri, None).await
}

pub async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    send(app, Method::POST, uri, Some(body)).await
}

/// Imports the biology graph and one flashcard per node.
pub async fn seeded_app() -> Router {
    let app = create_test_app();
    let (status, _) = post(&app, "/api/graphs", biology_graph()).await;
    assert_eq!(status, StatusCode::OK);

    let items = json!([
        flashcard("card-light", "light"),
        flashcard("card-chloro", "chlorophyll"),
        flashcard("card-photo", "photosynthesis"),
        flashcard("card-roots", "roots"),
    ]);
    let (status, body) = post(&app, "/api/graphs/bio/items", items).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stored"], 4);
    app
}
