use axum::extract::rejection::{JsonRejection, QueryRejection, StringRejection};
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use savant_algo::{KnowledgeGraph, PedagogicalDirective, ReviewMode, StudyItem, UserContext, MAX_QUALITY};

use crate::response::{ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(import_graph))
        .route("/:id", get(get_graph))
        .route("/:id/items", get(list_items).post(add_items))
        .route("/:id/items/fallback", post(generate_fallback))
        .route("/:id/reviews", post(record_review))
        .route("/:id/directive", post(plan_session))
        .route("/:id/queue", get(daily_queue))
        .route("/:id/due", get(due_items))
        .route("/:id/weak-nodes", get(weak_nodes))
        .route("/:id/progress", get(progress))
        .route("/:id/dashboard", get(dashboard))
        .route("/:id/export/anki", get(export_anki))
        .route("/:id/export/json", get(export_json))
        .route("/:id/import/json", post(import_json))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewRequest {
    item_id: String,
    quality: f64,
    mode: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DirectiveRequest {
    context: UserContext,
    /// Minutes; falls back to the context signals
    time_available: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct StoredItems {
    stored: usize,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::validation(rejection.body_text()))
}

fn query<T>(params: Result<Query<T>, QueryRejection>) -> Result<T, AppError> {
    params
        .map(|Query(value)| value)
        .map_err(|rejection| AppError::validation(rejection.body_text()))
}

async fn import_graph(
    State(state): State<AppState>,
    payload: Result<Json<KnowledgeGraph>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let graph = body(payload)?;
    let validated = state.study().import_graph(graph).await?;
    Ok(ok(validated))
}

async fn get_graph(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.study().graph(&id).await?))
}

async fn list_items(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.study().items(&id).await?))
}

async fn add_items(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<Vec<StudyItem>>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let items = body(payload)?;
    let stored = state.study().add_items(&id, items).await?;
    Ok(ok(StoredItems { stored }))
}

async fn generate_fallback(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<PedagogicalDirective>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let directive = body(payload)?;
    let items = state
        .study()
        .generate_fallback_items(&id, &directive, Utc::now())
        .await?;
    Ok(ok(items))
}

async fn record_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ReviewRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = body(payload)?;

    if !request.quality.is_finite() || !(0.0..=f64::from(MAX_QUALITY)).contains(&request.quality) {
        return Err(AppError::validation(format!(
            "quality must be between 0 and {MAX_QUALITY}"
        )));
    }
    let mode = match request.mode.as_deref() {
        None => None,
        Some(raw) => Some(
            ReviewMode::parse(raw)
                .ok_or_else(|| AppError::validation(format!("unknown review mode: {raw}")))?,
        ),
    };

    let outcome = state
        .study()
        .record_review(&id, &request.item_id, request.quality, mode, Utc::now())
        .await?;
    Ok(ok(outcome))
}

async fn plan_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<DirectiveRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = body(payload)?;
    let minutes = request
        .time_available
        .or_else(|| request.context.signals.as_ref().map(|s| s.time_available))
        .unwrap_or(0.0);

    let directive = state.study().plan_session(&id, &request.context, minutes).await?;
    Ok(ok(directive))
}

async fn daily_queue(
    State(state): State<AppState>,
    Path(id): Path<String>,
    params: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let LimitQuery { limit } = query(params)?;
    Ok(ok(state.study().daily_queue(&id, Utc::now(), limit).await?))
}

async fn due_items(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.study().due_items(&id, Utc::now()).await?))
}

async fn weak_nodes(
    State(state): State<AppState>,
    Path(id): Path<String>,
    params: Result<Query<LimitQuery>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let LimitQuery { limit } = query(params)?;
    Ok(ok(state.study().weak_nodes(&id, Utc::now(), limit).await?))
}

async fn progress(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.study().progress(&id).await?))
}

async fn dashboard(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, AppError> {
    Ok(ok(state.study().dashboard(&id, Utc::now()).await?))
}

async fn export_anki(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, AppError> {
    let graph = state.study().graph(&id).await?;
    let content = state.study().export_anki(&id).await?;
    let filename = format!("{}_anki.txt", attachment_stem(&graph.title));

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        content,
    ))
}

async fn export_json(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, AppError> {
    let graph = state.study().graph(&id).await?;
    let content = state.study().export_json(&id).await?;
    let filename = format!("{}.json", attachment_stem(&graph.title));

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        content,
    ))
}

async fn import_json(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<String, StringRejection>,
) -> Result<impl IntoResponse, AppError> {
    let raw = payload.map_err(|rejection| AppError::validation(rejection.body_text()))?;
    let set = state.study().import_json(&id, &raw, Utc::now()).await?;
    Ok(ok(set))
}

/// ASCII-only file stem; anything else becomes `_`.
fn attachment_stem(title: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "study_set".to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_stem() {
        assert_eq!(attachment_stem("Biologie cellulaire"), "Biologie_cellulaire");
        assert_eq!(attachment_stem("Réseaux \"TCP\""), "R_seaux__TCP_");
        assert_eq!(attachment_stem("  "), "study_set");
    }
}
