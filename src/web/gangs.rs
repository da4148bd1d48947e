use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::db::models::NewGang;

use super::auth::AdminSession;
use super::members::is_safe_link;
use super::AppState;

// Older clients expect `{data}` / `{error}` rather than the `{ok, ...}` envelope.
type LegacyResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn legacy_error(status: StatusCode, message: impl ToString) -> (StatusCode, Json<Value>) {
    let message = message.to_string();
    if status.is_server_error() {
        tracing::error!("Gang request failed: {message}");
    }
    (status, Json(json!({ "error": message })))
}

pub async fn list(State(state): State<AppState>) -> LegacyResult {
    match state.store.list_gangs().await {
        Ok(gangs) => Ok(Json(json!({ "data": gangs }))),
        Err(e) => Err(legacy_error(StatusCode::INTERNAL_SERVER_ERROR, e)),
    }
}

pub async fn put(
    State(state): State<AppState>,
    session: Option<AdminSession>,
    body: Result<Json<NewGang>, JsonRejection>,
) -> LegacyResult {
    if session.is_none() {
        return Err(legacy_error(StatusCode::UNAUTHORIZED, "admin session required"));
    }
    let Json(mut gang) = body.map_err(|e| legacy_error(StatusCode::BAD_REQUEST, e.body_text()))?;
    gang.slug = gang.slug.trim().to_owned();
    gang.name = gang.name.trim().to_owned();
    if gang.slug.is_empty() {
        return Err(legacy_error(StatusCode::BAD_REQUEST, "slug is required"));
    }
    if gang.name.is_empty() {
        return Err(legacy_error(StatusCode::BAD_REQUEST, "name is required"));
    }
    for member in &mut gang.members {
        member.image = member.image.take().map(|i| i.trim().to_owned()).filter(|i| !i.is_empty());
        if matches!(&member.image, Some(image) if !is_safe_link(image, true)) {
            return Err(legacy_error(
                StatusCode::BAD_REQUEST,
                "image must be an http(s) link or an /uploads/ path",
            ));
        }
    }
    match state.store.upsert_gang(&gang).await {
        Ok(gang) => {
            tracing::info!("Saved gang `{}` with {} members", gang.slug, gang.members.len());
            Ok(Json(json!({ "data": gang })))
        }
        Err(e) => Err(legacy_error(StatusCode::INTERNAL_SERVER_ERROR, e)),
    }
}
