use std::path::Path;

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::auth::AdminSession;
use super::error::ApiError;
use super::AppState;

const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub filename: Option<String>,
}

/// Lowercased extension of `filename` if it is an accepted image type.
fn image_extension(filename: &str) -> Option<String> {
    let ext = Path::new(filename).extension()?.to_str()?.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

async fn store_file(dir: &Path, name: &str, body: &[u8]) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Error creating upload dir {}", dir.display()))?;
    tokio::fs::write(dir.join(name), body)
        .await
        .with_context(|| format!("Error writing upload {name}"))?;
    Ok(())
}

pub async fn upload(
    State(state): State<AppState>,
    _session: AdminSession,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let filename = query
        .filename
        .ok_or_else(|| ApiError::validation("filename is required"))?;
    let ext = image_extension(&filename).ok_or_else(|| {
        ApiError::validation(format!(
            "file type not allowed, use one of {}",
            ALLOWED_EXTENSIONS.join("/")
        ))
    })?;
    if body.is_empty() {
        return Err(ApiError::validation("file is empty"));
    }
    let name = format!("{}.{ext}", Uuid::new_v4());
    store_file(&state.uploads_dir, &name, &body)
        .await
        .map_err(|e| ApiError::Upload(format!("{e:#}")))?;
    tracing::info!("Stored upload `{filename}` as {name} ({} bytes)", body.len());
    Ok(Json(json!({ "ok": true, "url": format!("/uploads/{name}") })))
}

#[cfg(test)]
mod tests {
    use super::image_extension;

    #[test]
    fn accepts_only_images() {
        assert_eq!(image_extension("me.PNG").as_deref(), Some("png"));
        assert_eq!(image_extension("a.b.jpeg").as_deref(), Some("jpeg"));
        assert_eq!(image_extension("song.mp3"), None);
        assert_eq!(image_extension("noext"), None);
        assert_eq!(image_extension("../../etc/passwd"), None);
    }
}
