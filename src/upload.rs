use std::path::PathBuf;

use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use time::OffsetDateTime;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/process-audio", post(process_audio))
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub result: UploadResult,
    pub file: UploadedFileInfo,
}

#[derive(Debug, Serialize)]
pub struct UploadResult {
    pub data: UploadData,
}

#[derive(Debug, Serialize)]
pub struct UploadData {
    pub file_path: String,
    pub transcript: String,
    pub speakers: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadedFileInfo {
    pub name: String,
    pub size: usize,
    #[serde(rename = "type")]
    pub content_type: String,
    pub duration: f64,
}

struct StoredUpload {
    original_name: String,
    content_type: String,
    size: usize,
    path: PathBuf,
}

/// Accepts one `file` field, streams it chunk by chunk into the uploads
/// directory under a collision-resistant name, and forwards it to the
/// transcription collaborator. The body size limit is enforced by the
/// router layer; the file is never held in memory whole.
#[instrument(skip(state, multipart))]
pub async fn process_audio(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut stored: Option<StoredUpload> = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            // userId/title/description ride along in the form but the
            // minute itself is created through POST /minutes.
            continue;
        }

        let original_name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| "upload".into());
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".into());

        let path = state.config.uploads_dir.join(stored_filename(
            &original_name,
            OffsetDateTime::now_utc(),
        ));
        let mut file = File::create(&path)
            .await
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("failed to store upload: {e}")))?;

        let mut size: usize = 0;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| ApiError::Validation(format!("Failed to read file field: {e}")))?
        {
            size += chunk.len();
            file.write_all(&chunk)
                .await
                .map_err(|e| ApiError::Internal(anyhow::anyhow!("failed to store upload: {e}")))?;
        }
        file.flush()
            .await
            .map_err(|e| ApiError::Internal(anyhow::anyhow!("failed to store upload: {e}")))?;

        info!(
            name = %original_name,
            size,
            path = %path.display(),
            "file stored"
        );
        stored = Some(StoredUpload {
            original_name,
            content_type,
            size,
            path,
        });
    }

    let stored = stored.ok_or_else(|| ApiError::Validation("No file uploaded".into()))?;

    let outcome = state.transcriber.transcribe(&stored.path).await?;

    Ok(Json(UploadResponse {
        status: "success",
        result: UploadResult {
            data: UploadData {
                file_path: outcome.file_path,
                transcript: outcome.transcript,
                speakers: outcome.speakers,
            },
        },
        file: UploadedFileInfo {
            name: stored.original_name,
            size: stored.size,
            content_type: stored.content_type,
            duration: outcome.duration,
        },
    }))
}

/// `<epoch-ms>-<sanitized-original-name>`; epoch prefix keeps repeated
/// uploads of the same file from colliding.
fn stored_filename(original: &str, now: OffsetDateTime) -> String {
    let epoch_ms = now.unix_timestamp_nanos() / 1_000_000;
    format!("{}-{}", epoch_ms, sanitize_filename(original))
}

/// Keeps only a safe basename: path components are stripped and anything
/// outside [A-Za-z0-9._-] becomes '_'.
fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .trim();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "upload".into()
    } else {
        cleaned
    }
}
