use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::minutes::repo::{Minute, Transcript};

/// Request body for creating a minute. The owner always comes from the
/// session, never from the body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMinuteRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub transcript: Option<TranscriptPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptPayload {
    pub text: String,
    #[serde(default)]
    pub speakers: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MinuteDto {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub file_path: Option<String>,
    pub duration: Option<i64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Minute> for MinuteDto {
    fn from(m: Minute) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            title: m.title,
            description: m.description,
            file_path: m.file_path,
            duration: m.duration_seconds,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptDto {
    pub full_text: String,
    pub speakers: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Transcript> for TranscriptDto {
    fn from(t: Transcript) -> Self {
        let speakers = t.speaker_list();
        Self {
            full_text: t.full_text,
            speakers,
            created_at: t.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MinuteResponse {
    pub status: &'static str,
    pub minute: MinuteDto,
}

#[derive(Debug, Serialize)]
pub struct MinuteListResponse {
    pub status: &'static str,
    pub minutes: Vec<MinuteDto>,
}

#[derive(Debug, Serialize)]
pub struct MinuteDetailResponse {
    pub status: &'static str,
    pub minute: MinuteDto,
    pub transcript: Option<TranscriptDto>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub status: &'static str,
    pub message: &'static str,
}
