use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::extractors::AuthUser,
    csrf::require_csrf,
    error::ApiError,
    minutes::{
        dto::{
            CreateMinuteRequest, DeletedResponse, MinuteDetailResponse, MinuteListResponse,
            MinuteResponse,
        },
        repo::{Minute, NewMinute},
    },
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/minutes", post(create_minute))
        .route("/minutes/:id", get(list_minutes).delete(delete_minute))
        .route("/minutes/:id/:minute_id", get(get_minute))
}

#[instrument(skip(state, headers, payload))]
pub async fn create_minute(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    headers: HeaderMap,
    Json(payload): Json<CreateMinuteRequest>,
) -> Result<(StatusCode, Json<MinuteResponse>), ApiError> {
    require_csrf(&state.csrf, user_id, &headers).await?;

    if payload.title.trim().is_empty() {
        return Err(ApiError::Validation("Title is required".into()));
    }

    let new = NewMinute {
        title: payload.title.trim().to_string(),
        description: payload.description,
        file_path: payload.file_path,
        duration_seconds: payload.duration,
    };

    let minute = match payload.transcript {
        Some(t) => {
            let (minute, _) =
                Minute::create_with_transcript(&state.db, user_id, new, &t.text, &t.speakers)
                    .await?;
            minute
        }
        None => Minute::create(&state.db, user_id, new).await?,
    };

    info!(user_id = %user_id, minute_id = %minute.id, "minute created");
    Ok((
        StatusCode::CREATED,
        Json(MinuteResponse {
            status: "success",
            minute: minute.into(),
        }),
    ))
}

/// GET /minutes/:userId — the path id must match the session identity.
#[instrument(skip(state))]
pub async fn list_minutes(
    State(state): State<AppState>,
    AuthUser(auth_user_id): AuthUser,
    Path(user_id): Path<i64>,
) -> Result<Json<MinuteListResponse>, ApiError> {
    if user_id != auth_user_id {
        return Err(ApiError::Forbidden("Access denied".into()));
    }
    let minutes = Minute::get_all_by_user(&state.db, user_id).await?;
    Ok(Json(MinuteListResponse {
        status: "success",
        minutes: minutes.into_iter().map(Into::into).collect(),
    }))
}

/// GET /minutes/:userId/:minuteId — minute plus its transcript, if any.
/// A path user id that is not the session identity reads as not-found,
/// the same as a minute that does not exist.
#[instrument(skip(state))]
pub async fn get_minute(
    State(state): State<AppState>,
    AuthUser(auth_user_id): AuthUser,
    Path((user_id, minute_id)): Path<(i64, i64)>,
) -> Result<Json<MinuteDetailResponse>, ApiError> {
    if user_id != auth_user_id {
        return Err(ApiError::NotFound("Minute not found".into()));
    }
    let minute = Minute::get_by_id(&state.db, minute_id, user_id).await?;
    let transcript = Minute::get_transcript(&state.db, minute_id).await?;
    Ok(Json(MinuteDetailResponse {
        status: "success",
        minute: minute.into(),
        transcript: transcript.map(Into::into),
    }))
}

/// DELETE /minutes/:minuteId — ownership is part of the delete predicate.
#[instrument(skip(state, headers))]
pub async fn delete_minute(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    headers: HeaderMap,
    Path(minute_id): Path<i64>,
) -> Result<Json<DeletedResponse>, ApiError> {
    require_csrf(&state.csrf, user_id, &headers).await?;
    Minute::delete(&state.db, minute_id, user_id).await?;
    info!(user_id = %user_id, minute_id = %minute_id, "minute deleted");
    Ok(Json(DeletedResponse {
        status: "success",
        message: "Minute deleted",
    }))
}
