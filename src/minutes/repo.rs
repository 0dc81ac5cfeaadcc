use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor, PgPool};
use time::OffsetDateTime;

use crate::error::ApiError;

const MINUTE_COLUMNS: &str =
    "id, user_id, title, description, file_path, duration_seconds, created_at, updated_at";
const TRANSCRIPT_COLUMNS: &str = "id, minute_id, full_text, speakers, created_at";

/// Meeting record. Owned by exactly one user; ownership never changes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Minute {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub file_path: Option<String>,
    pub duration_seconds: Option<i64>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Transcript row; speakers are stored as a JSON array of labels.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transcript {
    pub id: i64,
    pub minute_id: i64,
    pub full_text: String,
    pub speakers: serde_json::Value,
    pub created_at: OffsetDateTime,
}

impl Transcript {
    /// Deserializes the stored speaker list; non-string entries are
    /// dropped rather than failing the whole read.
    pub fn speaker_list(&self) -> Vec<String> {
        self.speakers
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct NewMinute {
    pub title: String,
    pub description: Option<String>,
    pub file_path: Option<String>,
    pub duration_seconds: Option<i64>,
}

async fn insert_minute<'e, E>(executor: E, user_id: i64, new: NewMinute) -> Result<Minute, ApiError>
where
    E: PgExecutor<'e>,
{
    let minute = sqlx::query_as::<_, Minute>(&format!(
        r#"
        INSERT INTO minutes (user_id, title, description, file_path, duration_seconds)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {MINUTE_COLUMNS}
        "#,
    ))
    .bind(user_id)
    .bind(new.title)
    .bind(new.description)
    .bind(new.file_path)
    .bind(new.duration_seconds)
    .fetch_one(executor)
    .await?;
    Ok(minute)
}

async fn insert_transcript<'e, E>(
    executor: E,
    minute_id: i64,
    full_text: &str,
    speakers: &[String],
) -> Result<Transcript, ApiError>
where
    E: PgExecutor<'e>,
{
    let transcript = sqlx::query_as::<_, Transcript>(&format!(
        r#"
        INSERT INTO transcripts (minute_id, full_text, speakers)
        VALUES ($1, $2, $3)
        RETURNING {TRANSCRIPT_COLUMNS}
        "#,
    ))
    .bind(minute_id)
    .bind(full_text)
    .bind(serde_json::Value::from(speakers.to_vec()))
    .fetch_one(executor)
    .await?;
    Ok(transcript)
}

impl Minute {
    pub async fn create(db: &PgPool, user_id: i64, new: NewMinute) -> Result<Minute, ApiError> {
        insert_minute(db, user_id, new).await
    }

    /// Creates the minute and its transcript in a single transaction, so a
    /// crash cannot leave one behind without the other.
    pub async fn create_with_transcript(
        db: &PgPool,
        user_id: i64,
        new: NewMinute,
        full_text: &str,
        speakers: &[String],
    ) -> Result<(Minute, Transcript), ApiError> {
        let mut tx = db.begin().await?;
        let minute = insert_minute(&mut *tx, user_id, new).await?;
        let transcript = insert_transcript(&mut *tx, minute.id, full_text, speakers).await?;
        tx.commit().await?;
        Ok((minute, transcript))
    }

    /// All minutes owned by the user, most recent first.
    pub async fn get_all_by_user(db: &PgPool, user_id: i64) -> Result<Vec<Minute>, ApiError> {
        let rows = sqlx::query_as::<_, Minute>(&format!(
            r#"
            SELECT {MINUTE_COLUMNS}
            FROM minutes
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        ))
        .bind(user_id)
        .fetch_all(db)
        .await?;
        Ok(rows)
    }

    /// Ownership check lives in the WHERE clause: another user's minute is
    /// indistinguishable from a nonexistent one.
    pub async fn get_by_id(db: &PgPool, id: i64, user_id: i64) -> Result<Minute, ApiError> {
        sqlx::query_as::<_, Minute>(&format!(
            "SELECT {MINUTE_COLUMNS} FROM minutes WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::NotFound("Minute not found".into()))
    }

    pub async fn save_transcript(
        db: &PgPool,
        minute_id: i64,
        full_text: &str,
        speakers: &[String],
    ) -> Result<Transcript, ApiError> {
        insert_transcript(db, minute_id, full_text, speakers).await
    }

    pub async fn get_transcript(
        db: &PgPool,
        minute_id: i64,
    ) -> Result<Option<Transcript>, ApiError> {
        let transcript = sqlx::query_as::<_, Transcript>(&format!(
            "SELECT {TRANSCRIPT_COLUMNS} FROM transcripts WHERE minute_id = $1"
        ))
        .bind(minute_id)
        .fetch_optional(db)
        .await?;
        Ok(transcript)
    }

    /// Deletes only when both id and owner match; zero affected rows is
    /// reported as not-found so existence never leaks across users.
    pub async fn delete(db: &PgPool, id: i64, user_id: i64) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM minutes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound(
                "Minute not found or unauthorized access".into(),
            ));
        }
        Ok(())
    }
}
