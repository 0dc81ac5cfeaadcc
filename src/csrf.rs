use std::collections::HashMap;
use std::sync::Arc;

use axum::http::HeaderMap;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::ApiError;

pub const CSRF_HEADER: &str = "x-csrf-token";

/// Per-session anti-forgery tokens, keyed by user id. Issuing a new token
/// replaces the previous one for that session.
#[derive(Clone, Default)]
pub struct CsrfStore {
    tokens: Arc<Mutex<HashMap<i64, String>>>,
}

impl CsrfStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn issue(&self, user_id: i64) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.tokens.lock().await.insert(user_id, token.clone());
        token
    }

    /// Comparison is constant-time so timing cannot narrow down the token.
    pub async fn validate(&self, user_id: i64, presented: &str) -> bool {
        self.tokens
            .lock()
            .await
            .get(&user_id)
            .map(|t| bool::from(t.as_bytes().ct_eq(presented.as_bytes())))
            .unwrap_or(false)
    }
}

/// Guards state-changing endpoints: the token fetched from /csrf-token must
/// come back in the request header.
pub async fn require_csrf(
    store: &CsrfStore,
    user_id: i64,
    headers: &HeaderMap,
) -> Result<(), ApiError> {
    let presented = headers
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Forbidden("Missing CSRF token".into()))?;
    if !store.validate(user_id, presented).await {
        return Err(ApiError::Forbidden("Invalid CSRF token".into()));
    }
    Ok(())
}
