use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRef, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{
            AuthResponse, CsrfTokenResponse, LoginRequest, MessageResponse, RegisterRequest,
            UpdateProfileRequest,
        },
        extractors::AuthUser,
        jwt::{clear_session_cookie, session_cookie, JwtKeys},
        password::hash_password,
        repo::{User, UserUpdate},
    },
    csrf::require_csrf,
    error::ApiError,
    limits::client_key,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/csrf-token", get(csrf_token))
        .route("/users/me", get(me).put(update_me))
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(mut payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    payload.username = payload.username.trim().to_string();
    payload.email = payload.email.trim().to_lowercase();

    if payload.username.is_empty() || payload.password.is_empty() || payload.email.is_empty() {
        return Err(ApiError::Validation(
            "Username, password and email are required".into(),
        ));
    }
    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if payload.password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::Validation("Password too short".into()));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(
        &state.db,
        &payload.username,
        &payload.email,
        &hash,
        payload.first_name.as_deref(),
        payload.last_name.as_deref(),
    )
    .await?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            status: "success",
            user: user.into(),
        }),
    ))
}

#[instrument(skip(state, jar, payload))]
pub async fn login(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>), ApiError> {
    let key = client_key(&headers, connect_info.map(|ci| ci.0));
    if !state.login_limiter.check(&key).await {
        warn!(client = %key, "login rate limit exceeded");
        return Err(ApiError::RateLimited);
    }

    let user = User::authenticate(&state.db, payload.username.trim(), &payload.password).await?;

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(user.id)?;
    let jar = jar.add(session_cookie(token, keys.ttl, state.config.production));

    info!(user_id = %user.id, username = %user.username, "user logged in");
    Ok((
        jar,
        Json(AuthResponse {
            status: "success",
            user: user.into(),
        }),
    ))
}

/// Clears the session cookie. Idempotent: succeeds whether or not a
/// session exists.
#[instrument(skip(state, jar))]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    let jar = jar.add(clear_session_cookie(state.config.production));
    (
        jar,
        Json(MessageResponse {
            status: "success",
            message: "Logged out",
        }),
    )
}

#[instrument(skip(state))]
pub async fn csrf_token(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<CsrfTokenResponse>, ApiError> {
    let token = state.csrf.issue(user_id).await;
    Ok(Json(CsrfTokenResponse {
        status: "success",
        csrf_token: token,
    }))
}

#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<AuthResponse>, ApiError> {
    let user = User::get_by_id(&state.db, user_id).await?;
    Ok(Json(AuthResponse {
        status: "success",
        user: user.into(),
    }))
}

#[instrument(skip(state, headers, payload))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    headers: HeaderMap,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    require_csrf(&state.csrf, user_id, &headers).await?;

    let email = match payload.email {
        Some(email) => {
            let email = email.trim().to_lowercase();
            if !is_valid_email(&email) {
                return Err(ApiError::Validation("Invalid email".into()));
            }
            Some(email)
        }
        None => None,
    };
    let password_hash = match payload.password {
        Some(password) => {
            if password.len() < 8 {
                return Err(ApiError::Validation("Password too short".into()));
            }
            Some(hash_password(&password)?)
        }
        None => None,
    };

    let user = User::update(
        &state.db,
        user_id,
        UserUpdate {
            first_name: payload.first_name,
            last_name: payload.last_name,
            email,
            password_hash,
        },
    )
    .await?;

    info!(user_id = %user.id, "profile updated");
    Ok(Json(AuthResponse {
        status: "success",
        user: user.into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@sub.domain.org"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("a b@x.com"));
        assert!(!is_valid_email("@x.com"));
    }
}
