use std::net::SocketAddr;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

use crate::csrf::CSRF_HEADER;
use crate::state::AppState;
use crate::{auth, limits, minutes, upload};

pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origin);
    let max_upload = state.config.max_upload_bytes;

    let api = Router::new()
        .merge(auth::router())
        .merge(minutes::router())
        .merge(upload::router().layer(DefaultBodyLimit::max(max_upload)))
        .route("/test", get(test_connection))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            limits::throttle,
        ));

    Router::new()
        .nest("/api", api)
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

/// Credentialed CORS for the configured client origin. An unparseable
/// origin falls back to permissive without credentials rather than
/// refusing to start.
fn cors_layer(origin: &str) -> CorsLayer {
    match origin.parse::<HeaderValue>() {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([
                header::CONTENT_TYPE,
                header::ACCEPT,
                HeaderName::from_static(CSRF_HEADER),
            ])
            .allow_credentials(true),
        Err(_) => {
            warn!(origin = %origin, "invalid CORS origin, falling back to permissive");
            CorsLayer::permissive()
        }
    }
}

#[derive(Debug, Serialize)]
struct TestResponse {
    status: &'static str,
    message: &'static str,
    database: &'static str,
}

/// Liveness plus persistence connectivity. Always 200: a down database is
/// reported, not fatal.
async fn test_connection(State(state): State<AppState>) -> Json<TestResponse> {
    let database = match sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.db)
        .await
    {
        Ok(_) => "connected",
        Err(e) => {
            warn!(error = %e, "database connectivity check failed");
            "disconnected"
        }
    };
    Json(TestResponse {
        status: "ok",
        message: "Server is running",
        database,
    })
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "3001".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::FromRef;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::auth::jwt::JwtKeys;

    fn app() -> (Router, AppState) {
        let state = AppState::fake();
        (build_app(state.clone()), state)
    }

    async fn body_json(res: axum::http::Response<Body>) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_endpoint_degrades_when_database_is_down() {
        let (app, _state) = app();
        let res = app
            .oneshot(Request::get("/api/test").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = body_json(res).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["database"], "disconnected");
    }

    #[tokio::test]
    async fn missing_session_cookie_is_401() {
        let (app, _state) = app();
        let res = app
            .oneshot(Request::get("/api/csrf-token").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(res).await;
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "Authentication required");
    }

    #[tokio::test]
    async fn invalid_session_cookie_is_403() {
        let (app, _state) = app();
        let res = app
            .oneshot(
                Request::get("/api/csrf-token")
                    .header("cookie", "token=not-a-real-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        let json = body_json(res).await;
        assert_eq!(json["error"], "Invalid or expired token");
    }

    #[tokio::test]
    async fn sixth_login_attempt_is_rate_limited() {
        let (app, _state) = app();
        let mut last_status = StatusCode::OK;
        for _ in 0..6 {
            let res = app
                .clone()
                .oneshot(
                    Request::post("/api/login")
                        .header("content-type", "application/json")
                        .header("x-forwarded-for", "203.0.113.9")
                        .body(Body::from(r#"{"username":"alice","password":"p1"}"#))
                        .unwrap(),
                )
                .await
                .unwrap();
            last_status = res.status();
        }
        assert_eq!(last_status, StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn create_minute_without_csrf_token_is_403() {
        let (app, state) = app();
        let token = JwtKeys::from_ref(&state).sign(1).unwrap();
        let res = app
            .oneshot(
                Request::post("/api/minutes")
                    .header("cookie", format!("token={token}"))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"title":"Weekly sync"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        let json = body_json(res).await;
        assert_eq!(json["error"], "Missing CSRF token");
    }

    #[tokio::test]
    async fn listing_another_users_minutes_is_403() {
        let (app, state) = app();
        let token = JwtKeys::from_ref(&state).sign(1).unwrap();
        let res = app
            .oneshot(
                Request::get("/api/minutes/2")
                    .header("cookie", format!("token={token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        let json = body_json(res).await;
        assert_eq!(json["error"], "Access denied");
    }

    #[tokio::test]
    async fn fetching_a_minute_under_another_users_path_is_404() {
        let (app, state) = app();
        let token = JwtKeys::from_ref(&state).sign(1).unwrap();
        let res = app
            .oneshot(
                Request::get("/api/minutes/2/5")
                    .header("cookie", format!("token={token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let json = body_json(res).await;
        assert_eq!(json["error"], "Minute not found");
    }

    #[tokio::test]
    async fn logout_without_a_session_still_clears_the_cookie() {
        let (app, _state) = app();
        let res = app
            .oneshot(Request::post("/api/logout").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let set_cookie = res
            .headers()
            .get("set-cookie")
            .and_then(|v| v.to_str().ok())
            .unwrap()
            .to_string();
        assert!(set_cookie.starts_with("token="));
        assert!(set_cookie.contains("Max-Age=0"));
        let json = body_json(res).await;
        assert_eq!(json["status"], "success");
    }

    #[tokio::test]
    async fn upload_without_file_field_is_400() {
        let (app, _state) = app();
        let boundary = "test-boundary";
        let body = format!(
            "--{boundary}\r\ncontent-disposition: form-data; name=\"title\"\r\n\r\nStandup\r\n--{boundary}--\r\n"
        );
        let res = app
            .oneshot(
                Request::post("/api/process-audio")
                    .header(
                        "content-type",
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let json = body_json(res).await;
        assert_eq!(json["error"], "No file uploaded");
    }

    #[tokio::test]
    async fn upload_runs_the_injected_transcriber() {
        let (app, _state) = app();
        let boundary = "test-boundary";
        let body = format!(
            "--{boundary}\r\ncontent-disposition: form-data; name=\"file\"; filename=\"a.wav\"\r\ncontent-type: audio/wav\r\n\r\nRIFFdata\r\n--{boundary}--\r\n"
        );
        let res = app
            .oneshot(
                Request::post("/api/process-audio")
                    .header(
                        "content-type",
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = body_json(res).await;
        assert_eq!(json["status"], "success");
        assert_eq!(json["result"]["data"]["transcript"], "Speaker 1: test transcript");
        assert_eq!(json["file"]["name"], "a.wav");
        assert_eq!(json["file"]["type"], "audio/wav");
        assert_eq!(json["file"]["size"], 8);

        // The streamed file on disk holds exactly the uploaded bytes.
        let stored_path = json["result"]["data"]["file_path"].as_str().unwrap();
        let on_disk = tokio::fs::read(stored_path).await.unwrap();
        assert_eq!(on_disk, b"RIFFdata");
    }
}
