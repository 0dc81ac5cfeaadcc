use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_hours: i64,
}

#[derive(Debug, Clone)]
pub struct TranscriberConfig {
    /// Interpreter used to run the transcription script.
    pub python: String,
    pub script: PathBuf,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub cors_origin: String,
    pub uploads_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub transcriber: TranscriberConfig,
    /// Marks the session cookie `Secure`.
    pub production: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "minutemind".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "minutemind-users".into()),
            ttl_hours: std::env::var("JWT_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(24),
        };
        let transcriber = TranscriberConfig {
            python: std::env::var("TRANSCRIBER_PYTHON").unwrap_or_else(|_| "python".into()),
            script: std::env::var("TRANSCRIBER_SCRIPT")
                .unwrap_or_else(|_| "python/process_audio.py".into())
                .into(),
            timeout_secs: std::env::var("TRANSCRIBER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(1800),
        };
        Ok(Self {
            database_url,
            jwt,
            cors_origin: std::env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            uploads_dir: std::env::var("UPLOADS_DIR")
                .unwrap_or_else(|_| "uploads".into())
                .into(),
            max_upload_bytes: std::env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(5 * 1024 * 1024 * 1024),
            transcriber,
            production: std::env::var("APP_ENV")
                .map(|v| v == "production")
                .unwrap_or(false),
        })
    }
}
