use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::TranscriberConfig;
use crate::error::ApiError;

/// Normalized result of one transcription run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionOutcome {
    pub file_path: String,
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub speakers: Vec<String>,
    #[serde(default)]
    pub duration: f64,
}

/// The external speech-processing collaborator. Injected through AppState
/// so the API layer can be exercised with a fake.
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<TranscriptionOutcome, ApiError>;
}

/// Runs the transcription script as a subprocess and reads its final
/// stdout line as the result JSON. The script logs to a file and reserves
/// stdout for that single JSON object, but earlier noise is tolerated.
pub struct ScriptTranscriber {
    python: String,
    script: PathBuf,
    timeout: Duration,
}

impl ScriptTranscriber {
    pub fn new(config: &TranscriberConfig) -> Self {
        Self {
            python: config.python.clone(),
            script: config.script.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[async_trait]
impl TranscriptionService for ScriptTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<TranscriptionOutcome, ApiError> {
        info!(script = %self.script.display(), file = %audio_path.display(), "starting transcription");

        let child = tokio::process::Command::new(&self.python)
            .arg("-u")
            .arg(&self.script)
            .arg(audio_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ApiError::Upstream(format!("failed to start transcriber: {e}")))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ApiError::Upstream("transcription timed out".into()))?
            .map_err(|e| ApiError::Upstream(format!("transcriber did not finish: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, stderr = %stderr.trim(), "transcriber exited with failure");
            return Err(ApiError::Upstream(format!(
                "transcriber exited with {}",
                output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let outcome = parse_script_output(&stdout)?;
        debug!(
            chars = outcome.transcript.len(),
            speakers = outcome.speakers.len(),
            "transcription finished"
        );
        Ok(outcome)
    }
}

#[derive(Debug, Deserialize)]
struct ScriptResponse {
    status: String,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Option<TranscriptionOutcome>,
}

/// Parses the last non-empty stdout line as the script's JSON envelope.
pub(crate) fn parse_script_output(stdout: &str) -> Result<TranscriptionOutcome, ApiError> {
    let line = stdout
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| ApiError::Upstream("no output from transcriber".into()))?;

    let response: ScriptResponse = serde_json::from_str(line.trim())
        .map_err(|e| ApiError::Upstream(format!("malformed transcriber output: {e}")))?;

    if response.status != "success" {
        return Err(ApiError::Upstream(
            response
                .error
                .unwrap_or_else(|| "transcription failed".into()),
        ));
    }
    response
        .data
        .ok_or_else(|| ApiError::Upstream("transcriber response missing data".into()))
}
