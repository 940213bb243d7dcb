//! The two transcription routes.
//!
//! Both funnel into [`ModelManager::transcribe`](crate::model::ModelManager::transcribe)
//! and therefore into the same exclusive section; the only difference is where
//! the audio file comes from. Inference runs on actix's blocking thread pool so
//! a multi-second model call never stalls the async workers handling other
//! connections.
//!
//! ## Failure reporting:
//! Model-layer failures are HTTP 200 with a populated `error` field - the
//! client inspects bodies, not status codes. The only non-200s here are the
//! 400 for a missing `path` field.

use crate::error::{AppError, AppResult};
use crate::handlers::json_response;
use crate::model::TranscriptionOutcome;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Body of POST `/transcribe-file`. `path` is optional only so that its absence
/// maps to the contract's 400 instead of a deserialization error.
#[derive(Debug, Deserialize)]
pub struct TranscribeFileRequest {
    #[serde(default)]
    pub path: Option<String>,
}

/// POST `/transcribe` - body is raw audio bytes.
///
/// The bytes are persisted to a scoped temp file (always with a `.wav` suffix,
/// whatever the actual encoding - the decoder sniffs), the model is invoked on
/// that path, and the file is removed unconditionally afterwards. Cleanup is
/// best-effort: `NamedTempFile`'s drop swallows deletion errors, which is
/// exactly the contract.
pub async fn transcribe_upload(state: web::Data<AppState>, body: web::Bytes) -> HttpResponse {
    debug!(
        bytes = body.len(),
        limit = state.config.server.max_upload_bytes,
        "Received audio upload"
    );

    let tmp = tempfile::Builder::new()
        .prefix("voicescribe-")
        .suffix(".wav")
        .tempfile();
    let mut tmp = match tmp {
        Ok(tmp) => tmp,
        Err(e) => {
            warn!(error = %e, "Failed to create temp file for upload");
            return json_response(&TranscriptionOutcome::failure(format!(
                "Failed to create temporary file: {}",
                e
            )));
        }
    };

    if let Err(e) = tmp.write_all(&body).and_then(|()| tmp.flush()) {
        warn!(error = %e, "Failed to persist upload");
        return json_response(&TranscriptionOutcome::failure(format!(
            "Failed to write audio data: {}",
            e
        )));
    }

    let outcome = run_transcription(&state, tmp.path().to_path_buf()).await;

    // Unconditional cleanup, success or failure. Dropping the handle unlinks
    // the file; a failed unlink is ignored by design.
    drop(tmp);

    json_response(&outcome)
}

/// POST `/transcribe-file` - body is JSON `{"path": "..."}`.
///
/// No temp file, no cleanup: the caller owns the file and just lends us the
/// path. A missing field is the one client error this route can produce; a
/// present-but-unreadable path is a model-layer failure and travels as 200.
pub async fn transcribe_file(
    state: web::Data<AppState>,
    body: web::Json<TranscribeFileRequest>,
) -> AppResult<HttpResponse> {
    let Some(path) = body.into_inner().path else {
        return Err(AppError::BadRequest("No path provided".to_string()));
    };

    let outcome = run_transcription(&state, PathBuf::from(path)).await;
    Ok(json_response(&outcome))
}

/// Hand the path to the model manager on the blocking pool and wait.
///
/// `web::block` only errs if the blocking task was cancelled or panicked; the
/// manager already converts every model failure into an outcome. Either way
/// nothing propagates upward as a fault.
async fn run_transcription(state: &web::Data<AppState>, path: PathBuf) -> TranscriptionOutcome {
    let manager = state.manager.clone();
    web::block(move || manager.transcribe(&path))
        .await
        .unwrap_or_else(|e| {
            warn!(error = %e, "Transcription task aborted");
            TranscriptionOutcome::failure(format!("Transcription task aborted: {}", e))
        })
}
