//! # HTTP Request Handlers
//!
//! One module per concern: `status` for the read-only probes plus the CORS
//! preflight/404 fallback, `transcribe` for the two transcription routes.
//!
//! Route table (the complete public surface - anything else is a 404):
//!
//! | Method  | Path               | Behavior                                   |
//! |---------|--------------------|--------------------------------------------|
//! | GET     | `/health`          | `{status, model_loaded}`                   |
//! | GET     | `/status`          | `{model_loaded, model_name}`               |
//! | POST    | `/transcribe`      | raw audio bytes -> temp file -> `{text, error}` |
//! | POST    | `/transcribe-file` | JSON `{path}` -> `{text, error}`           |
//! | OPTIONS | any                | 200, CORS preflight headers, no body       |

pub mod status;
pub mod transcribe;

use actix_web::{http::header, web, HttpResponse};
use serde::Serialize;

/// Register every route the bridge serves. Shared between `main` and the
/// handler tests so the two can never drift apart.
///
/// Each resource routes its own unmatched methods to the fallback as well:
/// the contract says OPTIONS gets a preflight answer *anywhere* and every other
/// unrecognized method/path pair is a 404, not actix's default 405.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/health")
            .route(web::get().to(status::health))
            .default_service(web::route().to(status::fallback)),
    )
    .service(
        web::resource("/status")
            .route(web::get().to(status::status))
            .default_service(web::route().to(status::fallback)),
    )
    .service(
        web::resource("/transcribe")
            .route(web::post().to(transcribe::transcribe_upload))
            .default_service(web::route().to(status::fallback)),
    )
    .service(
        web::resource("/transcribe-file")
            .route(web::post().to(transcribe::transcribe_file))
            .default_service(web::route().to(status::fallback)),
    )
    .default_service(web::route().to(status::fallback));
}

/// 200 JSON response with the CORS header every body in this API carries.
///
/// The header is set unconditionally (not only when the request has an
/// `Origin`), which is why this helper exists instead of a CORS middleware.
pub(crate) fn json_response<T: Serialize>(body: &T) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .json(body)
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared fixtures for handler tests: stub models and app state builders.

    use crate::config::AppConfig;
    use crate::model::{ModelManager, SpeechModel};
    use crate::state::AppState;
    use anyhow::{anyhow, Result};
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    /// Stub backend that behaves like a real one at the filesystem boundary:
    /// fails on unreadable paths, otherwise returns a fixed transcript. Records
    /// every path it was handed so tests can check temp-file cleanup.
    pub struct RecordingModel {
        pub seen_paths: Arc<Mutex<Vec<PathBuf>>>,
    }

    impl RecordingModel {
        pub fn new() -> (Self, Arc<Mutex<Vec<PathBuf>>>) {
            let seen = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    seen_paths: Arc::clone(&seen),
                },
                seen,
            )
        }
    }

    impl SpeechModel for RecordingModel {
        fn transcribe(&mut self, path: &Path) -> Result<String> {
            std::fs::metadata(path)
                .map_err(|e| anyhow!("Failed to open {}: {}", path.display(), e))?;
            self.seen_paths
                .lock()
                .expect("seen_paths lock")
                .push(path.to_path_buf());
            Ok("stub transcript".to_string())
        }
    }

    /// App state around a ready stub model.
    pub fn ready_state() -> (AppState, Arc<Mutex<Vec<PathBuf>>>) {
        let (model, seen) = RecordingModel::new();
        let manager = ModelManager::from_backend(Box::new(model), "stub-model".to_string());
        (AppState::new(manager, AppConfig::default()), seen)
    }

    /// App state whose manager never finished loading.
    pub fn unready_state() -> AppState {
        AppState::new(
            ModelManager::unloaded("stub-model".to_string()),
            AppConfig::default(),
        )
    }
}
