//! # Model Manager
//!
//! Guards the single non-thread-safe model resource and mediates all access to
//! it. This is the one piece of the bridge with real concurrency rules:
//!
//! - The model is loaded **once**, before the HTTP listener starts. If loading
//!   fails the process exits; there is no retry and no degraded serving mode.
//! - At most one thread may be inside the model's inference call at any instant,
//!   no matter how many requests are in flight. A `std::sync::Mutex` scoped to
//!   the backend enforces this; the guard drops on every exit path.
//! - The readiness flag is read-mostly (single writer at startup, many readers)
//!   and is read without taking the lock.
//!
//! ## Rust Concepts:
//! - **Mutex poisoning**: a panic while holding the lock poisons it. The manager
//!   recovers via `into_inner()` so one bad request can't wedge the service.
//! - **Trait objects**: inference sits behind the [`SpeechModel`] trait so tests
//!   can substitute an instrumented stub for the real Whisper backend.

use crate::config::ModelConfig;
use crate::model::whisper::{ModelSize, WhisperModel};
use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tracing::{info, warn};

/// The seam between the bridge and the model runtime.
///
/// One synchronous, fallible operation: file path in, transcript out. The
/// manager owns the only instance and never hands out references, so `&mut self`
/// here does not imply the implementation must be thread-safe on its own.
pub trait SpeechModel: Send {
    fn transcribe(&mut self, path: &Path) -> Result<String>;
}

/// What one transcription exchange produces, in the exact wire shape the client
/// parses: `{"text": "...", "error": null}` on success, `{"text": "",
/// "error": "..."}` on failure.
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionOutcome {
    pub text: String,
    pub error: Option<String>,
}

impl TranscriptionOutcome {
    pub fn success(text: String) -> Self {
        Self { text, error: None }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            error: Some(message.into()),
        }
    }
}

/// Owns the loaded model for the lifetime of the process.
///
/// ## State machine:
/// `UNLOADED -> READY` on load success, `UNLOADED -> FAILED` on load failure.
/// FAILED is terminal and unobservable from the serving phase: [`ModelManager::load`]
/// returns `Err`, `main` exits, the listener is never bound. There is no
/// transition back to UNLOADED and no unload operation.
pub struct ModelManager {
    /// The exclusive section. `Option` because the not-loaded case is handled
    /// defensively even though the startup contract makes it unreachable.
    backend: Mutex<Option<Box<dyn SpeechModel>>>,

    /// True once loading succeeded; never reset for the process lifetime.
    ready: AtomicBool,

    /// Fixed model identifier reported by `/status`.
    model_name: String,
}

impl ModelManager {
    /// Load the model resource. Slow, I/O- and compute-heavy, and fallible
    /// (missing model files, incompatible runtime). On failure no manager is
    /// constructed and the caller is expected to exit.
    pub async fn load(config: &ModelConfig) -> Result<Self> {
        let size: ModelSize = config.size.parse()?;
        info!("Loading {} speech-to-text model...", size);

        let backend = WhisperModel::load(size, config.language.clone()).await?;

        info!("Model loaded successfully");
        Ok(Self::from_backend(
            Box::new(backend),
            size.repo_name().to_string(),
        ))
    }

    /// Wrap an already-constructed backend. This is how tests inject
    /// instrumented stubs; production code only goes through [`ModelManager::load`].
    pub fn from_backend(backend: Box<dyn SpeechModel>, model_name: String) -> Self {
        Self {
            backend: Mutex::new(Some(backend)),
            ready: AtomicBool::new(true),
            model_name,
        }
    }

    /// A manager with no backend, permanently unready. Exists so the defensive
    /// not-loaded path stays testable; the startup contract never produces one.
    pub fn unloaded(model_name: String) -> Self {
        Self {
            backend: Mutex::new(None),
            ready: AtomicBool::new(false),
            model_name,
        }
    }

    /// Lock-free readiness read, used for health reporting. Safe to call from
    /// any thread at any time.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    /// The fixed model identifier (e.g. "openai/whisper-base").
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Run inference on the audio file at `path`, serialized against every other
    /// caller in the process.
    ///
    /// ## Failure containment:
    /// Anything the backend raises is converted into a structured outcome here.
    /// Handlers upstream never see an `Err` or a panic from the model layer, so
    /// a malformed upload cannot take down the listener or other in-flight
    /// connections.
    pub fn transcribe(&self, path: &Path) -> TranscriptionOutcome {
        if !self.is_ready() {
            return TranscriptionOutcome::failure("Model not loaded");
        }

        // A panic inside a previous inference call poisons the mutex; the model
        // has no cross-call state worth protecting, so recover and keep serving.
        let mut guard = match self.backend.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let Some(backend) = guard.as_mut() else {
            return TranscriptionOutcome::failure("Model not loaded");
        };

        match backend.transcribe(path) {
            Ok(text) => TranscriptionOutcome::success(text),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Transcription failed");
                TranscriptionOutcome::failure(e.to_string())
            }
        }
    }
}
