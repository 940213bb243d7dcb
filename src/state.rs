//! # Application State Management
//!
//! Shared state handed to every HTTP request handler.
//!
//! ## Key Rust Concepts:
//!
//! ### Arc (Atomically Reference Counted)
//! The model manager is the one shared mutable resource in the process. Actix
//! clones the app state into each worker, so the manager sits behind an `Arc`:
//! many handles, one manager, freed when the last handle drops (i.e. never,
//! in practice - it lives for the process lifetime).
//!
//! ### Why no lock here
//! All the locking lives *inside* [`ModelManager`]; the state struct itself is
//! immutable after construction. Config is a snapshot taken at startup - this
//! service has no runtime reconfiguration, so there's nothing to synchronize.

use crate::config::AppConfig;
use crate::model::ModelManager;
use std::sync::Arc;
use std::time::Instant;

/// The application state shared across all HTTP request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Gatekeeper for the single model resource.
    pub manager: Arc<ModelManager>,

    /// Startup configuration snapshot (never mutated after load).
    pub config: AppConfig,

    /// When the server started. `Instant` is `Copy`, safe to share directly.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(manager: ModelManager, config: AppConfig) -> Self {
        Self {
            manager: Arc::new(manager),
            config,
            start_time: Instant::now(),
        }
    }

    /// Server uptime in seconds; logged at shutdown.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
