//! # Configuration Management
//!
//! This module handles loading the bridge configuration from multiple sources:
//! - TOML configuration files (config.toml)
//! - Environment variables (with APP_ prefix)
//! - Default values (built into the code)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. `VOICESCRIBE_PORT` (the one variable the native client knows about)
//! 2. Environment variables (APP_SERVER_PORT, APP_MODEL_SIZE, etc.)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

use crate::model::whisper::ModelSize;

/// The bridge only serves the local machine. The bind host is fixed rather than
/// configurable: the whole trust model is "loopback only, no auth".
pub const BIND_HOST: &str = "127.0.0.1";

/// Main application configuration that contains all settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
}

/// Server-specific configuration settings.
///
/// ## Fields:
/// - `port`: TCP port to listen on (the native client defaults to 8765)
/// - `max_upload_bytes`: cap on the raw audio body accepted by `/transcribe`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub max_upload_bytes: usize,
}

/// Speech-to-text model configuration.
///
/// ## Fields:
/// - `size`: which Whisper variant to load ("tiny", "base", "small", "medium", "large")
/// - `language`: optional ISO 639-1 language hint passed to the decoder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub size: String,
    pub language: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: 8765, // What the native client dials
                max_upload_bytes: 50 * 1024 * 1024, // ~25 minutes of 16-bit 16kHz WAV
            },
            model: ModelConfig {
                size: "base".to_string(),
                language: Some("en".to_string()),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from defaults, config.toml, and the environment.
    ///
    /// ## Loading Process:
    /// 1. Start with built-in defaults
    /// 2. Override with values from config.toml (if it exists)
    /// 3. Override with environment variables prefixed with APP_
    /// 4. Handle `VOICESCRIBE_PORT`, the documented override the client sets
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // required(false) means "don't error if missing"
            .add_source(config::File::with_name("config").required(false))
            // Example: APP_MODEL_SIZE becomes model.size
            .add_source(config::Environment::with_prefix("APP").separator("_"));

        // The one environment variable promised to the outside world. It does not
        // follow the APP_ prefix convention because the native client predates it.
        if let Ok(port) = env::var("VOICESCRIBE_PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// Catching configuration errors here means the process refuses to start with
    /// a clear message instead of failing at first request.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.server.max_upload_bytes == 0 {
            return Err(anyhow::anyhow!("Max upload size must be greater than 0"));
        }

        // Fail early on a typo'd model size rather than mid-download.
        self.model.size.parse::<ModelSize>()?;

        Ok(())
    }
}
