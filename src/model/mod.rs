//! # Model Module
//!
//! Owns the single speech-to-text model resource and everything needed to feed
//! it: lifecycle management, the mutual-exclusion boundary around inference, and
//! audio decoding.
//!
//! ## Key Components:
//! - **Manager**: load-once lifecycle and the exclusive section around inference
//! - **Whisper backend**: Candle-based Whisper model (pure Rust, no FFI)
//! - **Audio decoding**: WAV/PCM to the 16kHz mono f32 samples Whisper expects
//!
//! The model is stateful, expensive to construct, and not reentrant-safe; every
//! inference call in the process funnels through [`manager::ModelManager`].

pub mod audio;
pub mod manager;
pub mod whisper;

pub use manager::{ModelManager, SpeechModel, TranscriptionOutcome};
