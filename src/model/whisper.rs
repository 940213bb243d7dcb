//! # Whisper Backend
//!
//! The production [`SpeechModel`](crate::model::SpeechModel) implementation:
//! OpenAI Whisper running on Candle, pure Rust, no FFI.
//!
//! ## Loading Process:
//! 1. Download config/tokenizer/weights from HuggingFace (cached locally)
//! 2. Load model weights onto the device
//! 3. Precompute the mel filterbank for feature extraction
//!
//! Loading is the slow, fallible part of startup. It happens exactly once,
//! before the listener binds; after that the model lives until process exit and
//! is only ever touched under the manager's exclusive section, so nothing in
//! this file needs its own synchronization.

use crate::model::audio;
use crate::model::manager::SpeechModel;
use anyhow::{anyhow, Result};
use candle_core::{Device, IndexOp, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::whisper::{self as m, Config};
use std::path::Path;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

/// Upper bound on generated tokens per clip. Whisper's context is 448 target
/// positions; half of that is plenty for a 30-second segment.
const MAX_DECODE_TOKENS: usize = 224;

/// Available Whisper model sizes.
///
/// Larger models are more accurate and slower; "base" is the default because the
/// bridge sits in an interactive dictation loop where latency wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ModelSize {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl ModelSize {
    /// HuggingFace repository holding this variant's weights. Doubles as the
    /// model identifier reported by `/status`.
    pub fn repo_name(&self) -> &'static str {
        match self {
            ModelSize::Tiny => "openai/whisper-tiny",
            ModelSize::Base => "openai/whisper-base",
            ModelSize::Small => "openai/whisper-small",
            ModelSize::Medium => "openai/whisper-medium",
            ModelSize::Large => "openai/whisper-large-v2",
        }
    }
}

impl std::str::FromStr for ModelSize {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "tiny" => Ok(ModelSize::Tiny),
            "base" => Ok(ModelSize::Base),
            "small" => Ok(ModelSize::Small),
            "medium" => Ok(ModelSize::Medium),
            "large" => Ok(ModelSize::Large),
            _ => Err(anyhow!(
                "Unknown model size '{}' (expected tiny/base/small/medium/large)",
                s
            )),
        }
    }
}

impl std::fmt::Display for ModelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ModelSize::Tiny => "tiny",
            ModelSize::Base => "base",
            ModelSize::Small => "small",
            ModelSize::Medium => "medium",
            ModelSize::Large => "large",
        };
        write!(f, "{}", name)
    }
}

/// A loaded Whisper model ready for transcription.
pub struct WhisperModel {
    model: m::model::Whisper,
    config: Config,
    device: Device,
    tokenizer: Tokenizer,
    mel_filters: Vec<f32>,
    language: Option<String>,
}

impl WhisperModel {
    /// Download (if uncached) and load the model. This blocks startup on
    /// purpose: the server must never listen with an unready model.
    pub async fn load(size: ModelSize, language: Option<String>) -> Result<Self> {
        let start_time = std::time::Instant::now();
        info!("Fetching model files for {}", size.repo_name());

        let mut builder = hf_hub::api::tokio::ApiBuilder::new().with_progress(false);
        if let Ok(token) = std::env::var("HF_TOKEN") {
            builder = builder.with_token(Some(token));
        }
        let api = builder
            .build()
            .map_err(|e| anyhow!("Failed to initialize HuggingFace API: {}", e))?;
        let repo = api.model(size.repo_name().to_string());

        let config_path = repo
            .get("config.json")
            .await
            .map_err(|e| anyhow!("Failed to download config.json from {}: {}", size.repo_name(), e))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .await
            .map_err(|e| anyhow!("Failed to download tokenizer.json from {}: {}", size.repo_name(), e))?;
        let weights_path = repo
            .get("model.safetensors")
            .await
            .map_err(|e| anyhow!("Failed to download model weights from {}: {}", size.repo_name(), e))?;

        let config: Config = serde_json::from_reader(std::fs::File::open(config_path)?)?;
        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;
        let mel_filters = mel_filter_bank(m::N_FFT / 2 + 1, config.num_mel_bins as usize);

        debug!("Loading model weights from {}", weights_path.display());
        let device = Device::Cpu;
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], m::DTYPE, &device)?
        };
        let model = m::model::Whisper::load(&vb, config.clone())?;

        info!(
            "Whisper {} model loaded in {:.2}s",
            size,
            start_time.elapsed().as_secs_f64()
        );

        Ok(Self {
            model,
            config,
            device,
            tokenizer,
            mel_filters,
            language,
        })
    }

    /// Resolve a special token to its id, with the documented Whisper fallback
    /// for tokenizer files that don't list it.
    fn token_id(&self, token: &str, fallback: u32) -> u32 {
        self.tokenizer.token_to_id(token).unwrap_or(fallback)
    }

    /// Build the decoder prompt: SOT, optional language, task, no timestamps.
    fn prompt_tokens(&self) -> Vec<u32> {
        let mut tokens = vec![self.token_id("<|startoftranscript|>", 50258)];

        if let Some(lang) = &self.language {
            match self.tokenizer.token_to_id(&format!("<|{}|>", lang)) {
                Some(id) => tokens.push(id),
                None => warn!("No token for language '{}', letting the model detect it", lang),
            }
        }

        tokens.push(self.token_id("<|transcribe|>", 50359));
        tokens.push(self.token_id("<|notimestamps|>", 50363));
        tokens
    }

    /// Greedy decode against the encoded audio features.
    fn decode_tokens(&mut self, audio_features: &Tensor) -> Result<Vec<u32>> {
        let eot = self.token_id("<|endoftext|>", 50257);
        let mut tokens = self.prompt_tokens();
        let mut generated: Vec<u32> = Vec::new();

        for _ in 0..MAX_DECODE_TOKENS {
            let tokens_t = Tensor::new(tokens.as_slice(), &self.device)?.unsqueeze(0)?;
            // Full-sequence decode with a flushed KV cache each step: slower than
            // incremental decoding but stateless across calls, which matters for
            // a model that is reused for the whole process lifetime.
            let ys = self.model.decoder.forward(&tokens_t, audio_features, true)?;
            let (_, seq_len, _) = ys.dims3()?;
            let logits = self
                .model
                .decoder
                .final_linear(&ys.i((..1, seq_len - 1..))?)?;
            let next = logits
                .i((0, 0))?
                .argmax(candle_core::D::Minus1)?
                .to_scalar::<u32>()?;

            if next == eot {
                break;
            }

            if is_repetitive(&generated, next) {
                debug!("Stopping decode on repetition after {} tokens", generated.len());
                break;
            }

            tokens.push(next);
            generated.push(next);
        }

        Ok(generated)
    }
}

impl SpeechModel for WhisperModel {
    fn transcribe(&mut self, path: &Path) -> Result<String> {
        let start_time = std::time::Instant::now();

        let pcm = audio::decode_audio_file(path)?;
        let audio_seconds = pcm.len() as f64 / f64::from(audio::SAMPLE_RATE);

        let mel = m::audio::pcm_to_mel(&self.config, &pcm, &self.mel_filters);
        let n_mels = self.config.num_mel_bins as usize;
        let n_frames = mel.len() / n_mels;
        let mel = Tensor::from_vec(mel, (1, n_mels, n_frames), &self.device)?;

        let audio_features = self.model.encoder.forward(&mel, true)?;
        let generated = self.decode_tokens(&audio_features)?;

        let raw = self
            .tokenizer
            .decode(&generated, true)
            .map_err(|e| anyhow!("Tokenizer decode error: {}", e))?;
        let text = clean_transcript(&raw);

        debug!(
            "Transcribed {:.2}s of audio in {:.2}s ({} chars)",
            audio_seconds,
            start_time.elapsed().as_secs_f64(),
            text.len()
        );

        Ok(text)
    }
}

/// Triangular mel filterbank on the HTK mel scale, `n_mels x n_freqs` row-major.
///
/// Whisper ships precomputed filters as a binary asset; recomputing them keeps
/// the crate asset-free and matches the reference filters to within rounding.
fn mel_filter_bank(n_freqs: usize, n_mels: usize) -> Vec<f32> {
    let sample_rate = audio::SAMPLE_RATE as f32;
    let f_max = sample_rate / 2.0;

    let hz_to_mel = |hz: f32| 2595.0 * (1.0 + hz / 700.0).log10();
    let mel_to_hz = |mel: f32| 700.0 * (10f32.powf(mel / 2595.0) - 1.0);

    let mel_max = hz_to_mel(f_max);
    // n_mels + 2 evenly spaced points on the mel scale: each filter spans three.
    let band_edges: Vec<f32> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_max * i as f32 / (n_mels + 1) as f32))
        .collect();

    let mut filters = vec![0.0f32; n_mels * n_freqs];
    for mel_bin in 0..n_mels {
        let (lower, center, upper) = (
            band_edges[mel_bin],
            band_edges[mel_bin + 1],
            band_edges[mel_bin + 2],
        );
        for freq_bin in 0..n_freqs {
            let hz = f_max * freq_bin as f32 / (n_freqs - 1) as f32;
            let weight = if hz <= center {
                (hz - lower) / (center - lower)
            } else {
                (upper - hz) / (upper - center)
            };
            // Slaney-style area normalization so filter energy is rate-invariant.
            filters[mel_bin * n_freqs + freq_bin] =
                weight.max(0.0) * 2.0 / (upper - lower);
        }
    }

    filters
}

/// Detect the degenerate loops greedy decoding falls into on silence or noise:
/// the same token three times running, or the last trigram repeating.
fn is_repetitive(tokens: &[u32], next: u32) -> bool {
    let n = tokens.len();
    if n >= 2 && tokens[n - 1] == next && tokens[n - 2] == next {
        return true;
    }
    if n >= 5 {
        let candidate = [tokens[n - 2], tokens[n - 1], next];
        if tokens[n - 5..n - 2] == candidate {
            return true;
        }
    }
    false
}

/// Strip the special-token artifacts the tokenizer occasionally leaks even with
/// `skip_special_tokens`, then trim.
fn clean_transcript(raw: &str) -> String {
    raw.replace("<|startoftranscript|>", "")
        .replace("<|endoftext|>", "")
        .replace("<|notimestamps|>", "")
        .trim()
        .to_string()
}
