//! # Audio Decoding
//!
//! Turns whatever the client uploaded into the 16kHz mono f32 samples the
//! Whisper backend expects. The upload path always stamps a `.wav` suffix on the
//! temp file, but the bytes inside are whatever the client recorded - so this
//! module sniffs rather than trusts:
//!
//! - A RIFF header means a real WAV container; parse it and honor its format.
//! - Anything else is treated as headerless 16-bit little-endian PCM at 16kHz,
//!   which is what the native client's raw capture path produces.
//!
//! Decode failures come back as errors and end up in the `{text, error}`
//! response body; they never crash a request handler.

use anyhow::{anyhow, Result};
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use std::path::Path;

/// Sample rate the Whisper models are trained on.
pub const SAMPLE_RATE: u32 = 16_000;

/// Decode the audio file at `path` to 16kHz mono f32 PCM in [-1.0, 1.0].
pub fn decode_audio_file(path: &Path) -> Result<Vec<f32>> {
    let bytes = std::fs::read(path)
        .map_err(|e| anyhow!("Failed to read audio file {}: {}", path.display(), e))?;

    if bytes.is_empty() {
        return Err(anyhow!("Audio file {} is empty", path.display()));
    }

    let samples = if bytes.starts_with(b"RIFF") {
        decode_wav(&bytes)?
    } else {
        pcm16_from_raw(&bytes)?
    };

    if samples.is_empty() {
        return Err(anyhow!("Audio file {} contains no samples", path.display()));
    }

    Ok(samples)
}

/// Parse a RIFF/WAVE container and normalize it to 16kHz mono.
fn decode_wav(bytes: &[u8]) -> Result<Vec<f32>> {
    let mut cursor = Cursor::new(bytes);
    let (header, data) = wav::read(&mut cursor).map_err(|e| anyhow!("Invalid WAV data: {}", e))?;

    let interleaved: Vec<f32> = match data {
        wav::BitDepth::Eight(samples) => samples
            .into_iter()
            .map(|s| (f32::from(s) - 128.0) / 128.0)
            .collect(),
        wav::BitDepth::Sixteen(samples) => samples
            .into_iter()
            .map(|s| f32::from(s) / 32768.0)
            .collect(),
        wav::BitDepth::TwentyFour(samples) => samples
            .into_iter()
            .map(|s| s as f32 / 8_388_608.0)
            .collect(),
        wav::BitDepth::ThirtyTwoFloat(samples) => samples,
        wav::BitDepth::Empty => Vec::new(),
    };

    let mono = downmix(interleaved, header.channel_count);
    Ok(resample_linear(mono, header.sampling_rate, SAMPLE_RATE))
}

/// Interpret headerless bytes as 16-bit little-endian PCM, already at 16kHz mono.
fn pcm16_from_raw(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 2 != 0 {
        return Err(anyhow!(
            "Raw audio length must be even for 16-bit samples (got {} bytes)",
            bytes.len()
        ));
    }

    let mut cursor = Cursor::new(bytes);
    let mut samples = Vec::with_capacity(bytes.len() / 2);
    while let Ok(sample) = cursor.read_i16::<LittleEndian>() {
        samples.push(f32::from(sample) / 32768.0);
    }

    Ok(samples)
}

/// Average interleaved channels down to mono.
fn downmix(interleaved: Vec<f32>, channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return interleaved;
    }

    let channels = channels as usize;
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Naive linear-interpolation resampler. Quality is fine for speech; the model
/// is far more tolerant of interpolation artifacts than of a wrong sample rate.
fn resample_linear(samples: Vec<f32>, from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples;
    }

    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let out_len = (samples.len() as f64 / ratio).floor() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos.floor() as usize;
        let frac = (pos - pos.floor()) as f32;

        let a = samples[idx];
        let b = samples.get(idx + 1).copied().unwrap_or(a);
        out.push(a + (b - a) * frac);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_wav(header: wav::Header, data: wav::BitDepth) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".wav")
            .tempfile()
            .expect("create temp wav");
        wav::write(header, &data, file.as_file_mut()).expect("write wav");
        file.as_file_mut().flush().expect("flush wav");
        file
    }

    #[test]
    fn test_decode_16bit_mono_wav() {
        let header = wav::Header::new(wav::WAV_FORMAT_PCM, 1, SAMPLE_RATE, 16);
        let samples: Vec<i16> = vec![0, 16384, -16384, 32767];
        let file = write_temp_wav(header, wav::BitDepth::Sixteen(samples));

        let decoded = decode_audio_file(file.path()).expect("decode");
        assert_eq!(decoded.len(), 4);
        assert!((decoded[0]).abs() < 1e-6);
        assert!((decoded[1] - 0.5).abs() < 1e-3);
        assert!((decoded[2] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_decode_stereo_wav_downmixes() {
        let header = wav::Header::new(wav::WAV_FORMAT_PCM, 2, SAMPLE_RATE, 16);
        // L=16384, R=-16384 should cancel out to silence.
        let samples: Vec<i16> = vec![16384, -16384, 16384, -16384];
        let file = write_temp_wav(header, wav::BitDepth::Sixteen(samples));

        let decoded = decode_audio_file(file.path()).expect("decode");
        assert_eq!(decoded.len(), 2);
        for s in decoded {
            assert!(s.abs() < 1e-3);
        }
    }

    #[test]
    fn test_headerless_bytes_fall_back_to_raw_pcm() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        // 16-bit LE samples: 0, 16384
        file.write_all(&[0x00, 0x00, 0x00, 0x40]).expect("write");
        file.flush().expect("flush");

        let decoded = decode_audio_file(file.path()).expect("decode");
        assert_eq!(decoded.len(), 2);
        assert!((decoded[1] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_odd_length_raw_bytes_rejected() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        file.write_all(&[0x01, 0x02, 0x03]).expect("write");
        file.flush().expect("flush");

        assert!(decode_audio_file(file.path()).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(decode_audio_file(Path::new("/nonexistent/clip.wav")).is_err());
    }

    #[test]
    fn test_resample_halves_length() {
        let samples: Vec<f32> = (0..32000).map(|i| (i as f32 / 32000.0).sin()).collect();
        let out = resample_linear(samples, 32000, 16000);
        assert_eq!(out.len(), 16000);
    }

    #[test]
    fn test_resample_same_rate_is_identity() {
        let samples = vec![0.1, 0.2, 0.3];
        let out = resample_linear(samples.clone(), 16000, 16000);
        assert_eq!(out, samples);
    }
}
