use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::TtsEngine;
use crate::audio::{Waveform, from_pcm_s16le};
use crate::process::run_process;

pub const DEFAULT_PIPER_SAMPLE_RATE: u32 = 22050;

#[derive(Debug, Deserialize)]
struct VoiceConfig {
    audio: Option<VoiceAudio>,
}

#[derive(Debug, Deserialize)]
struct VoiceAudio {
    sample_rate: Option<u32>,
}

/// Piper TTS: one process per request, one `.onnx` model file per voice.
pub struct PiperTts {
    binary: String,
    voices_dir: PathBuf,
    timeout: Duration,
    diagnostic_limit: usize,
}

impl PiperTts {
    pub fn new(
        binary: impl Into<String>,
        voices_dir: impl Into<PathBuf>,
        timeout: Duration,
        diagnostic_limit: usize,
    ) -> Self {
        Self {
            binary: binary.into(),
            voices_dir: voices_dir.into(),
            timeout,
            diagnostic_limit,
        }
    }

    pub fn model_path(&self, voice: &str) -> PathBuf {
        self.voices_dir.join(format!("{}.onnx", voice))
    }

    /// Output rate declared in the voice's `.onnx.json`.
    pub fn sample_rate(&self, voice: &str) -> u32 {
        voice_sample_rate(&self.voices_dir.join(format!("{}.onnx.json", voice)))
    }
}

fn voice_sample_rate(config_path: &Path) -> u32 {
    let parsed = std::fs::read(config_path)
        .map_err(anyhow::Error::from)
        .and_then(|bytes| Ok(serde_json::from_slice::<VoiceConfig>(&bytes)?));
    match parsed {
        Ok(cfg) => cfg
            .audio
            .and_then(|a| a.sample_rate)
            .unwrap_or(DEFAULT_PIPER_SAMPLE_RATE),
        Err(e) => {
            warn!(path = %config_path.display(), error = %e, "Unreadable voice config, assuming default sample rate");
            DEFAULT_PIPER_SAMPLE_RATE
        }
    }
}

#[async_trait]
impl TtsEngine for PiperTts {
    async fn synthesize(&self, text: &str, voice: &str) -> anyhow::Result<Waveform> {
        let model = self.model_path(voice);
        let sample_rate = self.sample_rate(voice);
        let args = [
            "--model".to_string(),
            model.to_string_lossy().into_owned(),
            "--output-raw".to_string(),
        ];

        let mut input = text.as_bytes().to_vec();
        input.push(b'\n');

        let raw = run_process(&self.binary, &args, input, self.timeout, self.diagnostic_limit).await?;
        debug!(voice, bytes = raw.len(), sample_rate, "Piper synthesis complete");

        Ok(Waveform::new(from_pcm_s16le(&raw), sample_rate))
    }

    fn name(&self) -> &str {
        "piper"
    }
}
