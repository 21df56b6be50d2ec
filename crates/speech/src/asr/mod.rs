#[cfg(feature = "local-whisper")]
pub mod local_whisper;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::audio::{AudioFormat, Waveform};

/// How an ASR engine wants to receive audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioIntake {
    /// Decoded mono samples at the given rate.
    Samples { sample_rate: u32 },
    /// The original upload written to a private temporary file.
    FilePath,
}

pub enum AsrInput {
    Samples(Waveform),
    File { path: PathBuf, format: AudioFormat },
}

/// Result of an ASR transcription.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_probability: Option<f32>,
}

impl TranscriptionResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Trait for pluggable ASR engines.
#[async_trait]
pub trait AsrEngine: Send + Sync + 'static {
    /// Transcribes one complete upload.
    async fn transcribe(&self, input: AsrInput) -> anyhow::Result<TranscriptionResult>;

    /// Human-readable backend name.
    fn name(&self) -> &str;

    fn intake(&self) -> AudioIntake;
}
