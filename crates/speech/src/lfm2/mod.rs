//! Combined ASR + TTS backed by a single audio language model.

pub mod runner;
pub mod tokens;

use async_trait::async_trait;
use tracing::debug;

pub use runner::{Lfm2Runner, RunnerCommand, RunnerRequest};
pub use tokens::GeneratedTokens;

use crate::asr::{AsrEngine, AsrInput, AudioIntake, TranscriptionResult};
use crate::audio::Waveform;
use crate::tts::TtsEngine;

const TRANSCRIBE_PROMPT: &str =
    "Transcribe the following audio to text. Output only the transcript, nothing else.";
const SYNTHESIZE_PROMPT: &str = "Respond with audio only.";

#[derive(Debug, Clone)]
pub struct Lfm2Options {
    pub max_new_tokens_transcribe: u32,
    pub max_new_tokens_synthesize: u32,
    /// Rate of decoded audio when the runner does not report one.
    pub sample_rate: u32,
}

pub struct Lfm2Audio {
    runner: Lfm2Runner,
    options: Lfm2Options,
}

impl Lfm2Audio {
    pub fn new(runner: Lfm2Runner, options: Lfm2Options) -> Self {
        Self { runner, options }
    }

    async fn generate(&self, request: RunnerRequest) -> anyhow::Result<GeneratedTokens> {
        let response = self.runner.call(request).await?;
        Ok(GeneratedTokens::split(response.tokens.unwrap_or_default()))
    }
}

/// System prompt for synthesis, naming the speaker, e.g. `uk_male` → "UK male".
pub fn synthesis_prompt(speaker: &str) -> String {
    let speaker = speaker.trim();
    if speaker.is_empty() {
        return SYNTHESIZE_PROMPT.to_string();
    }
    let described: Vec<String> = speaker
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| match part {
            "us" | "uk" => part.to_ascii_uppercase(),
            other => other.to_string(),
        })
        .collect();
    format!("{} Use the {} voice.", SYNTHESIZE_PROMPT, described.join(" "))
}

#[async_trait]
impl AsrEngine for Lfm2Audio {
    async fn transcribe(&self, input: AsrInput) -> anyhow::Result<TranscriptionResult> {
        let AsrInput::File { path, .. } = input else {
            anyhow::bail!("LFM2 expects a file upload");
        };

        let generated = self
            .generate(RunnerRequest::Generate {
                system: TRANSCRIBE_PROMPT.to_string(),
                text: None,
                audio_path: Some(path),
                max_new_tokens: self.options.max_new_tokens_transcribe,
            })
            .await?;

        debug!(text_tokens = generated.text_ids.len(), "LFM2 transcription generated");
        if generated.text_ids.is_empty() {
            return Ok(TranscriptionResult::default());
        }

        let response = self
            .runner
            .call(RunnerRequest::DetokenizeText {
                ids: generated.text_ids,
            })
            .await?;
        Ok(TranscriptionResult::text(
            response.text.unwrap_or_default().trim(),
        ))
    }

    fn name(&self) -> &str {
        "lfm2_audio"
    }

    fn intake(&self) -> AudioIntake {
        AudioIntake::FilePath
    }
}

#[async_trait]
impl TtsEngine for Lfm2Audio {
    async fn synthesize(&self, text: &str, voice: &str) -> anyhow::Result<Waveform> {
        let generated = self
            .generate(RunnerRequest::Generate {
                system: synthesis_prompt(voice),
                text: Some(text.to_string()),
                audio_path: None,
                max_new_tokens: self.options.max_new_tokens_synthesize,
            })
            .await?;

        let Some(frames) = generated.decodable_audio() else {
            return Ok(Waveform::new(Vec::new(), self.options.sample_rate));
        };
        debug!(frames = frames.len(), voice, "LFM2 synthesis generated");
        if frames.is_empty() {
            return Ok(Waveform::new(Vec::new(), self.options.sample_rate));
        }

        let response = self.runner.call(RunnerRequest::DecodeAudio { frames }).await?;
        let samples = response.audio_samples()?;
        let sample_rate = response.sample_rate.unwrap_or(self.options.sample_rate);
        Ok(Waveform::new(samples, sample_rate))
    }

    fn name(&self) -> &str {
        "lfm2_audio"
    }
}
