use std::fmt;
use std::future::Future;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::asr::{AsrInput, AudioIntake, TranscriptionResult};
use crate::audio::{
    self, AudioBuffer, AudioFormat, Waveform, decode_wav, encode_wav, from_pcm_s16le,
    to_pcm_s16le,
};
use crate::config::PipelineConfig;
use crate::error::SpeechError;
use crate::registry::EngineRegistry;
use crate::transcoder::{AudioSpec, Source, Transcoder};
use crate::voices::VoiceCatalog;

/// Container of synthesized audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Ogg,
    Wav,
}

impl OutputFormat {
    pub const ACCEPTED: &'static [&'static str] = &["ogg", "wav"];

    pub fn media_type(&self) -> &'static str {
        match self {
            OutputFormat::Ogg => "audio/ogg",
            OutputFormat::Wav => "audio/wav",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = SpeechError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ogg" => Ok(OutputFormat::Ogg),
            "wav" => Ok(OutputFormat::Wav),
            other => Err(SpeechError::InvalidInput(format!(
                "Unsupported format '{}' (expected one of: {})",
                other,
                Self::ACCEPTED.join(", ")
            ))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Ogg => f.write_str("ogg"),
            OutputFormat::Wav => f.write_str("wav"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: Option<String>,
    pub format: OutputFormat,
}

#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub voice: String,
    pub sample_rate: u32,
}

/// The transcribe and synthesize pipelines over a shared engine registry.
pub struct SpeechService {
    registry: Arc<EngineRegistry>,
    voices: VoiceCatalog,
    transcoder: Transcoder,
    config: PipelineConfig,
}

impl SpeechService {
    pub fn new(
        registry: Arc<EngineRegistry>,
        voices: VoiceCatalog,
        transcoder: Transcoder,
        config: PipelineConfig,
    ) -> Self {
        Self {
            registry,
            voices,
            transcoder,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<EngineRegistry> {
        &self.registry
    }

    pub fn voices(&self) -> &VoiceCatalog {
        &self.voices
    }

    pub async fn transcribe(&self, upload: AudioBuffer) -> Result<TranscriptionResult, SpeechError> {
        if upload.is_empty() {
            return Err(SpeechError::InvalidInput("Empty audio file".to_string()));
        }

        let engine = self.registry.asr().await?;
        let start = Instant::now();
        let format = upload.format;
        let input_bytes = upload.bytes.len();

        let mut result = match engine.intake() {
            AudioIntake::Samples { sample_rate } => {
                let waveform = self.decode_upload(upload, sample_rate).await?;
                if waveform.is_empty() {
                    return Err(SpeechError::InvalidInput(
                        "Audio file contains no samples".to_string(),
                    ));
                }
                debug!(audio_secs = waveform.duration_secs(), sample_rate, "Upload decoded");
                self.bounded(engine.transcribe(AsrInput::Samples(waveform)))
                    .await?
            }
            AudioIntake::FilePath => {
                // Removed when dropped, including on every error path below.
                let file = write_temp_upload(upload).await?;
                let input = AsrInput::File {
                    path: file.path().to_path_buf(),
                    format,
                };
                let result = self.bounded(engine.transcribe(input)).await;
                drop(file);
                result?
            }
        };

        result.text = result.text.trim().to_string();
        info!(
            engine = engine.name(),
            ?format,
            input_bytes,
            text_len = result.text.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Transcribed"
        );
        Ok(result)
    }

    pub async fn synthesize(&self, request: SynthesisRequest) -> Result<SynthesizedAudio, SpeechError> {
        let text = request.text.trim();
        if text.is_empty() {
            return Err(SpeechError::InvalidInput("Empty text".to_string()));
        }

        let selection = self.voices.resolve(request.voice.as_deref())?;
        if selection.substituted() {
            debug!(
                requested = ?selection.requested,
                resolved = %selection.resolved,
                "Unknown voice, using default"
            );
        }

        let engine = self.registry.tts().await?;
        let start = Instant::now();
        let waveform = self
            .bounded(engine.synthesize(text, &selection.resolved))
            .await?;
        if waveform.is_empty() {
            return Err(SpeechError::NoAudio);
        }

        let bytes = self.encode(&waveform, request.format).await?;
        info!(
            engine = engine.name(),
            voice = %selection.resolved,
            format = %request.format,
            samples = waveform.samples.len(),
            sample_rate = waveform.sample_rate,
            output_bytes = bytes.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Synthesized"
        );

        Ok(SynthesizedAudio {
            bytes,
            format: request.format,
            voice: selection.resolved,
            sample_rate: waveform.sample_rate,
        })
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, SpeechError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        let outcome = match self.config.inference_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| SpeechError::EngineTimeout(limit))?,
            None => call.await,
        };
        outcome.map_err(SpeechError::from_engine)
    }

    /// Decodes an upload to mono samples at `sample_rate`.
    ///
    /// WAV is decoded and resampled on the blocking pool. Everything else, or a WAV
    /// hound rejects, is handed to the transcoder as a private temp file.
    async fn decode_upload(&self, upload: AudioBuffer, sample_rate: u32) -> Result<Waveform, SpeechError> {
        let upload = if upload.format == AudioFormat::Wav {
            let (upload, decoded) = blocking(move || {
                let decoded = decode_wav(&upload.bytes).and_then(|wave| {
                    let samples = audio::resample(&wave.samples, wave.sample_rate, sample_rate)?;
                    Ok(Waveform::new(samples, sample_rate))
                });
                (upload, decoded)
            })
            .await?;
            match decoded {
                Ok(waveform) => return Ok(waveform),
                Err(e) => {
                    warn!(error = %e, "In-process WAV decode failed, falling back to transcoder");
                    upload
                }
            }
        } else {
            upload
        };

        let file = write_temp_upload(upload).await?;
        let pcm = self
            .transcoder
            .transcode(
                Source::File(file.path()),
                &AudioSpec::probe(),
                &AudioSpec::pcm_s16le(sample_rate, 1),
                self.config.decode_timeout,
            )
            .await;
        drop(file);
        Ok(Waveform::new(from_pcm_s16le(&pcm?), sample_rate))
    }

    async fn encode(&self, waveform: &Waveform, format: OutputFormat) -> Result<Vec<u8>, SpeechError> {
        match format {
            OutputFormat::Wav => {
                encode_wav(waveform).map_err(|e| SpeechError::Encoding(format!("{:#}", e)))
            }
            OutputFormat::Ogg => {
                let pcm = to_pcm_s16le(&waveform.samples);
                let ogg = self
                    .transcoder
                    .transcode(
                        Source::Pipe(&pcm),
                        &AudioSpec::pcm_s16le(waveform.sample_rate, 1),
                        &AudioSpec::ogg_opus(self.config.opus_bitrate_kbps),
                        self.config.encode_timeout,
                    )
                    .await?;
                if ogg.is_empty() {
                    return Err(SpeechError::Encoding(format!(
                        "'{}' produced no output",
                        self.transcoder.program()
                    )));
                }
                Ok(ogg)
            }
        }
    }
}

/// Runs CPU-bound or sync-I/O work off the async workers.
async fn blocking<T, F>(work: F) -> Result<T, SpeechError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| SpeechError::Engine(format!("Blocking task join error: {}", e)))
}

async fn write_temp_upload(upload: AudioBuffer) -> Result<tempfile::NamedTempFile, SpeechError> {
    blocking(move || {
        let suffix = format!(".{}", upload.format.extension());
        let mut file = tempfile::Builder::new()
            .prefix("speechgate-")
            .suffix(&suffix)
            .tempfile()
            .map_err(|e| SpeechError::Engine(format!("Failed to create temp file: {}", e)))?;
        file.write_all(&upload.bytes)
            .and_then(|_| file.flush())
            .map_err(|e| SpeechError::Engine(format!("Failed to buffer upload: {}", e)))?;
        Ok(file)
    })
    .await?
}
