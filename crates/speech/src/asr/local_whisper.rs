use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use super::{AsrEngine, AsrInput, AudioIntake, TranscriptionResult};

pub const WHISPER_SAMPLE_RATE: u32 = 16000;

/// Local Whisper ASR engine using whisper.cpp via whisper-rs.
pub struct LocalWhisperAsr {
    ctx: Arc<WhisperContext>,
    language: Option<String>,
    threads: Option<i32>,
}

impl LocalWhisperAsr {
    /// Loads a GGML Whisper model (e.g. ggml-base.en.bin) from disk.
    pub fn new(
        model_path: &str,
        language: Option<String>,
        threads: Option<i32>,
    ) -> anyhow::Result<Self> {
        info!(model_path, "Loading Whisper model");
        let ctx = WhisperContext::new_with_params(model_path, WhisperContextParameters::default())
            .map_err(|e| anyhow::anyhow!("Failed to load Whisper model '{}': {}", model_path, e))?;
        info!("Whisper model loaded");
        Ok(Self {
            ctx: Arc::new(ctx),
            language,
            threads,
        })
    }
}

#[async_trait]
impl AsrEngine for LocalWhisperAsr {
    async fn transcribe(&self, input: AsrInput) -> anyhow::Result<TranscriptionResult> {
        let AsrInput::Samples(waveform) = input else {
            anyhow::bail!("Whisper expects decoded samples");
        };
        if waveform.sample_rate != WHISPER_SAMPLE_RATE {
            anyhow::bail!(
                "Whisper expects {} Hz audio, got {} Hz",
                WHISPER_SAMPLE_RATE,
                waveform.sample_rate
            );
        }

        let ctx = Arc::clone(&self.ctx);
        let lang = self.language.clone();
        let threads = self.threads;

        // whisper-rs is CPU-bound; run on blocking thread pool
        tokio::task::spawn_blocking(move || -> anyhow::Result<TranscriptionResult> {
            let mut state = ctx
                .create_state()
                .map_err(|e| anyhow::anyhow!("Failed to create Whisper state: {}", e))?;

            let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

            match lang.as_deref() {
                Some(lang) => params.set_language(Some(lang)),
                None => params.set_language(Some("auto")),
            }
            if let Some(n) = threads {
                params.set_n_threads(n);
            }

            params.set_print_progress(false);
            params.set_print_special(false);
            params.set_print_realtime(false);
            params.set_print_timestamps(false);

            state
                .full(params, &waveform.samples)
                .map_err(|e| anyhow::anyhow!("Whisper transcription failed: {}", e))?;

            let n_segments = state.full_n_segments();

            let mut text = String::new();
            for i in 0..n_segments {
                if let Some(segment) = state.get_segment(i) {
                    if let Ok(seg_text) = segment.to_str() {
                        text.push_str(seg_text);
                    }
                }
            }

            let text = text.trim().to_string();
            // Under auto-detect, report what whisper settled on rather than the hint.
            let language = lang.or_else(|| {
                whisper_rs::get_lang_str(state.full_lang_id_from_state()).map(str::to_string)
            });
            debug!(text_len = text.len(), n_segments, ?language, "Whisper transcription complete");

            Ok(TranscriptionResult {
                text,
                language,
                language_probability: None,
            })
        })
        .await
        .map_err(|e| anyhow::anyhow!("Whisper task join error: {}", e))?
    }

    fn name(&self) -> &str {
        "whisper"
    }

    fn intake(&self) -> AudioIntake {
        AudioIntake::Samples {
            sample_rate: WHISPER_SAMPLE_RATE,
        }
    }
}
