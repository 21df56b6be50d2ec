use async_trait::async_trait;
use speechgate_speech::{
    AsrEngine, AsrInput, AudioIntake, EngineHandle, EngineKind, EngineLoader, EngineRegistry,
    PipelineConfig, SpeechService, Transcoder, TranscriptionResult, TtsEngine, VoiceCatalog,
    VoicePolicy, VoiceSource, Waveform,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const VOICES: &[&str] = &["us_female", "us_male", "uk_female", "uk_male"];

/// ASR that answers with fixed text and remembers what it received.
pub struct FakeAsr {
    pub text: String,
    pub intake: AudioIntake,
    pub received: Mutex<Vec<usize>>,
}

impl FakeAsr {
    pub fn samples(text: &str) -> Self {
        Self {
            text: text.to_string(),
            intake: AudioIntake::Samples { sample_rate: 16_000 },
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn file_path(text: &str) -> Self {
        Self {
            intake: AudioIntake::FilePath,
            ..Self::samples(text)
        }
    }
}

#[async_trait]
impl AsrEngine for FakeAsr {
    async fn transcribe(&self, input: AsrInput) -> anyhow::Result<TranscriptionResult> {
        let size = match input {
            AsrInput::Samples(wave) => wave.samples.len(),
            AsrInput::File { path, .. } => std::fs::metadata(&path)?.len() as usize,
        };
        self.received.lock().unwrap().push(size);
        Ok(TranscriptionResult::text(format!("  {}  ", self.text)))
    }

    fn name(&self) -> &str {
        "fake-asr"
    }

    fn intake(&self) -> AudioIntake {
        self.intake
    }
}

pub struct FailingAsr;

#[async_trait]
impl AsrEngine for FailingAsr {
    async fn transcribe(&self, _input: AsrInput) -> anyhow::Result<TranscriptionResult> {
        anyhow::bail!("decoder state corrupted")
    }

    fn name(&self) -> &str {
        "failing-asr"
    }

    fn intake(&self) -> AudioIntake {
        AudioIntake::Samples { sample_rate: 16_000 }
    }
}

/// TTS emitting `samples` frames of a tone, or nothing when `samples` is 0.
pub struct FakeTts {
    pub sample_rate: u32,
    pub samples: usize,
    pub delay: Duration,
    pub voices: Mutex<Vec<String>>,
}

impl FakeTts {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            samples: sample_rate as usize / 2,
            delay: Duration::ZERO,
            voices: Mutex::new(Vec::new()),
        }
    }

    pub fn silent() -> Self {
        Self {
            samples: 0,
            ..Self::new(24_000)
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(24_000)
        }
    }
}

#[async_trait]
impl TtsEngine for FakeTts {
    async fn synthesize(&self, _text: &str, voice: &str) -> anyhow::Result<Waveform> {
        self.voices.lock().unwrap().push(voice.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let samples = (0..self.samples)
            .map(|i| (i as f32 * 0.05).sin() * 0.5)
            .collect();
        Ok(Waveform::new(samples, self.sample_rate))
    }

    fn name(&self) -> &str {
        "fake-tts"
    }
}

/// Hands out a prebuilt engine, counting load attempts.
pub struct StaticLoader {
    pub kind: EngineKind,
    pub handle: EngineHandle,
    pub delay: Duration,
    pub attempts: Arc<AtomicUsize>,
}

impl StaticLoader {
    pub fn new(kind: EngineKind, handle: EngineHandle) -> Self {
        Self {
            kind,
            handle,
            delay: Duration::ZERO,
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn asr(engine: Arc<dyn AsrEngine>) -> Self {
        Self::new(EngineKind::Asr, EngineHandle::Asr(engine))
    }

    pub fn tts(engine: Arc<dyn TtsEngine>) -> Self {
        Self::new(EngineKind::Tts, EngineHandle::Tts(engine))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl EngineLoader for StaticLoader {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    fn backend(&self) -> &str {
        "static"
    }

    async fn load(&self) -> anyhow::Result<EngineHandle> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(self.handle.clone())
    }
}

pub struct FailingLoader {
    pub kind: EngineKind,
    pub attempts: Arc<AtomicUsize>,
}

impl FailingLoader {
    pub fn new(kind: EngineKind) -> Self {
        Self {
            kind,
            attempts: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl EngineLoader for FailingLoader {
    fn kind(&self) -> EngineKind {
        self.kind
    }

    fn backend(&self) -> &str {
        "broken"
    }

    async fn load(&self) -> anyhow::Result<EngineHandle> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("model file is truncated")
    }
}

/// Assembles a service with the default transcoder and a roster of [`VOICES`].
pub fn service(asr: Arc<dyn AsrEngine>, tts: Arc<dyn TtsEngine>, policy: VoicePolicy) -> SpeechService {
    service_with(
        vec![
            Arc::new(StaticLoader::asr(asr)) as Arc<dyn EngineLoader>,
            Arc::new(StaticLoader::tts(tts)) as Arc<dyn EngineLoader>,
        ],
        VoiceCatalog::new(policy, roster(), VOICES[0]),
        Transcoder::new("ffmpeg", 200),
        PipelineConfig::default(),
    )
}

pub fn service_with(
    loaders: Vec<Arc<dyn EngineLoader>>,
    voices: VoiceCatalog,
    transcoder: Transcoder,
    config: PipelineConfig,
) -> SpeechService {
    SpeechService::new(Arc::new(EngineRegistry::new(loaders)), voices, transcoder, config)
}

pub fn roster() -> VoiceSource {
    VoiceSource::Roster(VOICES.iter().map(|v| v.to_string()).collect())
}
