//! Backend profiles: which engines get loaded and how voices are resolved.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use speechgate_config::Settings;
use tracing::info;

use crate::config::PipelineConfig;
use crate::lfm2::{Lfm2Audio, Lfm2Options, Lfm2Runner, RunnerCommand};
use crate::registry::{EngineHandle, EngineKind, EngineLoader, EngineRegistry};
use crate::service::SpeechService;
use crate::transcoder::Transcoder;
use crate::tts::piper::PiperTts;
use crate::voices::bootstrap::VoiceBootstrap;
use crate::voices::{VoiceCatalog, VoicePolicy, VoiceSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendProfile {
    /// One audio LM for both directions.
    Lfm2Audio,
    WhisperPiper,
    WhisperKokoro,
}

impl BackendProfile {
    pub fn default_policy(&self) -> VoicePolicy {
        match self {
            BackendProfile::WhisperPiper => VoicePolicy::Strict,
            BackendProfile::Lfm2Audio | BackendProfile::WhisperKokoro => VoicePolicy::Lenient,
        }
    }
}

impl FromStr for BackendProfile {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lfm2_audio" | "lfm2" => Ok(BackendProfile::Lfm2Audio),
            "whisper_piper" => Ok(BackendProfile::WhisperPiper),
            "whisper_kokoro" => Ok(BackendProfile::WhisperKokoro),
            other => anyhow::bail!(
                "Unknown backend profile '{}' (expected lfm2_audio, whisper_piper or whisper_kokoro)",
                other
            ),
        }
    }
}

impl fmt::Display for BackendProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendProfile::Lfm2Audio => f.write_str("lfm2_audio"),
            BackendProfile::WhisperPiper => f.write_str("whisper_piper"),
            BackendProfile::WhisperKokoro => f.write_str("whisper_kokoro"),
        }
    }
}

pub struct WhisperLoader {
    pub model_path: String,
    pub language: Option<String>,
    pub threads: Option<i32>,
}

#[async_trait]
impl EngineLoader for WhisperLoader {
    fn kind(&self) -> EngineKind {
        EngineKind::Asr
    }

    fn backend(&self) -> &str {
        "whisper"
    }

    #[cfg(feature = "local-whisper")]
    async fn load(&self) -> anyhow::Result<EngineHandle> {
        use crate::asr::local_whisper::LocalWhisperAsr;

        let model_path = self.model_path.clone();
        let language = self.language.clone();
        let threads = self.threads;
        let asr = tokio::task::spawn_blocking(move || {
            LocalWhisperAsr::new(&model_path, language, threads)
        })
        .await
        .map_err(|e| anyhow::anyhow!("Whisper load task join error: {}", e))??;
        Ok(EngineHandle::Asr(Arc::new(asr)))
    }

    #[cfg(not(feature = "local-whisper"))]
    async fn load(&self) -> anyhow::Result<EngineHandle> {
        anyhow::bail!("built without the `local-whisper` feature")
    }
}

pub struct PiperLoader {
    pub binary: String,
    pub voices_dir: PathBuf,
    pub timeout: Duration,
    pub diagnostic_limit: usize,
}

#[async_trait]
impl EngineLoader for PiperLoader {
    fn kind(&self) -> EngineKind {
        EngineKind::Tts
    }

    fn backend(&self) -> &str {
        "piper"
    }

    async fn load(&self) -> anyhow::Result<EngineHandle> {
        Ok(EngineHandle::Tts(Arc::new(PiperTts::new(
            self.binary.clone(),
            self.voices_dir.clone(),
            self.timeout,
            self.diagnostic_limit,
        ))))
    }
}

pub struct KokoroLoader {
    pub model_path: String,
    pub voices_dir: PathBuf,
    pub speakers: Vec<String>,
    pub espeak_binary: String,
    pub language: String,
    pub speed: f32,
    pub diagnostic_limit: usize,
}

#[async_trait]
impl EngineLoader for KokoroLoader {
    fn kind(&self) -> EngineKind {
        EngineKind::Tts
    }

    fn backend(&self) -> &str {
        "kokoro"
    }

    #[cfg(feature = "kokoro")]
    async fn load(&self) -> anyhow::Result<EngineHandle> {
        use crate::tts::kokoro::{KokoroOptions, KokoroTts};

        let options = KokoroOptions {
            model_path: self.model_path.clone(),
            voices_dir: self.voices_dir.clone(),
            speakers: self.speakers.clone(),
            espeak_binary: self.espeak_binary.clone(),
            language: self.language.clone(),
            speed: self.speed,
            diagnostic_limit: self.diagnostic_limit,
        };
        let tts = tokio::task::spawn_blocking(move || KokoroTts::new(options))
            .await
            .map_err(|e| anyhow::anyhow!("Kokoro load task join error: {}", e))??;
        Ok(EngineHandle::Tts(Arc::new(tts)))
    }

    #[cfg(not(feature = "kokoro"))]
    async fn load(&self) -> anyhow::Result<EngineHandle> {
        anyhow::bail!("built without the `kokoro` feature")
    }
}

pub struct Lfm2Loader {
    pub command: RunnerCommand,
    pub options: Lfm2Options,
}

impl Lfm2Loader {
    pub fn from_settings(settings: &Settings) -> Self {
        let lfm2 = &settings.lfm2;
        let cache_dir = format!(
            "{}/lfm2-audio",
            settings.backend.models_dir.trim_end_matches('/')
        );
        let mut args = vec![
            lfm2.script.clone(),
            "--repo".to_string(),
            lfm2.repo.clone(),
            "--cache-dir".to_string(),
            cache_dir,
        ];
        if let Some(gguf) = &lfm2.gguf_file {
            args.extend(["--gguf-file".to_string(), gguf.clone()]);
        }

        Self {
            command: RunnerCommand {
                program: lfm2.python.clone(),
                args,
                startup_timeout: Duration::from_secs(lfm2.startup_timeout_secs),
            },
            options: Lfm2Options {
                max_new_tokens_transcribe: lfm2.max_new_tokens_transcribe,
                max_new_tokens_synthesize: lfm2.max_new_tokens_synthesize,
                sample_rate: lfm2.sample_rate,
            },
        }
    }
}

#[async_trait]
impl EngineLoader for Lfm2Loader {
    fn kind(&self) -> EngineKind {
        EngineKind::Combined
    }

    fn backend(&self) -> &str {
        "lfm2_audio"
    }

    async fn load(&self) -> anyhow::Result<EngineHandle> {
        let runner = Lfm2Runner::start(&self.command).await?;
        Ok(EngineHandle::combined(Arc::new(Lfm2Audio::new(
            runner,
            self.options.clone(),
        ))))
    }
}

fn whisper_loader(settings: &Settings) -> Arc<dyn EngineLoader> {
    Arc::new(WhisperLoader {
        model_path: settings.whisper.model_path.clone(),
        language: settings.whisper.language.clone(),
        threads: settings.whisper.threads,
    })
}

pub fn piper_voices_dir(settings: &Settings) -> PathBuf {
    PathBuf::from(settings.piper.resolved_voices_dir(&settings.backend.models_dir))
}

/// Engine loaders and voice catalog for `profile`.
pub fn build_components(
    profile: BackendProfile,
    settings: &Settings,
) -> anyhow::Result<(Vec<Arc<dyn EngineLoader>>, VoiceCatalog)> {
    let policy = match &settings.voices.policy {
        Some(raw) => raw.parse::<VoicePolicy>().map_err(anyhow::Error::msg)?,
        None => profile.default_policy(),
    };
    let diagnostic_limit = settings.transcoder.diagnostic_limit;

    let components: (Vec<Arc<dyn EngineLoader>>, VoiceCatalog) = match profile {
        BackendProfile::Lfm2Audio => (
            vec![Arc::new(Lfm2Loader::from_settings(settings)) as Arc<dyn EngineLoader>],
            VoiceCatalog::new(
                policy,
                VoiceSource::Roster(settings.lfm2.speakers.clone()),
                settings.lfm2.default_speaker.clone(),
            ),
        ),
        BackendProfile::WhisperPiper => {
            let voices_dir = piper_voices_dir(settings);
            (
                vec![
                    whisper_loader(settings),
                    Arc::new(PiperLoader {
                        binary: settings.piper.binary.clone(),
                        voices_dir: voices_dir.clone(),
                        timeout: Duration::from_secs(settings.piper.timeout_secs),
                        diagnostic_limit,
                    }) as Arc<dyn EngineLoader>,
                ],
                VoiceCatalog::new(
                    policy,
                    VoiceSource::Installed(voices_dir),
                    settings.piper.default_voice.clone(),
                ),
            )
        }
        BackendProfile::WhisperKokoro => (
            vec![
                whisper_loader(settings),
                Arc::new(KokoroLoader {
                    model_path: settings.kokoro.model_path.clone(),
                    voices_dir: PathBuf::from(&settings.kokoro.voices_dir),
                    speakers: settings.kokoro.speakers.clone(),
                    espeak_binary: settings.kokoro.espeak_binary.clone(),
                    language: settings.kokoro.language.clone(),
                    speed: settings.kokoro.speed,
                    diagnostic_limit,
                }) as Arc<dyn EngineLoader>,
            ],
            VoiceCatalog::new(
                policy,
                VoiceSource::Roster(settings.kokoro.speakers.clone()),
                settings.kokoro.default_speaker.clone(),
            ),
        ),
    };
    Ok(components)
}

/// Composition root for the speech pipeline.
pub fn build_service(settings: &Settings) -> anyhow::Result<SpeechService> {
    let profile: BackendProfile = settings.backend.profile.parse()?;
    let (loaders, voices) = build_components(profile, settings)?;
    let registry = EngineRegistry::new(loaders);

    info!(
        %profile,
        backends = ?registry.backends(),
        voice_policy = %voices.policy(),
        default_voice = voices.default_voice(),
        "Speech pipeline configured"
    );

    Ok(SpeechService::new(
        Arc::new(registry),
        voices,
        Transcoder::new(
            settings.transcoder.program.clone(),
            settings.transcoder.diagnostic_limit,
        ),
        PipelineConfig::from_settings(&settings.transcoder, settings.inference.timeout_secs),
    ))
}

pub fn voice_bootstrap(settings: &Settings) -> VoiceBootstrap {
    VoiceBootstrap::new(
        settings.piper.download_base_url.clone(),
        piper_voices_dir(settings),
    )
}
