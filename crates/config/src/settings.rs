use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub backend: BackendSettings,
    pub whisper: WhisperSettings,
    pub lfm2: Lfm2Settings,
    pub piper: PiperSettings,
    pub kokoro: KokoroSettings,
    pub voices: VoiceSettings,
    pub transcoder: TranscoderSettings,
    pub inference: InferenceSettings,
    pub bootstrap: BootstrapSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    pub max_upload_bytes: usize,
    /// Load engines at startup instead of on the first request.
    pub preload: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendSettings {
    /// "lfm2_audio", "whisper_piper" or "whisper_kokoro".
    pub profile: String,
    pub models_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WhisperSettings {
    pub model_path: String,
    /// Language hint for ASR (e.g. "en", "de"). None = auto-detect.
    pub language: Option<String>,
    pub threads: Option<i32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Lfm2Settings {
    pub python: String,
    pub script: String,
    pub repo: String,
    pub gguf_file: Option<String>,
    pub max_new_tokens_transcribe: u32,
    pub max_new_tokens_synthesize: u32,
    pub sample_rate: u32,
    pub speakers: Vec<String>,
    pub default_speaker: String,
    pub startup_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PiperSettings {
    pub binary: String,
    /// Defaults to `<models_dir>/piper` when unset.
    pub voices_dir: Option<String>,
    pub default_voice: String,
    pub timeout_secs: u64,
    pub download_base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KokoroSettings {
    pub model_path: String,
    pub voices_dir: String,
    pub speakers: Vec<String>,
    pub default_speaker: String,
    pub espeak_binary: String,
    pub language: String,
    pub speed: f32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VoiceSettings {
    /// "strict" or "lenient". Unset follows the backend profile.
    pub policy: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TranscoderSettings {
    pub program: String,
    pub decode_timeout_secs: u64,
    pub encode_timeout_secs: u64,
    pub opus_bitrate_kbps: u32,
    /// Maximum number of stderr characters carried into error messages.
    pub diagnostic_limit: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InferenceSettings {
    /// Upper bound for a single engine call. None = unbounded.
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BootstrapSettings {
    /// Fetch the default voice before serving.
    pub on_start: bool,
}

impl PiperSettings {
    pub fn resolved_voices_dir(&self, models_dir: &str) -> String {
        match &self.voices_dir {
            Some(dir) => dir.clone(),
            None => format!("{}/piper", models_dir.trim_end_matches('/')),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("SPEECHGATE")
                    .list_separator(",")
                    .with_list_parse_key("lfm2.speakers")
                    .with_list_parse_key("kokoro.speakers")
                    .try_parsing(true),
            )
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 8000)?
            .set_default("app.max_upload_bytes", 25 * 1024 * 1024)?
            .set_default("app.preload", false)?
            .set_default("backend.profile", "lfm2_audio")?
            .set_default("backend.models_dir", "/models")?
            .set_default("whisper.model_path", "/models/whisper/ggml-base.en.bin")?
            .set_default("whisper.language", None::<String>)?
            .set_default("whisper.threads", None::<i64>)?
            .set_default("lfm2.python", "python3")?
            .set_default("lfm2.script", "scripts/lfm2_runner.py")?
            .set_default("lfm2.repo", "LiquidAI/LFM2.5-Audio-1.5B")?
            .set_default("lfm2.gguf_file", None::<String>)?
            .set_default("lfm2.max_new_tokens_transcribe", 512)?
            .set_default("lfm2.max_new_tokens_synthesize", 2048)?
            .set_default("lfm2.sample_rate", 24000)?
            .set_default(
                "lfm2.speakers",
                vec!["us_female", "us_male", "uk_female", "uk_male"],
            )?
            .set_default("lfm2.default_speaker", "us_female")?
            .set_default("lfm2.startup_timeout_secs", 600)?
            .set_default("piper.binary", "piper")?
            .set_default("piper.voices_dir", None::<String>)?
            .set_default("piper.default_voice", "en_US-amy-medium")?
            .set_default("piper.timeout_secs", 60)?
            .set_default(
                "piper.download_base_url",
                "https://huggingface.co/rhasspy/piper-voices/resolve/main",
            )?
            .set_default("kokoro.model_path", "/models/kokoro/kokoro-v1.0.onnx")?
            .set_default("kokoro.voices_dir", "/models/kokoro/voices")?
            .set_default(
                "kokoro.speakers",
                vec!["af_heart", "af_bella", "af_nicole", "am_adam", "am_michael", "bf_emma", "bm_george"],
            )?
            .set_default("kokoro.default_speaker", "af_heart")?
            .set_default("kokoro.espeak_binary", "espeak-ng")?
            .set_default("kokoro.language", "en-us")?
            .set_default("kokoro.speed", 1.0)?
            .set_default("voices.policy", None::<String>)?
            .set_default("transcoder.program", "ffmpeg")?
            .set_default("transcoder.decode_timeout_secs", 30)?
            .set_default("transcoder.encode_timeout_secs", 60)?
            .set_default("transcoder.opus_bitrate_kbps", 32)?
            .set_default("transcoder.diagnostic_limit", 200)?
            .set_default("inference.timeout_secs", None::<u64>)?
            .set_default("bootstrap.on_start", false)?
            .build()?;

        config.try_deserialize()
    }
}
