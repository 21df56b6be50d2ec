pub mod asr;
pub mod audio;
pub mod backends;
pub mod config;
pub mod error;
pub mod lfm2;
pub mod process;
pub mod registry;
pub mod service;
pub mod transcoder;
pub mod tts;
pub mod voices;

pub use asr::{AsrEngine, AsrInput, AudioIntake, TranscriptionResult};
pub use audio::{AudioBuffer, AudioFormat, Waveform};
pub use backends::{BackendProfile, build_service, voice_bootstrap};
pub use config::PipelineConfig;
pub use error::SpeechError;
pub use process::ProcessError;
pub use registry::{
    EngineHandle, EngineKind, EngineLoadError, EngineLoader, EngineRegistry, EngineStatus,
    LoadState,
};
pub use service::{OutputFormat, SpeechService, SynthesisRequest, SynthesizedAudio};
pub use transcoder::Transcoder;
pub use tts::TtsEngine;
pub use voices::{VoiceCatalog, VoicePolicy, VoiceSelection, VoiceSource};
