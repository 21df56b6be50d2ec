use std::time::Duration;

use crate::process::ProcessError;
use crate::registry::EngineLoadError;

/// Everything the transcribe/synthesize pipeline can fail with.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Voice '{requested}' not found")]
    VoiceNotFound {
        requested: String,
        available: Vec<String>,
    },

    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    EngineLoad(#[from] EngineLoadError),

    #[error("Engine call exceeded {}s", .0.as_secs_f64())]
    EngineTimeout(Duration),

    #[error("{0}")]
    Engine(String),

    #[error("Model produced no audio output")]
    NoAudio,

    #[error("Audio encoding failed: {0}")]
    Encoding(String),
}

impl SpeechError {
    /// Converts an error returned by a backend, keeping external-process
    /// failures distinguishable from generic inference errors.
    pub fn from_engine(err: anyhow::Error) -> Self {
        let err = match err.downcast::<ProcessError>() {
            Ok(process) => return SpeechError::Process(process),
            Err(err) => err,
        };
        match err.downcast::<SpeechError>() {
            Ok(speech) => speech,
            Err(err) => SpeechError::Engine(format!("{:#}", err)),
        }
    }
}
