use speechgate_config::Settings;
use speechgate_speech::{SpeechService, build_service};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub speech: Arc<SpeechService>,
}

impl AppState {
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        let speech = Arc::new(build_service(&settings)?);
        Ok(Self { settings, speech })
    }

    /// State around an already-built pipeline (custom engines, tests).
    pub fn with_service(settings: Settings, speech: SpeechService) -> Self {
        Self {
            settings,
            speech: Arc::new(speech),
        }
    }
}
