#[cfg(feature = "kokoro")]
pub mod kokoro;
pub mod piper;

use async_trait::async_trait;

use crate::audio::Waveform;

/// Trait for pluggable TTS engines.
#[async_trait]
pub trait TtsEngine: Send + Sync + 'static {
    /// Synthesizes `text` with an already-resolved voice.
    ///
    /// An empty waveform means the engine produced no audio at all.
    async fn synthesize(&self, text: &str, voice: &str) -> anyhow::Result<Waveform>;

    /// Human-readable backend name.
    fn name(&self) -> &str;
}
