use std::time::Duration;

use speechgate_config::TranscoderSettings;

/// Time budgets and encoding parameters of the request pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub decode_timeout: Duration,
    pub encode_timeout: Duration,
    pub opus_bitrate_kbps: u32,
    /// Bound on a single engine call. None = wait as long as the engine takes.
    pub inference_timeout: Option<Duration>,
}

impl PipelineConfig {
    pub fn from_settings(transcoder: &TranscoderSettings, inference_timeout_secs: Option<u64>) -> Self {
        Self {
            decode_timeout: Duration::from_secs(transcoder.decode_timeout_secs),
            encode_timeout: Duration::from_secs(transcoder.encode_timeout_secs),
            opus_bitrate_kbps: transcoder.opus_bitrate_kbps,
            inference_timeout: inference_timeout_secs.map(Duration::from_secs),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            decode_timeout: Duration::from_secs(30),
            encode_timeout: Duration::from_secs(60),
            opus_bitrate_kbps: 32,
            inference_timeout: None,
        }
    }
}
