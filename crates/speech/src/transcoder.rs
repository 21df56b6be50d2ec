use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::process::{ProcessError, run_process};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    /// Headerless samples; needs explicit rate and channel count.
    RawPcm,
    Ogg,
    /// Let the transcoder probe the input.
    Probe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    PcmS16le,
    Opus,
}

/// Container/codec/sample-rate/channel constraints for one side of a transcode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSpec {
    pub container: Container,
    pub codec: Option<Codec>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub bitrate_kbps: Option<u32>,
}

impl AudioSpec {
    /// Signed 16-bit little-endian PCM without a header.
    pub fn pcm_s16le(sample_rate: u32, channels: u16) -> Self {
        Self {
            container: Container::RawPcm,
            codec: Some(Codec::PcmS16le),
            sample_rate: Some(sample_rate),
            channels: Some(channels),
            bitrate_kbps: None,
        }
    }

    pub fn ogg_opus(bitrate_kbps: u32) -> Self {
        Self {
            container: Container::Ogg,
            codec: Some(Codec::Opus),
            sample_rate: None,
            channels: None,
            bitrate_kbps: Some(bitrate_kbps),
        }
    }

    /// Any container the transcoder can detect on its own.
    pub fn probe() -> Self {
        Self {
            container: Container::Probe,
            codec: None,
            sample_rate: None,
            channels: None,
            bitrate_kbps: None,
        }
    }
}

/// Where a conversion reads from.
#[derive(Debug, Clone, Copy)]
pub enum Source<'a> {
    /// Streamed on stdin.
    Pipe(&'a [u8]),
    /// A seekable file. Needed by containers that index at the end (MP4/M4A).
    File(&'a Path),
}

/// ffmpeg wrapper: one process per conversion, output on stdout.
#[derive(Debug, Clone)]
pub struct Transcoder {
    program: String,
    diagnostic_limit: usize,
}

impl Transcoder {
    pub fn new(program: impl Into<String>, diagnostic_limit: usize) -> Self {
        Self {
            program: program.into(),
            diagnostic_limit,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub async fn transcode(
        &self,
        source: Source<'_>,
        from: &AudioSpec,
        to: &AudioSpec,
        timeout: Duration,
    ) -> Result<Vec<u8>, ProcessError> {
        let (input, stdin) = match source {
            Source::Pipe(bytes) => ("pipe:0".to_string(), bytes.to_vec()),
            Source::File(path) => (path.to_string_lossy().into_owned(), Vec::new()),
        };
        let args = ffmpeg_args(from, &input, to);
        debug!(program = %self.program, ?args, stdin_bytes = stdin.len(), "Transcoding");
        run_process(&self.program, &args, stdin, timeout, self.diagnostic_limit).await
    }
}

/// Builds the ffmpeg argument list. `input` is `pipe:0` or a file path; output goes to stdout.
pub fn ffmpeg_args(from: &AudioSpec, input: &str, to: &AudioSpec) -> Vec<String> {
    let mut args: Vec<String> = ["-hide_banner", "-loglevel", "error"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    if input != "pipe:0" {
        args.push("-nostdin".to_string());
    }

    match from.container {
        Container::RawPcm => {
            args.extend(["-f".to_string(), "s16le".to_string()]);
            if let Some(rate) = from.sample_rate {
                args.extend(["-ar".to_string(), rate.to_string()]);
            }
            if let Some(channels) = from.channels {
                args.extend(["-ac".to_string(), channels.to_string()]);
            }
        }
        Container::Ogg => args.extend(["-f".to_string(), "ogg".to_string()]),
        Container::Probe => {}
    }
    args.extend(["-i".to_string(), input.to_string(), "-vn".to_string()]);

    if let Some(rate) = to.sample_rate {
        args.extend(["-ar".to_string(), rate.to_string()]);
    }
    if let Some(channels) = to.channels {
        args.extend(["-ac".to_string(), channels.to_string()]);
    }
    match to.codec {
        Some(Codec::Opus) => args.extend(["-c:a".to_string(), "libopus".to_string()]),
        Some(Codec::PcmS16le) => args.extend(["-c:a".to_string(), "pcm_s16le".to_string()]),
        None => {}
    }
    if let Some(kbps) = to.bitrate_kbps {
        args.extend(["-b:a".to_string(), format!("{kbps}k")]);
    }
    match to.container {
        Container::RawPcm => args.extend(["-f".to_string(), "s16le".to_string()]),
        Container::Ogg => args.extend(["-f".to_string(), "ogg".to_string()]),
        Container::Probe => {}
    }
    args.push("pipe:1".to_string());
    args
}
