pub mod resampler;
pub mod wav;

pub use resampler::{Resampler, resample};
pub use wav::{decode_wav, encode_wav};

/// Container detected for an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Ogg,
    Flac,
    Mp3,
    WebM,
    Mp4,
    Unknown,
}

impl AudioFormat {
    /// Detects the container from magic bytes, falling back to the filename extension.
    pub fn sniff(bytes: &[u8], filename: Option<&str>) -> Self {
        let by_magic = Self::from_magic(bytes);
        if by_magic != AudioFormat::Unknown {
            return by_magic;
        }
        filename
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| Self::from_extension(ext))
            .unwrap_or(AudioFormat::Unknown)
    }

    fn from_magic(bytes: &[u8]) -> Self {
        if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            AudioFormat::Wav
        } else if bytes.starts_with(b"OggS") {
            AudioFormat::Ogg
        } else if bytes.starts_with(b"fLaC") {
            AudioFormat::Flac
        } else if bytes.starts_with(b"ID3")
            || (bytes.len() >= 2 && bytes[0] == 0xFF && (bytes[1] & 0xE0) == 0xE0)
        {
            AudioFormat::Mp3
        } else if bytes.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
            AudioFormat::WebM
        } else if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
            AudioFormat::Mp4
        } else {
            AudioFormat::Unknown
        }
    }

    fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "wav" | "wave" => AudioFormat::Wav,
            "ogg" | "oga" | "opus" => AudioFormat::Ogg,
            "flac" => AudioFormat::Flac,
            "mp3" => AudioFormat::Mp3,
            "webm" | "mkv" => AudioFormat::WebM,
            "m4a" | "mp4" | "aac" => AudioFormat::Mp4,
            _ => AudioFormat::Unknown,
        }
    }

    /// File suffix used when an engine needs the upload on disk.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Flac => "flac",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::WebM => "webm",
            AudioFormat::Mp4 => "m4a",
            // Same default the upload path always had.
            AudioFormat::Unknown => "ogg",
        }
    }
}

/// Uploaded bytes plus what we know about their format.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

impl AudioBuffer {
    /// The declared filename only feeds format detection.
    pub fn from_upload(bytes: Vec<u8>, filename: Option<String>) -> Self {
        let format = AudioFormat::sniff(&bytes, filename.as_deref());
        Self { bytes, format }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Mono f32 samples in [-1.0, 1.0] at a known rate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Converts f32 samples to signed 16-bit little-endian bytes, clamping out-of-range values.
pub fn to_pcm_s16le(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Parses signed 16-bit little-endian bytes. A trailing odd byte is ignored.
pub fn from_pcm_s16le(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / i16::MAX as f32)
        .collect()
}
