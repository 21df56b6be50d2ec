use std::io::Cursor;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// 16-bit mono WAV holding a 440 Hz tone.
pub fn tone_wav(sample_rate: u32, secs: f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
    let frames = (sample_rate as f32 * secs) as usize;
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let sample = (t * 440.0 * std::f32::consts::TAU).sin() * 0.4;
        writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
    cursor.into_inner()
}

/// Reads a WAV body back as (channels, sample_rate, frame count).
pub fn wav_shape(bytes: &[u8]) -> (u16, u32, u32) {
    let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
    let spec = reader.spec();
    (spec.channels, spec.sample_rate, reader.duration())
}

/// Writes an executable `sh` script into `dir`.
pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Creates an installed piper voice (model plus metadata) in `dir`.
pub fn install_voice(dir: &Path, voice: &str) {
    std::fs::write(dir.join(format!("{}.onnx", voice)), b"onnx").unwrap();
    std::fs::write(
        dir.join(format!("{}.onnx.json", voice)),
        br#"{"audio":{"sample_rate":22050}}"#,
    )
    .unwrap();
}

pub fn ffmpeg_available() -> bool {
    std::process::Command::new("ffmpeg")
        .arg("-version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
