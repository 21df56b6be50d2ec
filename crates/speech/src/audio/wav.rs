use std::io::Cursor;

use super::Waveform;

/// Decodes a WAV file into mono f32 samples at its native rate.
///
/// Integer and float sample formats are accepted; multi-channel audio is
/// averaged down to one channel.
pub fn decode_wav(bytes: &[u8]) -> anyhow::Result<Waveform> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| anyhow::anyhow!("Failed to parse WAV: {}", e))?;

    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let bits = spec.bits_per_sample.max(1) as u32;
            let max_val = if bits > 1 {
                ((1i64 << (bits - 1)) - 1) as f32
            } else {
                1.0
            };
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| (v as f32 / max_val).clamp(-1.0, 1.0)))
                .collect::<Result<_, _>>()
                .map_err(|e| anyhow::anyhow!("Failed to read WAV samples: {}", e))?
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| anyhow::anyhow!("Failed to read WAV samples: {}", e))?,
    };

    let samples = if channels > 1 {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    } else {
        interleaved
    };

    Ok(Waveform::new(samples, spec.sample_rate))
}

/// Writes a mono 16-bit PCM WAV file.
pub fn encode_wav(waveform: &Waveform) -> anyhow::Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: waveform.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + waveform.samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| anyhow::anyhow!("Failed to create WAV writer: {}", e))?;
        for &s in &waveform.samples {
            writer
                .write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                .map_err(|e| anyhow::anyhow!("Failed to write WAV sample: {}", e))?;
        }
        writer
            .finalize()
            .map_err(|e| anyhow::anyhow!("Failed to finalize WAV: {}", e))?;
    }

    Ok(cursor.into_inner())
}
