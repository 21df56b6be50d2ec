use rubato::{
    Async as AsyncResampler, FixedAsync, Resampler as RubatoResampler,
    SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use audioadapter_buffers::direct::InterleavedSlice;

/// Streaming mono resampler between two fixed rates, using sinc interpolation.
pub struct Resampler {
    inner: AsyncResampler<f32>,
    /// Accumulator for input samples that don't fill a complete chunk.
    pending: Vec<f32>,
    /// Number of input frames the resampler expects per process() call.
    chunk_size: usize,
}

impl Resampler {
    /// `chunk_size` is the number of input frames per resampling call.
    pub fn new(from_rate: u32, to_rate: u32, chunk_size: usize) -> anyhow::Result<Self> {
        if from_rate == 0 || to_rate == 0 {
            anyhow::bail!("Invalid resample rates {} -> {}", from_rate, to_rate);
        }

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        let inner = AsyncResampler::<f32>::new_sinc(
            to_rate as f64 / from_rate as f64,
            2.0,
            &params,
            chunk_size,
            1,
            FixedAsync::Input,
        )
        .map_err(|e| anyhow::anyhow!("Failed to create resampler: {}", e))?;

        Ok(Self {
            inner,
            pending: Vec::with_capacity(chunk_size * 2),
            chunk_size,
        })
    }

    /// Feeds mono samples and returns whatever complete chunks produced.
    pub fn process(&mut self, input: &[f32]) -> anyhow::Result<Vec<f32>> {
        self.pending.extend_from_slice(input);

        let mut output = Vec::new();

        while self.pending.len() >= self.chunk_size {
            let chunk: Vec<f32> = self.pending.drain(..self.chunk_size).collect();
            let frames = chunk.len();
            let input_adapter = InterleavedSlice::new(&chunk, 1, frames)
                .map_err(|e| anyhow::anyhow!("Input adapter error: {}", e))?;

            let resampled = self
                .inner
                .process(&input_adapter, 0, None)
                .map_err(|e| anyhow::anyhow!("Resample error: {}", e))?;

            output.extend(resampled.take_data());
        }

        Ok(output)
    }

    /// Flushes any remaining buffered samples (with zero-padding).
    pub fn flush(&mut self) -> anyhow::Result<Vec<f32>> {
        if self.pending.is_empty() {
            return Ok(Vec::new());
        }

        self.pending.resize(self.chunk_size, 0.0);
        self.process(&[])
    }

    /// Output frames of filter latency ahead of the first real sample.
    pub fn output_delay(&self) -> usize {
        self.inner.output_delay()
    }
}

const CHUNK_FRAMES: usize = 1024;

/// Resamples a whole clip. The result is trimmed to the length implied by the rate ratio.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> anyhow::Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler = Resampler::new(from_rate, to_rate, CHUNK_FRAMES)?;
    let delay = resampler.output_delay();
    let expected =
        ((samples.len() as u64 * to_rate as u64) / from_rate as u64).max(1) as usize;

    let mut out = resampler.process(samples)?;
    out.extend(resampler.flush()?);
    // The last input samples only leave the filter once `delay` more frames are pushed.
    let silence = vec![0.0; CHUNK_FRAMES];
    while out.len() < delay + expected {
        let more = resampler.process(&silence)?;
        if more.is_empty() {
            break;
        }
        out.extend(more);
    }

    out.drain(..delay.min(out.len()));
    out.truncate(expected);
    Ok(out)
}
