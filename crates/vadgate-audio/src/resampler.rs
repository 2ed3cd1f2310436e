use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use vadgate_foundation::CaptureError;

/// Streaming resampler for mono f32 audio using Rubato's sinc interpolation.
///
/// - Maintains internal buffers to handle arbitrarily small input chunks
///   without losing unconsumed samples
/// - When `in_rate == out_rate` the resampler is bypassed entirely: the
///   identity path is sample-for-sample and adds no latency
pub struct StreamResampler {
    in_rate: u32,
    out_rate: u32,
    resampler: Option<SincFixedIn<f32>>,
    /// Input buffer for accumulating samples until a full Rubato chunk exists
    input_buffer: Vec<f32>,
    /// Output buffer for accumulating resampled samples
    output_buffer: Vec<f32>,
    /// Chunk size required by Rubato
    chunk_size: usize,
}

impl StreamResampler {
    /// Create a new mono resampler from `in_rate` -> `out_rate`.
    pub fn new(in_rate: u32, out_rate: u32) -> Result<Self, CaptureError> {
        // Small chunks keep latency low; 512 samples is ~10ms at 48kHz which
        // lines up with the downstream frame size.
        let chunk_size = 512;

        let resampler = if in_rate == out_rate {
            None
        } else {
            // Medium-quality sinc settings, good for speech.
            let sinc_params = SincInterpolationParameters {
                sinc_len: 64,
                f_cutoff: 0.95,
                interpolation: SincInterpolationType::Cubic,
                oversampling_factor: 128,
                window: WindowFunction::Blackman2,
            };

            let resampler = SincFixedIn::<f32>::new(
                out_rate as f64 / in_rate as f64,
                2.0,
                sinc_params,
                chunk_size,
                1, // mono
            )
            .map_err(|e| CaptureError::ThreadStart(format!("resampler construction: {e}")))?;
            Some(resampler)
        };

        Ok(Self {
            in_rate,
            out_rate,
            resampler,
            input_buffer: Vec::with_capacity(chunk_size * 2),
            output_buffer: Vec::new(),
            chunk_size,
        })
    }

    /// Process an arbitrary chunk of mono f32 samples.
    /// Returns a freshly allocated Vec with resampled samples at `out_rate`.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        let Some(resampler) = self.resampler.as_mut() else {
            // Identity path: reproduce the input exactly.
            return input.to_vec();
        };

        self.input_buffer.extend_from_slice(input);

        while self.input_buffer.len() >= self.chunk_size {
            let chunk: Vec<f32> = self.input_buffer.drain(..self.chunk_size).collect();
            let input_frames = vec![chunk];

            match resampler.process(&input_frames, None) {
                Ok(output_frames) => {
                    if let Some(channel) = output_frames.first() {
                        self.output_buffer.extend_from_slice(channel);
                    }
                }
                Err(e) => {
                    tracing::error!("Resampler error: {}", e);
                    break;
                }
            }
        }

        std::mem::take(&mut self.output_buffer)
    }

    pub fn input_rate(&self) -> u32 {
        self.in_rate
    }

    pub fn output_rate(&self) -> u32 {
        self.out_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_path_is_sample_for_sample() {
        let mut rs = StreamResampler::new(48_000, 48_000).unwrap();
        let input: Vec<f32> = (0..977).map(|i| (i as f32 * 0.37).sin()).collect();
        assert_eq!(rs.process(&input), input);
    }

    #[test]
    fn downsample_48k_to_16k_ramp() {
        let mut rs = StreamResampler::new(48_000, 16_000).unwrap();
        let n_in = 4_800;
        let input: Vec<f32> = (0..n_in).map(|i| (i % 100) as f32 / 100.0).collect();

        // Process in chunks to exercise internal buffering
        let mut all_output = Vec::new();
        for chunk in input.chunks(1000) {
            all_output.extend(rs.process(chunk));
        }

        // Roughly 1/3 of the input samples, allowing for filter delay
        assert!(
            all_output.len() >= 1300 && all_output.len() <= 1700,
            "expected ~1600 samples, got {}",
            all_output.len()
        );
    }

    #[test]
    fn upsample_16k_to_48k_constant() {
        let mut rs = StreamResampler::new(16_000, 48_000).unwrap();
        let input = vec![0.25f32; 1600];
        let out = rs.process(&input);

        assert!(
            out.len() >= 4300 && out.len() <= 5000,
            "expected ~4800 samples, got {}",
            out.len()
        );

        // Steady-state samples should sit close to the constant input value;
        // the head of the output carries the filter's priming transient.
        if out.len() > 800 {
            for &s in &out[400..out.len() - 100] {
                assert!((s - 0.25).abs() < 0.05, "sample {} too far from 0.25", s);
            }
        }
    }

    #[test]
    fn tiny_chunks_do_not_lose_samples() {
        let mut rs = StreamResampler::new(44_100, 48_000).unwrap();
        let input: Vec<f32> = (0..4410).map(|i| (i as f32 / 50.0).sin() * 0.5).collect();

        let mut total = 0usize;
        for chunk in input.chunks(3) {
            total += rs.process(chunk).len();
        }
        // 100ms at 44.1kHz should give roughly 100ms at 48kHz, minus at most
        // one unconsumed internal chunk.
        assert!(total >= 4800 - 600, "only {} samples came out", total);
    }
}
