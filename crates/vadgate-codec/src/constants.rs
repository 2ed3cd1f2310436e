//! Fixed audio format of the encoding pipeline

/// Sample rate every frame is normalized to before encoding (Hz)
pub const TARGET_SAMPLE_RATE_HZ: u32 = 48_000;

/// Frame size in samples; the codec's atomic unit of work.
/// At 48kHz, 480 samples = 10ms frames
pub const FRAME_SIZE_SAMPLES: usize = 480;

/// Duration of one frame in seconds (derived constant)
pub const FRAME_DURATION_SECS: f32 = FRAME_SIZE_SAMPLES as f32 / TARGET_SAMPLE_RATE_HZ as f32;

/// Mono capture only
pub const CHANNELS_MONO: u16 = 1;
