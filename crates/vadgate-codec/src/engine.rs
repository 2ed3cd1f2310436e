use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("codec engine failed to initialize: {0}")]
    Init(String),

    #[error("frame has wrong length: expected {expected}, got {got}")]
    BadFrameLength { expected: usize, got: usize },
}

/// One encoded frame as produced by an engine, before the fixed duration is
/// attached.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub payload: Vec<u8>,
    pub vad_probability: f32,
}

/// Compressed packet flowing from the encoder through the gate to the
/// transport. Produced once per full frame, consumed once.
#[derive(Debug, Clone)]
pub struct EncodedPacket {
    pub payload: Vec<u8>,
    /// Per-frame voice-activity probability, 0..1
    pub vad_probability: f32,
    /// Frame duration in seconds (fixed: frame size over target rate)
    pub duration: f32,
}

/// Seam for the frame codec.
///
/// Encoding is synchronous and must complete within one frame period; the
/// engine may hold cross-frame state (analysis windows, adaptive noise
/// floors), which is why `encode_frame` takes `&mut self`.
pub trait CodecEngine: Send {
    fn encode_frame(&mut self, frame: &[f32]) -> Result<EncodedFrame, CodecError>;
}
