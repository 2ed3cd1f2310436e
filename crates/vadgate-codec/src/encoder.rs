use crate::constants::{FRAME_DURATION_SECS, FRAME_SIZE_SAMPLES};
use crate::engine::{CodecEngine, CodecError, EncodedPacket};

/// Accumulates post-resample samples into fixed-size frames and encodes each
/// full frame through the engine.
///
/// Arbitrary chunk sizes are fine: partial trailing samples stay buffered for
/// the next push. One `EncodedPacket` is emitted per full frame, in order.
pub struct FrameEncoder {
    engine: Box<dyn CodecEngine>,
    pending: Vec<f32>,
}

impl FrameEncoder {
    pub fn new(engine: Box<dyn CodecEngine>) -> Self {
        Self {
            engine,
            pending: Vec::with_capacity(FRAME_SIZE_SAMPLES * 2),
        }
    }

    /// Feed a chunk of samples; `sink` is called once per completed frame.
    pub fn push(
        &mut self,
        samples: &[f32],
        sink: &mut dyn FnMut(EncodedPacket),
    ) -> Result<(), CodecError> {
        self.pending.extend_from_slice(samples);

        while self.pending.len() >= FRAME_SIZE_SAMPLES {
            let frame = self.engine.encode_frame(&self.pending[..FRAME_SIZE_SAMPLES])?;
            self.pending.drain(..FRAME_SIZE_SAMPLES);
            sink(EncodedPacket {
                payload: frame.payload,
                vad_probability: frame.vad_probability,
                duration: FRAME_DURATION_SECS,
            });
        }
        Ok(())
    }

    /// Samples buffered waiting for the next full frame.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EncodedFrame;

    /// Engine that stamps each packet with a sequence number.
    struct SeqEngine {
        next: u8,
        fail: bool,
    }

    impl CodecEngine for SeqEngine {
        fn encode_frame(&mut self, frame: &[f32]) -> Result<EncodedFrame, CodecError> {
            if self.fail {
                return Err(CodecError::Init("engine gone".to_string()));
            }
            assert_eq!(frame.len(), FRAME_SIZE_SAMPLES);
            let seq = self.next;
            self.next = self.next.wrapping_add(1);
            Ok(EncodedFrame {
                payload: vec![seq],
                vad_probability: 0.0,
            })
        }
    }

    fn encoder(fail: bool) -> FrameEncoder {
        FrameEncoder::new(Box::new(SeqEngine { next: 0, fail }))
    }

    #[test]
    fn partial_chunks_buffer_until_full_frame() {
        let mut enc = encoder(false);
        let mut packets = Vec::new();

        enc.push(&vec![0.0; 300], &mut |p| packets.push(p)).unwrap();
        assert!(packets.is_empty());
        assert_eq!(enc.pending_len(), 300);

        enc.push(&vec![0.0; 300], &mut |p| packets.push(p)).unwrap();
        assert_eq!(packets.len(), 1);
        assert_eq!(enc.pending_len(), 120);
        assert!((packets[0].duration - 0.01).abs() < 1e-6);
    }

    #[test]
    fn large_chunk_emits_frames_in_order() {
        let mut enc = encoder(false);
        let mut packets = Vec::new();
        enc.push(&vec![0.0; FRAME_SIZE_SAMPLES * 3 + 7], &mut |p| {
            packets.push(p)
        })
        .unwrap();
        let seqs: Vec<u8> = packets.iter().map(|p| p.payload[0]).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(enc.pending_len(), 7);
    }

    #[test]
    fn engine_error_propagates_without_emitting() {
        let mut enc = encoder(true);
        let mut packets = Vec::new();
        let err = enc
            .push(&vec![0.0; FRAME_SIZE_SAMPLES], &mut |p| packets.push(p))
            .unwrap_err();
        assert!(matches!(err, CodecError::Init(_)));
        assert!(packets.is_empty());
    }
}
