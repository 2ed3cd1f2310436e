use crate::constants::FRAME_SIZE_SAMPLES;
use crate::engine::{CodecEngine, CodecError, EncodedFrame};

/// Calibration of the energy-based VAD scorer, carried by the engine module.
#[derive(Debug, Clone)]
pub struct ScorerCalibration {
    /// Initial noise floor estimate (dBFS)
    pub initial_floor_dbfs: f32,
    /// EMA coefficient for floor adaptation
    pub floor_alpha: f32,
    /// Level above the floor at which the logistic sits at 0.5 (dB)
    pub onset_offset_db: f32,
    /// Width of the logistic transition (dB)
    pub spread_db: f32,
}

impl Default for ScorerCalibration {
    fn default() -> Self {
        Self {
            initial_floor_dbfs: -60.0,
            floor_alpha: 0.02,
            onset_offset_db: 12.0,
            spread_db: 3.0,
        }
    }
}

/// PCM16 engine: quantizes normalized f32 samples to little-endian i16 bytes
/// (lossy, halves the payload size) and scores each frame for voice activity
/// from its RMS level relative to an adaptive noise floor.
pub struct Pcm16Engine {
    scorer: EnergyScorer,
}

impl Pcm16Engine {
    pub fn new(calibration: ScorerCalibration) -> Self {
        Self {
            scorer: EnergyScorer::new(calibration),
        }
    }
}

impl CodecEngine for Pcm16Engine {
    fn encode_frame(&mut self, frame: &[f32]) -> Result<EncodedFrame, CodecError> {
        if frame.len() != FRAME_SIZE_SAMPLES {
            return Err(CodecError::BadFrameLength {
                expected: FRAME_SIZE_SAMPLES,
                got: frame.len(),
            });
        }

        let mut payload = Vec::with_capacity(frame.len() * 2);
        for &s in frame {
            let v = (s.clamp(-1.0, 1.0) * 32767.0).round() as i16;
            payload.extend_from_slice(&v.to_le_bytes());
        }

        let vad_probability = self.scorer.score(frame);
        Ok(EncodedFrame {
            payload,
            vad_probability,
        })
    }
}

/// Per-frame speech probability from RMS energy.
///
/// The floor estimate only adapts on frames near or below the current floor,
/// so sustained speech does not drag the floor upward. The probability is a
/// logistic over how far the frame sits above floor + onset offset.
struct EnergyScorer {
    calibration: ScorerCalibration,
    floor_dbfs: f32,
}

impl EnergyScorer {
    fn new(calibration: ScorerCalibration) -> Self {
        let floor_dbfs = calibration.initial_floor_dbfs;
        Self {
            calibration,
            floor_dbfs,
        }
    }

    fn score(&mut self, frame: &[f32]) -> f32 {
        let db = frame_dbfs(frame);

        let cal = &self.calibration;
        if db < self.floor_dbfs + cal.spread_db {
            self.floor_dbfs += cal.floor_alpha * (db - self.floor_dbfs);
            self.floor_dbfs = self.floor_dbfs.clamp(-100.0, -20.0);
        }

        let x = (db - (self.floor_dbfs + cal.onset_offset_db)) / cal.spread_db;
        1.0 / (1.0 + (-x).exp())
    }
}

fn frame_dbfs(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return -100.0;
    }
    let sum_squares: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let rms = (sum_squares / frame.len() as f64).sqrt() as f32;
    if rms <= 1e-10 {
        return -100.0;
    }
    20.0 * rms.log10()
}
