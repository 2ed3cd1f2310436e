use serde::{Deserialize, Serialize};

/// Seconds of trailing audio retained while waiting for speech, so the flush
/// on detection includes what came just before the detection point.
pub const PREATTACK_DURATION: f32 = 0.5;

/// VAD probability at or above which a frame counts toward an attack.
pub const ATTACK_THRESHOLD: f32 = 0.8;

/// Seconds of contiguous above-threshold audio before the gate opens.
/// Sub-200ms blips are transient noise, not speech.
pub const ATTACK_TIME_THRESHOLD: f32 = 0.2;

/// Seconds of accumulated below-threshold audio before the gate closes.
/// Long enough not to chop an utterance on a breath pause.
pub const RELEASE_TIME_THRESHOLD: f32 = 1.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    pub attack_threshold: f32,
    /// Separate from the attack threshold; defaults equal to it.
    pub release_threshold: f32,
    pub attack_time_threshold: f32,
    pub release_time_threshold: f32,
    pub preattack_duration: f32,
    /// In continuous mode the gate never auto-closes; utterance closure is
    /// driven externally.
    pub continuous: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            attack_threshold: ATTACK_THRESHOLD,
            release_threshold: ATTACK_THRESHOLD,
            attack_time_threshold: ATTACK_TIME_THRESHOLD,
            release_time_threshold: RELEASE_TIME_THRESHOLD,
            preattack_duration: PREATTACK_DURATION,
            continuous: false,
        }
    }
}
