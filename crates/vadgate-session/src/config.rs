use serde::{Deserialize, Serialize};
use vadgate_gate::GateConfig;

/// Everything a session needs to run, snapshotted immutably at start.
///
/// Mutating the corresponding `Recognizer` fields after `start()` affects the
/// next session, never the one in flight.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Recognition proxy endpoint; ws/wss (http/https are rewritten).
    pub endpoint: String,
    /// Input device by name; `None` picks the host default.
    pub device_name: Option<String>,
    /// BCP 47 language tag forwarded to the recognition engine.
    pub lang: String,
    /// Keep recognizing across utterances; the gate never auto-closes and
    /// final results do not stop the session.
    pub continuous: bool,
    /// Ask the engine for partial hypotheses before the utterance is final.
    pub interim_results: bool,
    /// Upper bound on hypotheses per result entry.
    pub max_alternatives: u32,
    pub gate: GateConfig,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            endpoint: "ws://127.0.0.1:8765/asr".to_string(),
            device_name: None,
            lang: "en-US".to_string(),
            continuous: false,
            interim_results: false,
            max_alternatives: 1,
            gate: GateConfig::default(),
        }
    }
}

impl SessionOptions {
    /// The gate config derived from the options, with `continuous` applied.
    pub fn gate_config(&self) -> GateConfig {
        let mut cfg = self.gate.clone();
        cfg.continuous = self.continuous;
        cfg
    }
}
