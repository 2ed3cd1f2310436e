pub mod config;
pub mod state;

pub use config::{
    GateConfig, ATTACK_THRESHOLD, ATTACK_TIME_THRESHOLD, PREATTACK_DURATION,
    RELEASE_TIME_THRESHOLD,
};
pub use state::{GateEvent, GateOutput, GatePhase, VadGate};
