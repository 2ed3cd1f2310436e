use thiserror::Error;

use crate::state::SessionState;

/// Session-level error taxonomy.
///
/// Acquisition failures (`DeviceUnavailable`, `EngineInitFailure`,
/// `TransportOpenFailure`) are always recovered into a clean teardown by the
/// session coordinator. `TransportDisconnected` is distinct from
/// `TransportOpenFailure`: the former can only happen once the session is
/// running and escalates to an abort.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session already started")]
    AlreadyRunning,

    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("codec engine failed to initialize: {0}")]
    EngineInitFailure(String),

    #[error("failed to open transport connection: {0}")]
    TransportOpenFailure(String),

    #[error("transport disconnected mid-session: {0}")]
    TransportDisconnected(String),

    #[error("malformed message from recognition service: {0}")]
    Protocol(String),

    #[error("invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: SessionState,
        to: SessionState,
    },

    #[error("audio capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors raised by the capture layer while opening or running a device.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("input device not found: {name:?}")]
    DeviceNotFound { name: Option<String> },

    #[error("input device has no usable audio track")]
    NoAudioTrack,

    #[error("format not supported: {format}")]
    FormatNotSupported { format: String },

    #[error("build stream error: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("play stream error: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("supported stream configs error: {0}")]
    SupportedStreamConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("capture thread failed to start: {0}")]
    ThreadStart(String),
}

impl SessionError {
    /// True for the failures that can only occur while the session is still
    /// acquiring resources.
    pub fn is_acquisition_failure(&self) -> bool {
        matches!(
            self,
            SessionError::DeviceUnavailable(_)
                | SessionError::EngineInitFailure(_)
                | SessionError::TransportOpenFailure(_)
                | SessionError::Capture(_)
        )
    }
}
