use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use vadgate_audio::AudioContextInfo;
use vadgate_codec::CodecEngine;
use vadgate_foundation::SessionError;
use vadgate_transport::{Transport, TransportEvent};

/// A ready codec engine instance plus the module version advertised in the
/// handshake.
pub struct EngineHandle {
    pub engine: Box<dyn CodecEngine>,
    pub version: String,
}

/// A running capture source: mono f32 chunks at `sample_rate`, plus the
/// action that stops it.
pub struct CaptureHandle {
    pub chunks: mpsc::Receiver<Vec<f32>>,
    pub sample_rate: u32,
    pub stop: Box<dyn FnOnce() + Send>,
}

/// Acquisition seam for the session coordinator.
///
/// The live implementation talks to cpal, the codec module cache, and a
/// WebSocket; tests substitute scripted fakes. Each method is one of the four
/// concurrent acquisitions `start()` performs.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn open_audio_context(&self) -> Result<AudioContextInfo, SessionError>;

    async fn load_engine(&self) -> Result<EngineHandle, SessionError>;

    async fn open_capture(
        &self,
        device_name: Option<String>,
    ) -> Result<CaptureHandle, SessionError>;

    async fn connect_transport(
        &self,
        endpoint: &str,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>), SessionError>;
}
