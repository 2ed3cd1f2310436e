use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use vadgate_audio::{default_input_device_name, AudioContextInfo, CaptureThread};
use vadgate_codec::engine_module;
use vadgate_foundation::SessionError;
use vadgate_transport::{Transport, TransportConnector, TransportEvent, WsConnector};

use crate::backend::{CaptureHandle, EngineHandle, SessionBackend};

const CAPTURE_CHANNEL_DEPTH: usize = 64;

/// Production backend: cpal capture, the cached codec module, and a live
/// WebSocket connection. Blocking device and codec work runs on the tokio
/// blocking pool.
pub struct LiveBackend;

fn join_failed(e: tokio::task::JoinError) -> SessionError {
    SessionError::Internal(format!("blocking task failed: {e}"))
}

#[async_trait]
impl SessionBackend for LiveBackend {
    async fn open_audio_context(&self) -> Result<AudioContextInfo, SessionError> {
        tokio::task::spawn_blocking(default_input_device_name)
            .await
            .map_err(join_failed)?
            .map_err(|e| SessionError::DeviceUnavailable(e.to_string()))
    }

    async fn load_engine(&self) -> Result<EngineHandle, SessionError> {
        let module = tokio::task::spawn_blocking(engine_module)
            .await
            .map_err(join_failed)?
            .map_err(|e| SessionError::EngineInitFailure(e.to_string()))?;

        Ok(EngineHandle {
            engine: Box::new(module.instantiate()),
            version: module.version().to_string(),
        })
    }

    async fn open_capture(
        &self,
        device_name: Option<String>,
    ) -> Result<CaptureHandle, SessionError> {
        let (chunk_tx, chunk_rx) = mpsc::channel(CAPTURE_CHANNEL_DEPTH);

        let (thread, config) =
            tokio::task::spawn_blocking(move || CaptureThread::open(device_name.as_deref(), chunk_tx))
                .await
                .map_err(join_failed)?
                .map_err(|e| SessionError::DeviceUnavailable(e.to_string()))?;

        Ok(CaptureHandle {
            chunks: chunk_rx,
            sample_rate: config.sample_rate,
            stop: Box::new(move || thread.stop()),
        })
    }

    async fn connect_transport(
        &self,
        endpoint: &str,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>), SessionError> {
        WsConnector::new(endpoint)?.connect().await
    }
}
