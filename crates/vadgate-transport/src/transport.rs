use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use vadgate_foundation::SessionError;

use crate::messages::RecognitionResult;

/// Inbound traffic and connection status, delivered in arrival order.
#[derive(Debug)]
pub enum TransportEvent {
    /// One decoded result batch.
    Results(Vec<RecognitionResult>),
    /// Malformed inbound payload; the session survives this.
    ProtocolError(String),
    /// The connection dropped after it had been opened. The coordinator
    /// decides whether this is an abort (running) or noise (stopping).
    Disconnected(String),
}

/// Outbound half of a session's duplex channel.
///
/// Send failures mean the connection is gone; they surface as
/// `TransportDisconnected` and the coordinator escalates.
#[async_trait]
pub trait Transport: Send + Sync {
    /// The handshake is guaranteed by the coordinator to be the first message
    /// on the wire, strictly before any audio packet.
    async fn send_handshake(&self, config: serde_json::Value) -> Result<(), SessionError>;

    async fn send_packet(&self, payload: Vec<u8>) -> Result<(), SessionError>;

    /// Zero-length binary frame: end-of-utterance marker.
    async fn send_end_of_utterance(&self) -> Result<(), SessionError>;

    /// Release the connection. Synchronous and idempotent so the cleanup
    /// registry can call it from teardown.
    fn close(&self);
}

impl std::fmt::Debug for dyn Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Transport")
    }
}

/// Opens one connection per session.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(
        &self,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>), SessionError>;
}
