use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use vadgate_foundation::SessionError;

use crate::messages::parse_result_batch;
use crate::transport::{Transport, TransportConnector, TransportEvent};

/// WebSocket connector for the recognition proxy endpoint.
#[derive(Debug)]
pub struct WsConnector {
    url: Url,
}

impl WsConnector {
    /// Accepts ws/wss URLs, or http/https URLs which are rewritten.
    pub fn new(endpoint: &str) -> Result<Self, SessionError> {
        // Only the leading scheme is rewritten; the rest of the endpoint
        // (path, query) passes through untouched.
        let ws_endpoint = if let Some(rest) = endpoint.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = endpoint.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            endpoint.to_string()
        };
        let url = Url::parse(&ws_endpoint)
            .map_err(|e| SessionError::TransportOpenFailure(format!("invalid endpoint: {e}")))?;
        Ok(Self { url })
    }
}

enum Command {
    Text(String),
    Binary(Vec<u8>),
    Close,
}

/// Live WebSocket transport: a writer task owns the sink and is fed through
/// an mpsc command channel, a reader task decodes inbound traffic into
/// `TransportEvent`s.
pub struct WsTransport {
    cmd_tx: mpsc::Sender<Command>,
}

#[async_trait]
impl TransportConnector for WsConnector {
    async fn connect(
        &self,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>), SessionError> {
        let (ws_stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| SessionError::TransportOpenFailure(e.to_string()))?;
        tracing::info!("Transport connected: {}", self.url);

        let (mut write, mut read) = ws_stream.split();
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(64);
        let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(32);

        tokio::spawn(async move {
            while let Some(cmd) = cmd_rx.recv().await {
                let result = match cmd {
                    Command::Text(text) => write.send(Message::Text(text)).await,
                    Command::Binary(payload) => write.send(Message::Binary(payload)).await,
                    Command::Close => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                };
                if let Err(e) = result {
                    tracing::warn!("WebSocket send failed: {}", e);
                    break;
                }
            }
        });

        tokio::spawn(async move {
            while let Some(msg) = read.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        let event = match parse_result_batch(&text) {
                            Ok(batch) => TransportEvent::Results(batch),
                            Err(e) => {
                                tracing::warn!("Malformed inbound message: {}", e);
                                TransportEvent::ProtocolError(e.to_string())
                            }
                        };
                        if event_tx.send(event).await.is_err() {
                            return;
                        }
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                    Ok(Message::Close(_)) => {
                        let _ = event_tx
                            .send(TransportEvent::Disconnected(
                                "closed by server".to_string(),
                            ))
                            .await;
                        return;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        let _ = event_tx
                            .send(TransportEvent::Disconnected(e.to_string()))
                            .await;
                        return;
                    }
                }
            }
            let _ = event_tx
                .send(TransportEvent::Disconnected(
                    "connection ended".to_string(),
                ))
                .await;
        });

        Ok((Arc::new(WsTransport { cmd_tx }), event_rx))
    }
}

impl WsTransport {
    async fn send(&self, cmd: Command) -> Result<(), SessionError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| SessionError::TransportDisconnected("send channel closed".to_string()))
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send_handshake(&self, config: serde_json::Value) -> Result<(), SessionError> {
        self.send(Command::Text(config.to_string())).await
    }

    async fn send_packet(&self, payload: Vec<u8>) -> Result<(), SessionError> {
        self.send(Command::Binary(payload)).await
    }

    async fn send_end_of_utterance(&self) -> Result<(), SessionError> {
        self.send(Command::Binary(Vec::new())).await
    }

    fn close(&self) {
        let _ = self.cmd_tx.try_send(Command::Close);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn rewrites_http_schemes() {
        let c = WsConnector::new("http://example.com/ws").unwrap();
        assert_eq!(c.url.scheme(), "ws");
        let c = WsConnector::new("https://example.com/ws").unwrap();
        assert_eq!(c.url.scheme(), "wss");
    }

    #[test]
    fn rewrites_only_the_leading_scheme() {
        let c = WsConnector::new("ws://gw.example/relay?target=http://internal/asr").unwrap();
        assert_eq!(c.url.scheme(), "ws");
        assert_eq!(c.url.query(), Some("target=http://internal/asr"));

        let c = WsConnector::new("http://gw.example/to/https://upstream").unwrap();
        assert_eq!(c.url.scheme(), "ws");
        assert_eq!(c.url.path(), "/to/https://upstream");
    }

    #[test]
    fn rejects_garbage_endpoint() {
        let err = WsConnector::new("not a url").unwrap_err();
        assert!(matches!(err, SessionError::TransportOpenFailure(_)));
    }

    #[tokio::test]
    async fn open_failure_is_reported_as_such() {
        // Nothing listens on port 1.
        let connector = WsConnector::new("ws://127.0.0.1:1/ws").unwrap();
        let err = connector.connect().await.unwrap_err();
        assert!(matches!(err, SessionError::TransportOpenFailure(_)));
    }

    #[tokio::test]
    async fn sends_in_order_and_receives_results() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            let mut seen = Vec::new();
            for _ in 0..4 {
                seen.push(ws.next().await.unwrap().unwrap());
            }

            // Reply with a result batch, then close.
            ws.send(Message::Text(
                r#"[{"is_final": true, "alternatives": [{"transcript": "ok", "confidence": 1.0}]}]"#
                    .to_string(),
            ))
            .await
            .unwrap();
            ws.send(Message::Close(None)).await.unwrap();
            seen
        });

        let connector = WsConnector::new(&format!("ws://{}/ws", addr)).unwrap();
        let (transport, mut events) = connector.connect().await.unwrap();

        transport
            .send_handshake(serde_json::json!({"sample_rate": 48000}))
            .await
            .unwrap();
        transport.send_packet(vec![1, 2, 3]).await.unwrap();
        transport.send_packet(vec![4, 5]).await.unwrap();
        transport.send_end_of_utterance().await.unwrap();

        let seen = server.await.unwrap();
        assert!(matches!(&seen[0], Message::Text(t) if t.contains("sample_rate")));
        assert!(matches!(&seen[1], Message::Binary(b) if b == &vec![1, 2, 3]));
        assert!(matches!(&seen[2], Message::Binary(b) if b == &vec![4, 5]));
        assert!(matches!(&seen[3], Message::Binary(b) if b.is_empty()));

        match events.recv().await.unwrap() {
            TransportEvent::Results(batch) => {
                assert_eq!(batch.len(), 1);
                assert!(batch[0].is_final);
            }
            other => panic!("expected results, got {:?}", other),
        }
        match events.recv().await.unwrap() {
            TransportEvent::Disconnected(_) => {}
            other => panic!("expected disconnect, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn malformed_inbound_is_a_protocol_event_not_a_disconnect() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            ws.send(Message::Text("not json".to_string())).await.unwrap();
            ws.send(Message::Text("[]".to_string())).await.unwrap();
            // keep the connection up until the client has read both
            let _ = ws.next().await;
        });

        let connector = WsConnector::new(&format!("ws://{}/ws", addr)).unwrap();
        let (transport, mut events) = connector.connect().await.unwrap();

        assert!(matches!(
            events.recv().await.unwrap(),
            TransportEvent::ProtocolError(_)
        ));
        assert!(matches!(
            events.recv().await.unwrap(),
            TransportEvent::Results(batch) if batch.is_empty()
        ));
        transport.close();
    }
}
