use parking_lot::Mutex;
use std::sync::Arc;

use vadgate_foundation::{SessionError, SessionState};

use crate::backend::SessionBackend;
use crate::config::SessionOptions;
use crate::events::EventBus;
use crate::live::LiveBackend;
use crate::provider::EngineProvider;
use crate::session::Session;

/// Public entry point: holds the mutable pre-start configuration and at most
/// one active session.
///
/// `options` may be edited freely between sessions; `start()` snapshots them
/// into the new session. A second `start()` while a session is preparing or
/// running fails with `AlreadyRunning` and changes nothing.
pub struct Recognizer {
    pub options: SessionOptions,
    bus: Arc<EventBus>,
    backend: Arc<dyn SessionBackend>,
    provider: Arc<dyn EngineProvider>,
    active: Mutex<Option<Arc<Session>>>,
}

impl Recognizer {
    pub fn new(backend: Arc<dyn SessionBackend>, provider: Arc<dyn EngineProvider>) -> Self {
        Self {
            options: SessionOptions::default(),
            bus: Arc::new(EventBus::new()),
            backend,
            provider,
            active: Mutex::new(None),
        }
    }

    /// Recognizer wired to the live microphone and WebSocket backend.
    pub fn live(provider: Arc<dyn EngineProvider>) -> Self {
        Self::new(Arc::new(LiveBackend), provider)
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Begin a session with a snapshot of the current options.
    ///
    /// Returns the session handle as soon as it is launched; progress and
    /// results arrive through the event bus. The handle outlives the
    /// recognizer's interest in it, so callers may hold it to poll state.
    pub fn start(&self) -> Result<Arc<Session>, SessionError> {
        let mut active = self.active.lock();

        if let Some(existing) = active.as_ref() {
            match existing.state() {
                SessionState::Preparing | SessionState::Running => {
                    return Err(SessionError::AlreadyRunning);
                }
                // A stopping or stopped session is spent and replaceable.
                SessionState::Stopping | SessionState::Stopped => {}
            }
        }

        let session = Arc::new(Session::new(self.options.clone(), self.bus.clone()));
        *active = Some(session.clone());
        drop(active);

        let run = session.clone();
        let backend = self.backend.clone();
        let provider = self.provider.clone();
        tokio::spawn(async move {
            // Failures are reported through the bus as Error then End.
            let _ = run.run(backend, provider).await;
        });

        Ok(session)
    }

    /// Gracefully stop the active session, if any.
    pub fn stop(&self) {
        if let Some(session) = self.active.lock().as_ref() {
            session.stop();
        }
    }

    /// Abort the active session, if any.
    pub fn abort(&self) {
        if let Some(session) = self.active.lock().as_ref() {
            session.abort("aborted by caller".to_string());
        }
    }
}
