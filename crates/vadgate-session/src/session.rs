use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use vadgate_audio::StreamResampler;
use vadgate_codec::{FrameEncoder, FRAME_SIZE_SAMPLES, TARGET_SAMPLE_RATE_HZ};
use vadgate_foundation::{CleanupRegistry, SessionError, SessionState, SessionStateMachine};
use vadgate_gate::{GateEvent, VadGate};
use vadgate_transport::{Transport, TransportEvent};

use crate::backend::SessionBackend;
use crate::config::SessionOptions;
use crate::events::{EventBus, SessionEvent};
use crate::provider::EngineProvider;

/// One single-use recognition session.
///
/// `run()` drives the whole lifecycle: four concurrent acquisitions, pipeline
/// wiring, and teardown. `stop()`/`abort()` can be called from any task at
/// any point; the state machine arbitrates so cleanup runs exactly once and
/// exactly one `End` is emitted, always last.
pub struct Session {
    state: SessionStateMachine,
    cleanup: CleanupRegistry,
    bus: Arc<EventBus>,
    options: SessionOptions,
    /// Set when `stop()`/`abort()` wins teardown while acquisitions are still
    /// pending; `run()` completes the teardown after they settle.
    stop_requested: AtomicBool,
    acquisitions_settled: AtomicBool,
    /// Finish-once latch for teardown; also guarantees the single `End`.
    ended: AtomicBool,
}

impl Session {
    pub fn new(options: SessionOptions, bus: Arc<EventBus>) -> Self {
        Self {
            state: SessionStateMachine::new(),
            cleanup: CleanupRegistry::new(),
            bus,
            options,
            stop_requested: AtomicBool::new(false),
            acquisitions_settled: AtomicBool::new(false),
            ended: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state.current()
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Graceful stop. Safe to call repeatedly and from any task; only the
    /// first call on an active session has any effect.
    pub fn stop(&self) {
        if !self.state.begin_teardown() {
            return;
        }
        // The store must precede the settled check: if the acquisitions were
        // still pending, run() is guaranteed to observe the request after it
        // settles and finish the teardown for us.
        self.stop_requested.store(true, Ordering::SeqCst);
        if self.acquisitions_settled.load(Ordering::SeqCst) {
            self.finish_teardown();
        }
    }

    /// Error stop: same teardown as `stop()`, preceded by an `Error`
    /// notification. Loses quietly if a teardown is already underway.
    pub fn abort(&self, reason: String) {
        if !self.state.begin_teardown() {
            return;
        }
        tracing::warn!("Session aborting: {}", reason);
        self.bus.dispatch(&SessionEvent::Error(reason));
        self.stop_requested.store(true, Ordering::SeqCst);
        if self.acquisitions_settled.load(Ordering::SeqCst) {
            self.finish_teardown();
        }
    }

    /// Release every acquired resource, enter `Stopped`, emit `End`.
    ///
    /// A stop racing the settle point can reach here from both sides; the
    /// `ended` swap lets exactly one caller through, so the registry drain,
    /// the final transition, and the single `End` happen once per session.
    fn finish_teardown(&self) {
        if self.ended.swap(true, Ordering::SeqCst) {
            return;
        }
        self.cleanup.run_all();
        if let Err(e) = self.state.transition(SessionState::Stopped) {
            tracing::error!("Teardown could not finalize state: {}", e);
        }
        self.bus.dispatch(&SessionEvent::End);
    }

    /// Drive the session to completion. Resolves once the session is running
    /// (the pipeline continues on background tasks) or once a failed start
    /// has been fully torn down.
    pub async fn run(
        self: &Arc<Self>,
        backend: Arc<dyn SessionBackend>,
        provider: Arc<dyn EngineProvider>,
    ) -> Result<(), SessionError> {
        match self.acquire_and_wire(backend, provider).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if e.is_acquisition_failure() {
                    tracing::warn!("Session start failed during acquisition: {}", e);
                } else {
                    tracing::error!("Session failed: {}", e);
                }
                if self.state.begin_teardown() {
                    self.bus.dispatch(&SessionEvent::Error(e.to_string()));
                    self.finish_teardown();
                }
                Err(e)
            }
        }
    }

    async fn acquire_and_wire(
        self: &Arc<Self>,
        backend: Arc<dyn SessionBackend>,
        provider: Arc<dyn EngineProvider>,
    ) -> Result<(), SessionError> {
        // All four acquisitions settle before any teardown decision; a stop
        // racing this join is deferred, never interleaved with it.
        let (ctx, engine, capture, transport) = tokio::join!(
            backend.open_audio_context(),
            backend.load_engine(),
            backend.open_capture(self.options.device_name.clone()),
            backend.connect_transport(&self.options.endpoint),
        );

        // Register one release action per successful acquisition before
        // anything else can observe the session.
        if let Ok(info) = &ctx {
            let host = info.host.clone();
            self.cleanup
                .register(move || tracing::debug!("Released audio context on host {}", host));
        }
        if engine.is_ok() {
            self.cleanup
                .register(|| tracing::debug!("Released codec engine"));
        }
        let capture = capture.map(|handle| {
            let stop = handle.stop;
            let bus = self.bus.clone();
            self.cleanup.register(move || {
                stop();
                bus.dispatch(&SessionEvent::AudioEnd);
            });
            (handle.chunks, handle.sample_rate)
        });
        let transport = transport.map(|(transport, inbound)| {
            let t = transport.clone();
            self.cleanup.register(move || t.close());
            (transport, inbound)
        });

        self.acquisitions_settled.store(true, Ordering::SeqCst);

        if self.stop_requested.load(Ordering::SeqCst) {
            // stop()/abort() arrived mid-acquisition and deferred to us.
            self.finish_teardown();
            return Ok(());
        }

        let ctx = ctx?;
        let engine = engine?;
        let (chunks, capture_rate) = capture?;
        let (transport, inbound) = transport?;
        tracing::info!(
            "Acquired session resources: host={} device={:?} codec={} rate={}",
            ctx.host,
            ctx.device_name,
            engine.version,
            capture_rate
        );

        let resampler = StreamResampler::new(capture_rate, TARGET_SAMPLE_RATE_HZ)?;
        let encoder = FrameEncoder::new(engine.engine);
        let gate = VadGate::new(self.options.gate_config());
        let speaking = gate.speaking_handle();

        // The handshake is strictly the first message on the wire.
        let handshake = serde_json::json!({
            "sample_rate": TARGET_SAMPLE_RATE_HZ,
            "frame_size": FRAME_SIZE_SAMPLES,
            "codec": engine.version,
            "engine-config": provider.build_engine_config(&self.options),
        });
        transport
            .send_handshake(handshake)
            .await
            .map_err(|_| {
                SessionError::TransportOpenFailure("connection lost before handshake".to_string())
            })?;

        if self.state.transition(SessionState::Running).is_err() {
            // A stop arrived after the settled flag was up, so that caller
            // runs the teardown itself; nothing more to do here.
            return Ok(());
        }

        self.bus.dispatch(&SessionEvent::Start);
        self.bus.dispatch(&SessionEvent::AudioStart);

        tokio::spawn(pipeline_worker(
            self.clone(),
            chunks,
            resampler,
            encoder,
            gate,
            transport,
        ));
        tokio::spawn(transport_reader(self.clone(), inbound, speaking));

        Ok(())
    }
}

fn gate_event(event: GateEvent) -> SessionEvent {
    match event {
        GateEvent::SoundStart => SessionEvent::SoundStart,
        GateEvent::SpeechStart => SessionEvent::SpeechStart,
        GateEvent::SpeechEnd => SessionEvent::SpeechEnd,
        GateEvent::SoundEnd => SessionEvent::SoundEnd,
    }
}

/// Capture chunks -> resampler -> frame encoder -> gate -> transport.
///
/// Runs until the capture channel closes (teardown stopped the capture
/// thread) or the session leaves `Running`. Packets for one gate step are
/// sent before its notifications are dispatched; the end-of-utterance marker
/// goes after that step's packets.
async fn pipeline_worker(
    session: Arc<Session>,
    mut chunks: mpsc::Receiver<Vec<f32>>,
    mut resampler: StreamResampler,
    mut encoder: FrameEncoder,
    mut gate: VadGate,
    transport: Arc<dyn Transport>,
) {
    while let Some(chunk) = chunks.recv().await {
        if session.state() != SessionState::Running {
            break;
        }

        let resampled = resampler.process(&chunk);
        if resampled.is_empty() {
            continue;
        }

        let mut packets = Vec::new();
        if let Err(e) = encoder.push(&resampled, &mut |p| packets.push(p)) {
            session.abort(format!("codec failure: {e}"));
            return;
        }

        for packet in packets {
            let out = gate.process(packet);

            let mut send_failed = false;
            for p in out.packets {
                if transport.send_packet(p.payload).await.is_err() {
                    send_failed = true;
                    break;
                }
            }
            if !send_failed && out.end_of_utterance {
                send_failed = transport.send_end_of_utterance().await.is_err();
            }

            for event in out.events {
                session.bus.dispatch(&gate_event(event));
            }

            if send_failed {
                session.abort(
                    SessionError::TransportDisconnected("send failed while streaming".to_string())
                        .to_string(),
                );
                return;
            }
        }
    }
}

/// Inbound transport traffic -> notifications and lifecycle decisions.
///
/// An empty batch, or one whose last entry is final, while the gate is not
/// speaking, means the engine considers the utterance done: stop. A
/// continuous session survives in-speech finals only because its gate never
/// releases, keeping the speaking flag up. A disconnect while running is an
/// abort; during teardown it is expected noise.
async fn transport_reader(
    session: Arc<Session>,
    mut inbound: mpsc::Receiver<TransportEvent>,
    speaking: Arc<AtomicBool>,
) {
    while let Some(event) = inbound.recv().await {
        match event {
            TransportEvent::Results(batch) => {
                let utterance_done =
                    batch.is_empty() || batch.last().map(|r| r.is_final).unwrap_or(false);
                session.bus.dispatch(&SessionEvent::Result(batch));
                if utterance_done && !speaking.load(Ordering::SeqCst) {
                    session.stop();
                }
            }
            TransportEvent::ProtocolError(msg) => {
                session
                    .bus
                    .dispatch(&SessionEvent::Error(SessionError::Protocol(msg).to_string()));
            }
            TransportEvent::Disconnected(msg) => {
                if session.state() == SessionState::Running {
                    session.abort(SessionError::TransportDisconnected(msg).to_string());
                }
                return;
            }
        }
    }
}
