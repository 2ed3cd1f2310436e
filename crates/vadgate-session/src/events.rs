use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use vadgate_transport::RecognitionResult;

/// Kinds of notifications a session emits, in lifecycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Start,
    AudioStart,
    SoundStart,
    SpeechStart,
    SpeechEnd,
    SoundEnd,
    AudioEnd,
    Result,
    Error,
    End,
}

impl EventKind {
    pub const ALL: [EventKind; 10] = [
        EventKind::Start,
        EventKind::AudioStart,
        EventKind::SoundStart,
        EventKind::SpeechStart,
        EventKind::SpeechEnd,
        EventKind::SoundEnd,
        EventKind::AudioEnd,
        EventKind::Result,
        EventKind::Error,
        EventKind::End,
    ];
}

/// One session notification with its payload.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Start,
    AudioStart,
    SoundStart,
    SpeechStart,
    SpeechEnd,
    SoundEnd,
    AudioEnd,
    Result(Vec<RecognitionResult>),
    Error(String),
    End,
}

impl SessionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SessionEvent::Start => EventKind::Start,
            SessionEvent::AudioStart => EventKind::AudioStart,
            SessionEvent::SoundStart => EventKind::SoundStart,
            SessionEvent::SpeechStart => EventKind::SpeechStart,
            SessionEvent::SpeechEnd => EventKind::SpeechEnd,
            SessionEvent::SoundEnd => EventKind::SoundEnd,
            SessionEvent::AudioEnd => EventKind::AudioEnd,
            SessionEvent::Result(_) => EventKind::Result,
            SessionEvent::Error(_) => EventKind::Error,
            SessionEvent::End => EventKind::End,
        }
    }
}

/// Returned by a handler to control whether dispatch continues down the
/// subscriber list (and into the default handler).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Continue,
    Suppress,
}

type Handler = Box<dyn Fn(&SessionEvent) -> Dispatch + Send + Sync>;

/// Token returned by `subscribe`, used to remove that handler later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerId(u64);

struct BusInner {
    next_id: u64,
    listeners: HashMap<EventKind, Vec<(HandlerId, Handler)>>,
    defaults: HashMap<EventKind, Handler>,
}

/// Per-kind subscriber lists plus at most one default handler per kind.
///
/// Subscribers run in registration order, then the default handler. A handler
/// returning `Suppress` stops dispatch for that event, including the default.
/// A panicking handler is logged and skipped; later handlers still run.
///
/// Handlers must not call back into the bus; the inner lock is held for the
/// duration of a dispatch.
pub struct EventBus {
    inner: Mutex<BusInner>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(BusInner {
                next_id: 0,
                listeners: HashMap::new(),
                defaults: HashMap::new(),
            }),
        }
    }

    pub fn subscribe(
        &self,
        kind: EventKind,
        handler: impl Fn(&SessionEvent) -> Dispatch + Send + Sync + 'static,
    ) -> HandlerId {
        let mut inner = self.inner.lock();
        let id = HandlerId(inner.next_id);
        inner.next_id += 1;
        inner
            .listeners
            .entry(kind)
            .or_default()
            .push((id, Box::new(handler)));
        id
    }

    /// Remove a previously subscribed handler. Returns false if it was
    /// already gone.
    pub fn unsubscribe(&self, kind: EventKind, id: HandlerId) -> bool {
        let mut inner = self.inner.lock();
        if let Some(list) = inner.listeners.get_mut(&kind) {
            let before = list.len();
            list.retain(|(h, _)| *h != id);
            return list.len() != before;
        }
        false
    }

    /// Install the fallback handler for a kind, replacing any previous one.
    pub fn set_default(
        &self,
        kind: EventKind,
        handler: impl Fn(&SessionEvent) -> Dispatch + Send + Sync + 'static,
    ) {
        self.inner.lock().defaults.insert(kind, Box::new(handler));
    }

    pub fn dispatch(&self, event: &SessionEvent) {
        let inner = self.inner.lock();
        let kind = event.kind();

        if let Some(list) = inner.listeners.get(&kind) {
            for (id, handler) in list {
                match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                    Ok(Dispatch::Continue) => {}
                    Ok(Dispatch::Suppress) => return,
                    Err(_) => {
                        tracing::error!("Event handler {:?} panicked on {:?}", id, kind);
                    }
                }
            }
        }

        if let Some(handler) = inner.defaults.get(&kind) {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                tracing::error!("Default handler panicked on {:?}", kind);
            }
        }
    }
}
