pub mod backend;
pub mod config;
pub mod events;
pub mod live;
pub mod provider;
pub mod recognizer;
pub mod session;

pub use backend::{CaptureHandle, EngineHandle, SessionBackend};
pub use config::SessionOptions;
pub use events::{Dispatch, EventBus, EventKind, HandlerId, SessionEvent};
pub use live::LiveBackend;
pub use provider::{AmiVoice, EngineProvider, GoogleSpeechToText};
pub use recognizer::Recognizer;
pub use session::Session;
