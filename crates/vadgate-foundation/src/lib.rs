pub mod cleanup;
pub mod error;
pub mod state;

pub use cleanup::CleanupRegistry;
pub use error::{CaptureError, SessionError};
pub use state::{SessionState, SessionStateMachine};
