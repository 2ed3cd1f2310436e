pub mod constants;
pub mod encoder;
pub mod engine;
pub mod module;
pub mod pcm;

pub use constants::{FRAME_DURATION_SECS, FRAME_SIZE_SAMPLES, TARGET_SAMPLE_RATE_HZ};
pub use encoder::FrameEncoder;
pub use engine::{CodecEngine, CodecError, EncodedFrame, EncodedPacket};
pub use module::{engine_module, reset_engine_module, EngineModule};
pub use pcm::Pcm16Engine;
