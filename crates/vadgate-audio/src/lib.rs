pub mod capture;
pub mod device;
pub mod resampler;

pub use capture::{CaptureStats, CaptureThread, DeviceConfig};
pub use device::{default_input_device_name, AudioContextInfo};
pub use resampler::StreamResampler;
