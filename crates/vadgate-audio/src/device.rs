use cpal::traits::{DeviceTrait, HostTrait};

use vadgate_foundation::CaptureError;

/// Snapshot of the audio host taken when a session opens its audio context.
#[derive(Debug, Clone)]
pub struct AudioContextInfo {
    pub host: String,
    pub device_name: Option<String>,
}

/// Probe the default host for an input device.
///
/// This is the "audio context" acquisition: it proves capture is possible at
/// all before the heavier capture thread is started, and fails with
/// `DeviceNotFound` when the host has no input at all.
pub fn default_input_device_name() -> Result<AudioContextInfo, CaptureError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(CaptureError::DeviceNotFound { name: None })?;
    let device_name = device.name().ok();
    tracing::info!(
        "Audio context: host {:?}, default input {:?}",
        host.id(),
        device_name
    );
    Ok(AudioContextInfo {
        host: format!("{:?}", host.id()),
        device_name,
    })
}

/// Look up an input device by name on the default host, falling back to the
/// host default when no name is given.
pub fn open_input_device(name: Option<&str>) -> Result<cpal::Device, CaptureError> {
    let host = cpal::default_host();
    match name {
        Some(wanted) => {
            let mut devices = host.input_devices().map_err(|e| {
                CaptureError::ThreadStart(format!("failed to enumerate input devices: {e}"))
            })?;
            devices
                .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
                .ok_or_else(|| CaptureError::DeviceNotFound {
                    name: Some(wanted.to_string()),
                })
        }
        None => host
            .default_input_device()
            .ok_or(CaptureError::DeviceNotFound { name: None }),
    }
}
