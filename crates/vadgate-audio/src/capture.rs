use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::mpsc;

use super::device::open_input_device;
use vadgate_foundation::CaptureError;

/// Negotiated configuration of the opened input device.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Default)]
pub struct CaptureStats {
    pub chunks_captured: AtomicU64,
    pub chunks_dropped: AtomicU64,
}

/// Handle to the dedicated capture thread.
///
/// cpal streams are not `Send`, so the stream lives on its own named thread
/// for the whole session. The real-time callback converts whatever the device
/// delivers to mono f32 and hands it off through a bounded channel with
/// `try_send`; it never blocks, and overruns are counted instead of waited on.
pub struct CaptureThread {
    handle: JoinHandle<()>,
    running: Arc<AtomicBool>,
    stats: Arc<CaptureStats>,
}

impl CaptureThread {
    /// Open the device, negotiate a config, and start streaming chunks of
    /// mono f32 samples (at the device rate) into `chunk_tx`.
    pub fn open(
        device_name: Option<&str>,
        chunk_tx: mpsc::Sender<Vec<f32>>,
    ) -> Result<(Self, DeviceConfig), CaptureError> {
        let device = open_input_device(device_name)?;
        if let Ok(name) = device.name() {
            tracing::info!("Selected input device: {}", name);
        }
        let (config, sample_format) = negotiate_config(&device)?;
        if config.channels == 0 {
            return Err(CaptureError::NoAudioTrack);
        }

        let device_config = DeviceConfig {
            sample_rate: config.sample_rate.0,
            channels: config.channels,
        };

        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(CaptureStats::default());

        let thread_running = running.clone();
        let thread_stats = stats.clone();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), CaptureError>>();

        let handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                let stream = match build_stream(
                    &device,
                    &config,
                    sample_format,
                    chunk_tx,
                    thread_stats,
                    thread_running.clone(),
                ) {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(e.into()));
                    return;
                }
                let _ = ready_tx.send(Ok(()));
                while thread_running.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(50));
                }
                drop(stream);
                tracing::info!("Audio capture thread shut down");
            })
            .map_err(|e| CaptureError::ThreadStart(e.to_string()))?;

        match ready_rx.recv_timeout(Duration::from_secs(3)) {
            Ok(Ok(())) => {
                tracing::info!(
                    "Capture started: {} Hz, {} channel(s)",
                    device_config.sample_rate,
                    device_config.channels
                );
                Ok((
                    Self {
                        handle,
                        running,
                        stats,
                    },
                    device_config,
                ))
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                running.store(false, Ordering::SeqCst);
                Err(CaptureError::ThreadStart(
                    "capture thread did not report readiness in time".to_string(),
                ))
            }
        }
    }

    pub fn stats(&self) -> Arc<CaptureStats> {
        self.stats.clone()
    }

    /// Stop the stream and join the thread. Safe to call exactly once; the
    /// cleanup registry guarantees it is not called twice.
    pub fn stop(self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.handle.join();
    }
}

fn negotiate_config(device: &cpal::Device) -> Result<(StreamConfig, SampleFormat), CaptureError> {
    if let Ok(default_config) = device.default_input_config() {
        return Ok((
            StreamConfig {
                channels: default_config.channels(),
                sample_rate: default_config.sample_rate(),
                buffer_size: cpal::BufferSize::Default,
            },
            default_config.sample_format(),
        ));
    }

    if let Some(config) = device.supported_input_configs()?.next() {
        return Ok((config.with_max_sample_rate().into(), config.sample_format()));
    }

    Err(CaptureError::FormatNotSupported {
        format: "no supported input formats".to_string(),
    })
}

fn build_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    chunk_tx: mpsc::Sender<Vec<f32>>,
    stats: Arc<CaptureStats>,
    running: Arc<AtomicBool>,
) -> Result<Stream, CaptureError> {
    let channels = config.channels as usize;

    let err_fn = |err: cpal::StreamError| {
        tracing::error!("Audio stream error: {}", err);
    };

    // Shared tail of every format-specific callback: hand the mono chunk to
    // the control side without ever blocking the audio clock.
    let forward = move |mono: Vec<f32>| {
        if !running.load(Ordering::SeqCst) {
            return;
        }
        match chunk_tx.try_send(mono) {
            Ok(()) => {
                stats.chunks_captured.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                stats.chunks_dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    };

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            config,
            move |data: &[f32], _: &_| {
                forward(downmix_f32(data, channels));
            },
            err_fn,
            None,
        )?,
        SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _: &_| {
                forward(downmix_i16(data, channels));
            },
            err_fn,
            None,
        )?,
        SampleFormat::U16 => device.build_input_stream(
            config,
            move |data: &[u16], _: &_| {
                forward(downmix_u16(data, channels));
            },
            err_fn,
            None,
        )?,
        other => {
            return Err(CaptureError::FormatNotSupported {
                format: format!("{:?}", other),
            });
        }
    };

    Ok(stream)
}

fn downmix_f32(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn downmix_i16(data: &[i16], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.iter().map(|&s| s as f32 / 32768.0).collect();
    }
    data.chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as f32 / 32768.0
        })
        .collect()
}

fn downmix_u16(data: &[u16], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data
            .iter()
            .map(|&s| (s as i32 - 32768) as f32 / 32768.0)
            .collect();
    }
    data.chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32 - 32768).sum();
            (sum / channels as i32) as f32 / 32768.0
        })
        .collect()
}

#[cfg(test)]
mod convert_tests {
    use super::*;

    #[test]
    fn stereo_f32_averages_pairs() {
        let data = [1.0f32, 0.0, -1.0, 1.0, 0.5, 0.5];
        assert_eq!(downmix_f32(&data, 2), vec![0.5, 0.0, 0.5]);
    }

    #[test]
    fn mono_f32_passes_through() {
        let data = [0.25f32, -0.25];
        assert_eq!(downmix_f32(&data, 1), data.to_vec());
    }

    #[test]
    fn i16_scaling_is_symmetric() {
        let out = downmix_i16(&[i16::MIN, 0, 16384], 1);
        assert!((out[0] + 1.0).abs() < 1e-6);
        assert_eq!(out[1], 0.0);
        assert!((out[2] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn u16_centering() {
        let out = downmix_u16(&[0u16, 32768, 65535], 1);
        assert!((out[0] + 1.0).abs() < 1e-6);
        assert_eq!(out[1], 0.0);
        assert!(out[2] > 0.99);
    }

    #[test]
    fn stereo_i16_opposite_channels_cancel() {
        let out = downmix_i16(&[1000, -1000, 900, -900], 2);
        assert_eq!(out, vec![0.0, 0.0]);
    }
}
