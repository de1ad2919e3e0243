//! Audio output for the sound tap
//!
//! With the `cpal-output` feature the tap is played on the default output
//! device. Without it, [`drain_realtime`] consumes the tap at the negotiated
//! sample rate so the stream behaves as if a device were attached.

use crate::audio::stream::SoundTap;
use crate::format::AudioFormat;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Period of the headless drain loop
const DRAIN_PERIOD: Duration = Duration::from_millis(10);

/// Consume the tap in real time until `cancel` fires
///
/// Returns the number of real (non-silent) samples consumed.
pub async fn drain_realtime(tap: SoundTap, format: AudioFormat, cancel: CancellationToken) -> u64 {
    let per_period = (format.sample_rate as u64 * format.channels as u64 * DRAIN_PERIOD.as_millis() as u64 / 1000)
        .max(1) as usize;
    let mut scratch = vec![0.0f32; per_period];
    let mut ticker = tokio::time::interval(DRAIN_PERIOD);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut consumed = 0u64;

    info!(
        "Headless audio drain: {} samples every {}ms",
        per_period,
        DRAIN_PERIOD.as_millis()
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                consumed += tap.fill(&mut scratch) as u64;
            }
        }
    }

    debug!("Headless audio drain finished: {} samples consumed", consumed);
    consumed
}

#[cfg(feature = "cpal-output")]
pub use device::CpalOutput;

#[cfg(feature = "cpal-output")]
mod device {
    use super::SoundTap;
    use crate::error::{Error, Result};
    use crate::format::AudioFormat;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::{SampleFormat, Stream, StreamConfig};
    use tracing::{error, info, warn};

    /// Plays a [`SoundTap`] on the default output device
    ///
    /// The tap carries `format.channels` interleaved channels; they are spread
    /// across the device channels (mono is duplicated).
    pub struct CpalOutput {
        stream: Stream,
        device_name: String,
    }

    impl CpalOutput {
        pub fn start(tap: SoundTap, format: AudioFormat) -> Result<Self> {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?;
            let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

            let supported = device
                .supported_output_configs()
                .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?
                .find(|config| {
                    config.sample_format() == SampleFormat::F32
                        && config.min_sample_rate().0 <= format.sample_rate
                        && config.max_sample_rate().0 >= format.sample_rate
                })
                .ok_or_else(|| {
                    Error::AudioOutput(format!(
                        "Device '{}' has no f32 config at {} Hz",
                        device_name, format.sample_rate
                    ))
                })?;

            let config: StreamConfig = supported
                .with_sample_rate(cpal::SampleRate(format.sample_rate))
                .config();
            let device_channels = config.channels as usize;
            let source_channels = format.channels as usize;
            let mut scratch: Vec<f32> = Vec::new();

            let stream = device
                .build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        let frames = data.len() / device_channels;
                        scratch.resize(frames * source_channels, 0.0);
                        tap.fill(&mut scratch);
                        for (frame, out) in data.chunks_mut(device_channels).enumerate() {
                            for (ch, sample) in out.iter_mut().enumerate() {
                                *sample = scratch[frame * source_channels + ch % source_channels];
                            }
                        }
                    },
                    move |err| {
                        error!("Audio stream error: {}", err);
                    },
                    None,
                )
                .map_err(|e| Error::AudioOutput(format!("Failed to build output stream: {}", e)))?;

            stream
                .play()
                .map_err(|e| Error::AudioOutput(format!("Failed to start output stream: {}", e)))?;

            if device_channels < source_channels {
                warn!(
                    "Device has {} channels, stream has {}; extra channels are dropped",
                    device_channels, source_channels
                );
            }
            info!(
                "Audio output started on '{}' ({} Hz, {} channels)",
                device_name, format.sample_rate, device_channels
            );

            Ok(Self { stream, device_name })
        }

        pub fn device_name(&self) -> &str {
            &self.device_name
        }
    }
}
