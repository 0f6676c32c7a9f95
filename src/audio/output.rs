//! Audio output using cpal
//!
//! `CpalHost` implements `PlaybackHost` on the platform's default audio host.
//! Enumeration reports every device with its maximum output channel count;
//! playback opens the requested device at the clip's native sample rate and
//! blocks until the clip has been handed to the device in full.
//!
//! The blocking wait runs on the tokio blocking pool so the broker
//! connection's heartbeats stay serviced during playback.

use crate::audio::device::{DeviceCandidate, PlaybackHost};
use crate::audio::AudioClip;
use crate::error::{Error, Result};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, Stream, StreamConfig};
use std::sync::mpsc;
use std::time::Duration;
use tracing::debug;

/// Waiting margin on top of the clip duration before a device that accepted
/// the stream but never drained it is reported as failed.
const PLAYBACK_GRACE: Duration = Duration::from_secs(5);

/// Pause after the completion signal so the device drains its final buffer.
const DRAIN_PAUSE: Duration = Duration::from_millis(150);

/// Playback host backed by cpal's default audio host.
pub struct CpalHost;

impl CpalHost {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CpalHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlaybackHost for CpalHost {
    fn devices(&self) -> Result<Vec<DeviceCandidate>> {
        let host = cpal::default_host();

        let mut candidates = Vec::new();
        let devices = host
            .devices()
            .map_err(|e| Error::Device(format!("Failed to enumerate devices: {}", e)))?;

        for (index, device) in devices.enumerate() {
            let name = device.name().unwrap_or_else(|_| format!("device-{}", index));
            let output_channels = device
                .supported_output_configs()
                .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
                .unwrap_or(0);

            candidates.push(DeviceCandidate {
                index,
                name,
                output_channels,
            });
        }

        debug!("Enumerated {} devices", candidates.len());
        Ok(candidates)
    }

    async fn play(&self, clip: &AudioClip, device_index: usize) -> Result<()> {
        let samples = clip.samples.clone();
        let sample_rate = clip.sample_rate;
        let timeout = Duration::from_secs_f32(clip.duration_seconds()) + PLAYBACK_GRACE;

        tokio::task::spawn_blocking(move || {
            play_blocking(samples, sample_rate, device_index, timeout)
        })
        .await
        .map_err(|e| Error::Device(format!("playback task failed: {}", e)))?
    }
}

/// Open the device, stream the clip, and wait for the drain signal.
fn play_blocking(
    samples: Vec<f32>,
    sample_rate: u32,
    device_index: usize,
    timeout: Duration,
) -> Result<()> {
    let host = cpal::default_host();
    let device = host
        .devices()
        .map_err(|e| Error::Device(format!("Failed to enumerate devices: {}", e)))?
        .nth(device_index)
        .ok_or_else(|| Error::Device(format!("device index {} out of range", device_index)))?;

    let (config, sample_format) = output_config_for(&device, sample_rate)?;
    let channels = config.channels as usize;

    debug!(
        "Opening device {} at {} Hz, {} channels, {:?}",
        device_index, config.sample_rate.0, config.channels, sample_format
    );

    let (signal, done) = mpsc::channel::<Result<()>>();

    let stream = match sample_format {
        SampleFormat::F32 => build_stream_f32(&device, &config, samples, channels, signal)?,
        SampleFormat::I16 => build_stream_i16(&device, &config, samples, channels, signal)?,
        other => {
            return Err(Error::Device(format!(
                "Unsupported sample format: {:?}",
                other
            )));
        }
    };

    stream
        .play()
        .map_err(|e| Error::Device(format!("Failed to start stream: {}", e)))?;

    let result = done
        .recv_timeout(timeout)
        .unwrap_or_else(|_| Err(Error::Device("playback did not complete in time".to_string())));

    std::thread::sleep(DRAIN_PAUSE);
    drop(stream);

    result
}

/// Find a usable output configuration at the clip's sample rate.
///
/// Prefers stereo f32, then any f32, then i16. A device with no
/// configuration covering the rate is reported as a device error so the
/// selector can move on to the next candidate.
fn output_config_for(device: &Device, sample_rate: u32) -> Result<(StreamConfig, SampleFormat)> {
    let ranges: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| Error::Device(format!("Failed to get device configs: {}", e)))?
        .collect();

    let pick = |format: SampleFormat, channels: Option<u16>| {
        ranges.iter().find(|r| {
            r.sample_format() == format
                && channels.map_or(true, |c| r.channels() == c)
                && r.min_sample_rate().0 <= sample_rate
                && r.max_sample_rate().0 >= sample_rate
        })
    };

    let range = pick(SampleFormat::F32, Some(2))
        .or_else(|| pick(SampleFormat::F32, None))
        .or_else(|| pick(SampleFormat::I16, Some(2)))
        .or_else(|| pick(SampleFormat::I16, None))
        .ok_or_else(|| {
            Error::Device(format!("no supported output config at {} Hz", sample_rate))
        })?;

    let sample_format = range.sample_format();
    let config = range
        .clone()
        .with_sample_rate(SampleRate(sample_rate))
        .config();

    Ok((config, sample_format))
}

/// Spread one stereo frame across however many channels the device has.
fn spread_frame(frame: &mut [f32], left: f32, right: f32) {
    if frame.len() == 1 {
        frame[0] = ((left + right) * 0.5).clamp(-1.0, 1.0);
        return;
    }
    frame[0] = left.clamp(-1.0, 1.0);
    frame[1] = right.clamp(-1.0, 1.0);
    for extra in frame.iter_mut().skip(2) {
        *extra = 0.0;
    }
}

/// Build audio stream for f32 samples.
/// Signals once when the clip is fully handed to the device; stream errors
/// are forwarded through the same channel.
fn build_stream_f32(
    device: &Device,
    config: &StreamConfig,
    samples: Vec<f32>,
    channels: usize,
    signal: mpsc::Sender<Result<()>>,
) -> Result<Stream> {
    let error_signal = signal.clone();
    let total_frames = samples.len() / 2;
    let mut pos = 0usize;
    let mut signalled = false;

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let (left, right) = if pos < total_frames {
                        let l = samples[pos * 2];
                        let r = samples[pos * 2 + 1];
                        pos += 1;
                        (l, r)
                    } else {
                        (0.0, 0.0)
                    };
                    spread_frame(frame, left, right);
                }
                if pos >= total_frames && !signalled {
                    signalled = true;
                    let _ = signal.send(Ok(()));
                }
            },
            move |err| {
                let _ = error_signal.send(Err(Error::Device(err.to_string())));
            },
            None,
        )
        .map_err(|e| Error::Device(format!("Failed to build stream: {}", e)))?;

    Ok(stream)
}

/// Build audio stream for i16 samples.
fn build_stream_i16(
    device: &Device,
    config: &StreamConfig,
    samples: Vec<f32>,
    channels: usize,
    signal: mpsc::Sender<Result<()>>,
) -> Result<Stream> {
    let error_signal = signal.clone();
    let total_frames = samples.len() / 2;
    let mut pos = 0usize;
    let mut signalled = false;
    let mut frame_f32 = vec![0.0f32; channels];

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let (left, right) = if pos < total_frames {
                        let l = samples[pos * 2];
                        let r = samples[pos * 2 + 1];
                        pos += 1;
                        (l, r)
                    } else {
                        (0.0, 0.0)
                    };
                    spread_frame(&mut frame_f32, left, right);
                    for (out, &value) in frame.iter_mut().zip(frame_f32.iter()) {
                        *out = (value * i16::MAX as f32) as i16;
                    }
                }
                if pos >= total_frames && !signalled {
                    signalled = true;
                    let _ = signal.send(Ok(()));
                }
            },
            move |err| {
                let _ = error_signal.send(Err(Error::Device(err.to_string())));
            },
            None,
        )
        .map_err(|e| Error::Device(format!("Failed to build stream: {}", e)))?;

    Ok(stream)
}
