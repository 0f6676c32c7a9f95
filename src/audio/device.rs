//! Output device selection
//!
//! Scans the enumerated output devices in ascending index order and plays the
//! clip on the first device that accepts it. Devices in a reserved low-index
//! prefix are never attempted: on the host platform those ordinals are
//! virtual routing endpoints that accept output without audibly rendering it.

use crate::audio::AudioClip;
use crate::error::{Error, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// A playback target reported by the platform audio layer.
#[derive(Debug, Clone)]
pub struct DeviceCandidate {
    /// Ordinal position in the enumerated device list
    pub index: usize,
    /// Human-readable device name
    pub name: String,
    /// Maximum output channels; zero means the device cannot emit audio
    pub output_channels: u16,
}

/// Capability interface over the platform audio layer.
#[async_trait]
pub trait PlaybackHost: Send + Sync {
    /// Enumerate all devices, in platform order, with output capabilities.
    fn devices(&self) -> Result<Vec<DeviceCandidate>>;

    /// Play the clip on the device at `device_index`, blocking (as a future)
    /// until playback completes or the device reports an error.
    async fn play(&self, clip: &AudioClip, device_index: usize) -> Result<()>;
}

/// Ordered device probing with a reserved-prefix skip.
#[derive(Debug, Clone)]
pub struct DeviceSelector {
    skip_devices: usize,
}

impl DeviceSelector {
    /// Create a selector that never attempts the first `skip_devices`
    /// enumerated devices.
    pub fn new(skip_devices: usize) -> Self {
        Self { skip_devices }
    }

    /// Attempt playback on each eligible device in ascending index order,
    /// stopping at the first success.
    ///
    /// Per-device errors are logged and the scan continues. Exactly one full
    /// pass is made per invocation.
    ///
    /// # Errors
    /// - `Error::NoDeviceAvailable` if every eligible device was tried and
    ///   none accepted playback
    /// - `Error::Device` if device enumeration itself failed
    pub async fn play_on_first_available(
        &self,
        host: &dyn PlaybackHost,
        clip: &AudioClip,
    ) -> Result<()> {
        let devices = host.devices()?;
        debug!("Found {} output device candidates", devices.len());

        for candidate in &devices {
            if candidate.index < self.skip_devices {
                debug!(
                    "Skipping reserved device {}: {}",
                    candidate.index, candidate.name
                );
                continue;
            }

            if candidate.output_channels == 0 {
                debug!(
                    "Skipping device {} with no output channels: {}",
                    candidate.index, candidate.name
                );
                continue;
            }

            info!(
                "Attempting playback on device {}: {}",
                candidate.index, candidate.name
            );

            match host.play(clip, candidate.index).await {
                Ok(()) => {
                    info!(
                        "Audio played on device {}: {}",
                        candidate.index, candidate.name
                    );
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "Playback failed on device {} ({}): {}",
                        candidate.index, candidate.name, e
                    );
                }
            }
        }

        Err(Error::NoDeviceAvailable)
    }
}
