//! Audio decoding, device selection, and output
//!
//! Decoded audio is normalized to interleaved stereo f32 at the file's native
//! sample rate; playback opens the output device at that rate.

pub mod decode;
pub mod device;
pub mod output;

pub use decode::decode_file;
pub use device::{DeviceCandidate, DeviceSelector, PlaybackHost};
pub use output::CpalHost;

/// Decoded audio ready for playback.
///
/// **Format:**
/// - Samples are f32 (floating point -1.0 to 1.0)
/// - Stereo interleaved: [L, R, L, R, ...]
/// - Sample rate is the source file's native rate
#[derive(Debug, Clone)]
pub struct AudioClip {
    /// PCM audio samples (interleaved stereo)
    pub samples: Vec<f32>,

    /// Native sample rate of the decoded file
    pub sample_rate: u32,
}

impl AudioClip {
    /// Number of stereo frames
    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    /// Playback duration in seconds
    pub fn duration_seconds(&self) -> f32 {
        self.frames() as f32 / self.sample_rate as f32
    }
}
