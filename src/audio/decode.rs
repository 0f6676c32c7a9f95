//! Audio decoder using symphonia
//!
//! Decodes a fetched artifact into interleaved stereo f32 samples at the
//! file's native sample rate. The job payloads are WAV in practice, but the
//! decoder accepts anything the enabled symphonia codecs can probe.
//!
//! # Sample Format
//!
//! - Output: stereo f32 samples (interleaved: [L, R, L, R, ...])
//! - Mono files: duplicated to stereo
//! - Multi-channel: downmixed to stereo

use crate::audio::AudioClip;
use crate::error::{Error, Result};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Decode an audio file into a playable clip.
///
/// # Arguments
/// - `path`: Path to the fetched artifact
///
/// # Errors
/// Returns `Error::Decode` if the file cannot be probed or decoded, or
/// contains no audio track.
pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<AudioClip> {
    let path = path.as_ref();

    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension() {
        hint.with_extension(ext.to_str().unwrap_or(""));
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| Error::Decode(format!("probe failed for {}: {}", path.display(), e)))?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| Error::Decode(format!("no audio track in {}", path.display())))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let sample_rate = codec_params.sample_rate.unwrap_or(44100);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Decode(format!("unsupported codec in {}: {}", path.display(), e)))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut channels = 2usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break; // EOF
            }
            Err(e) => {
                return Err(Error::Decode(format!(
                    "read failed in {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder
            .decode(&packet)
            .map_err(|e| Error::Decode(format!("decode failed in {}: {}", path.display(), e)))?;

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            channels = spec.channels.count();
            sample_buf = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
        }

        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    if samples.is_empty() {
        return Err(Error::Decode(format!("no samples decoded from {}", path.display())));
    }

    let stereo = interleave_to_stereo(&samples, channels);

    debug!(
        "Decoded {}: {} frames at {} Hz ({} channels in source)",
        path.display(),
        stereo.len() / 2,
        sample_rate,
        channels
    );

    Ok(AudioClip {
        samples: stereo,
        sample_rate,
    })
}

/// Convert interleaved samples of arbitrary channel count to stereo.
///
/// Mono is duplicated, stereo passes through, wider layouts are downmixed by
/// averaging even channels into left and odd channels into right.
fn interleave_to_stereo(samples: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        0 | 1 => {
            let mut stereo = Vec::with_capacity(samples.len() * 2);
            for &sample in samples {
                stereo.push(sample);
                stereo.push(sample);
            }
            stereo
        }
        2 => samples.to_vec(),
        n => {
            let frames = samples.len() / n;
            let mut stereo = Vec::with_capacity(frames * 2);
            for frame in samples.chunks_exact(n) {
                let mut left_sum = 0.0f32;
                let mut right_sum = 0.0f32;
                for (ch, &sample) in frame.iter().enumerate() {
                    if ch % 2 == 0 {
                        left_sum += sample;
                    } else {
                        right_sum += sample;
                    }
                }
                stereo.push(left_sum / (n as f32 / 2.0));
                stereo.push(right_sum / (n as f32 / 2.0));
            }
            stereo
        }
    }
}
