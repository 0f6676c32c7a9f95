//! Test helper fakes for syrin-speak integration tests
//!
//! Provides in-memory stand-ins for the external collaborators:
//! - MemoryStore: HashMap-backed asset store with per-operation failure injection
//! - ScriptedHost: fixed device list with failing indices and an attempt recorder
//! - RecordingScheduler / RecordingSink: capture published payloads

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::Mutex;
use syrin_speak::audio::{AudioClip, DeviceCandidate, PlaybackHost};
use syrin_speak::error::{Error, Result};
use syrin_speak::job::Job;
use syrin_speak::pipeline::{CompletionSink, RetryScheduler};
use syrin_speak::store::{AssetStore, Namespace};

/// In-memory asset store with failure injection per operation.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    fail_fetch: bool,
    fail_put: bool,
    fail_delete: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, name: &str, bytes: Vec<u8>) -> Self {
        self.objects
            .lock()
            .unwrap()
            .insert(Namespace::Source.key_for(name), bytes);
        self
    }

    pub fn failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    pub fn failing_put(mut self) -> Self {
        self.fail_put = true;
        self
    }

    pub fn failing_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    pub fn contains(&self, namespace: Namespace, name: &str) -> bool {
        self.objects
            .lock()
            .unwrap()
            .contains_key(&namespace.key_for(name))
    }
}

#[async_trait]
impl AssetStore for MemoryStore {
    async fn fetch(&self, name: &str) -> Result<Vec<u8>> {
        if self.fail_fetch {
            return Err(Error::Transfer("injected fetch failure".to_string()));
        }
        self.objects
            .lock()
            .unwrap()
            .get(&Namespace::Source.key_for(name))
            .cloned()
            .ok_or_else(|| Error::AssetNotFound(name.to_string()))
    }

    async fn put(&self, namespace: Namespace, name: &str, bytes: &[u8]) -> Result<()> {
        if self.fail_put {
            return Err(Error::Transfer("injected put failure".to_string()));
        }
        self.objects
            .lock()
            .unwrap()
            .insert(namespace.key_for(name), bytes.to_vec());
        Ok(())
    }

    async fn delete(&self, namespace: Namespace, name: &str) -> Result<()> {
        if self.fail_delete {
            return Err(Error::Transfer("injected delete failure".to_string()));
        }
        self.objects
            .lock()
            .unwrap()
            .remove(&namespace.key_for(name))
            .map(|_| ())
            .ok_or_else(|| Error::AssetNotFound(name.to_string()))
    }
}

/// Scripted playback host: fixed devices, failing indices, attempt record.
pub struct ScriptedHost {
    devices: Vec<DeviceCandidate>,
    failing: HashSet<usize>,
    attempts: Mutex<Vec<usize>>,
}

impl ScriptedHost {
    pub fn new(channel_counts: &[u16], failing: &[usize]) -> Self {
        let devices = channel_counts
            .iter()
            .enumerate()
            .map(|(index, &output_channels)| DeviceCandidate {
                index,
                name: format!("device-{}", index),
                output_channels,
            })
            .collect();
        Self {
            devices,
            failing: failing.iter().copied().collect(),
            attempts: Mutex::new(Vec::new()),
        }
    }

    pub fn attempts(&self) -> Vec<usize> {
        self.attempts.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlaybackHost for ScriptedHost {
    fn devices(&self) -> Result<Vec<DeviceCandidate>> {
        Ok(self.devices.clone())
    }

    async fn play(&self, _clip: &AudioClip, device_index: usize) -> Result<()> {
        self.attempts.lock().unwrap().push(device_index);
        if self.failing.contains(&device_index) {
            Err(Error::Device(format!("injected failure on {}", device_index)))
        } else {
            Ok(())
        }
    }
}

/// Retry scheduler fake that records every requeued payload.
#[derive(Default)]
pub struct RecordingScheduler {
    requeued: Mutex<Vec<Vec<u8>>>,
    fail: bool,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            requeued: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn requeued(&self) -> Vec<Vec<u8>> {
        self.requeued.lock().unwrap().clone()
    }
}

#[async_trait]
impl RetryScheduler for RecordingScheduler {
    async fn schedule_retry(&self, job: &Job) -> Result<()> {
        if self.fail {
            return Err(Error::RequeuePublish("injected publish failure".to_string()));
        }
        self.requeued.lock().unwrap().push(job.raw_payload().to_vec());
        Ok(())
    }
}

/// Completion sink fake that records every notified payload.
#[derive(Default)]
pub struct RecordingSink {
    notified: Mutex<Vec<Vec<u8>>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            notified: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn notified(&self) -> Vec<Vec<u8>> {
        self.notified.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionSink for RecordingSink {
    async fn notify_completed(&self, job: &Job) -> Result<()> {
        if self.fail {
            return Err(Error::Transfer("injected notify failure".to_string()));
        }
        self.notified.lock().unwrap().push(job.raw_payload().to_vec());
        Ok(())
    }
}

/// One second of 440 Hz mono 16-bit WAV, generated in memory.
pub fn wav_bytes() -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 22050,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..22050 {
            let t = i as f32 / 22050.0;
            let sample = (t * 440.0 * 2.0 * std::f32::consts::PI).sin();
            writer
                .write_sample((sample * 0.5 * i16::MAX as f32) as i16)
                .unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}
