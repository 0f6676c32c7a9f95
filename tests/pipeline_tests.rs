//! Job pipeline integration tests
//!
//! Exercises the four-stage pipeline against in-memory fakes and verifies
//! the compensation asymmetries: what gets deleted, what gets retained, and
//! what gets republished at each failure point.

mod helpers;

use helpers::{wav_bytes, MemoryStore, RecordingScheduler, RecordingSink, ScriptedHost};
use std::sync::Arc;
use syrin_speak::audio::DeviceSelector;
use syrin_speak::job::Job;
use syrin_speak::pipeline::{JobOutcome, JobPipeline};
use syrin_speak::store::Namespace;
use tempfile::TempDir;

/// Build a job whose body carries extra fields beyond `filename`.
fn make_job(filename: &str) -> (Job, Vec<u8>) {
    let body = format!(
        "{{\"filename\": \"{}\", \"severity\": \"critical\", \"text\": \"atenção\"}}",
        filename
    )
    .into_bytes();
    let job = Job::from_payload(body.clone()).unwrap();
    (job, body)
}

struct Fixture {
    work_dir: TempDir,
    store: Arc<MemoryStore>,
    host: Arc<ScriptedHost>,
    scheduler: Arc<RecordingScheduler>,
    sink: Arc<RecordingSink>,
    pipeline: JobPipeline,
}

/// Wire a pipeline around the given fakes, skipping no devices unless
/// stated otherwise.
fn fixture(
    store: MemoryStore,
    host: ScriptedHost,
    skip_devices: usize,
) -> Fixture {
    let work_dir = TempDir::new().unwrap();
    let store = Arc::new(store);
    let host = Arc::new(host);
    let scheduler = Arc::new(RecordingScheduler::new());
    let sink = Arc::new(RecordingSink::new());
    let pipeline = JobPipeline::new(
        Arc::clone(&store) as _,
        Arc::clone(&host) as _,
        DeviceSelector::new(skip_devices),
        Arc::clone(&scheduler) as _,
        Arc::clone(&sink) as _,
        work_dir.path().to_path_buf(),
    );
    Fixture {
        work_dir,
        store,
        host,
        scheduler,
        sink,
        pipeline,
    }
}

/// Full success: fetched, played on device 3 after the reserved prefix,
/// archived, cleaned up, exactly one notification with the input payload.
#[tokio::test]
async fn test_success_path_end_to_end() {
    let f = fixture(
        MemoryStore::new().with_object("a.wav", wav_bytes()),
        ScriptedHost::new(&[2, 2, 2, 2], &[]),
        3,
    );
    let (job, body) = make_job("a.wav");

    let outcome = f.pipeline.process(&job).await;

    assert_eq!(outcome, JobOutcome::Completed);
    assert_eq!(f.host.attempts(), vec![3]);
    assert_eq!(f.sink.notified(), vec![body]);
    assert!(f.scheduler.requeued().is_empty());
    assert!(!f.store.contains(Namespace::Source, "a.wav"));
    assert!(f.store.contains(Namespace::Reproduced, "a.wav"));
    assert!(!f.work_dir.path().join("a.wav").exists());
}

/// Fetch failure: nothing archived, no scratch file, exactly one retry
/// message with the original payload byte-identical.
#[tokio::test]
async fn test_fetch_failure_compensates() {
    let f = fixture(
        MemoryStore::new().failing_fetch(),
        ScriptedHost::new(&[2], &[]),
        0,
    );
    let (job, body) = make_job("b.wav");

    let outcome = f.pipeline.process(&job).await;

    assert_eq!(outcome, JobOutcome::Compensated);
    assert!(f.host.attempts().is_empty());
    assert!(f.sink.notified().is_empty());
    assert_eq!(f.scheduler.requeued(), vec![body]);
    assert!(!f.store.contains(Namespace::Reproduced, "b.wav"));
    assert!(!f.work_dir.path().join("b.wav").exists());
}

/// A missing asset is a fetch-stage failure like any other.
#[tokio::test]
async fn test_missing_asset_compensates() {
    let f = fixture(MemoryStore::new(), ScriptedHost::new(&[2], &[]), 0);
    let (job, body) = make_job("absent.wav");

    let outcome = f.pipeline.process(&job).await;

    assert_eq!(outcome, JobOutcome::Compensated);
    assert_eq!(f.scheduler.requeued(), vec![body]);
}

/// Play failure: the scratch copy is deleted, the source object is left
/// untouched in the store.
#[tokio::test]
async fn test_play_failure_deletes_scratch_keeps_source() {
    let f = fixture(
        MemoryStore::new().with_object("c.wav", wav_bytes()),
        ScriptedHost::new(&[2, 2], &[0, 1]),
        0,
    );
    let (job, body) = make_job("c.wav");

    let outcome = f.pipeline.process(&job).await;

    assert_eq!(outcome, JobOutcome::Compensated);
    // Every output-capable device was tried exactly once
    assert_eq!(f.host.attempts(), vec![0, 1]);
    assert_eq!(f.scheduler.requeued(), vec![body]);
    assert!(f.store.contains(Namespace::Source, "c.wav"));
    assert!(!f.store.contains(Namespace::Reproduced, "c.wav"));
    assert!(!f.work_dir.path().join("c.wav").exists());
}

/// An undecodable artifact fails the play stage before any device is
/// attempted, with the same cleanup rule.
#[tokio::test]
async fn test_decode_failure_is_play_stage_failure() {
    let f = fixture(
        MemoryStore::new().with_object("noise.wav", b"definitely not audio".to_vec()),
        ScriptedHost::new(&[2], &[]),
        0,
    );
    let (job, body) = make_job("noise.wav");

    let outcome = f.pipeline.process(&job).await;

    assert_eq!(outcome, JobOutcome::Compensated);
    assert!(f.host.attempts().is_empty());
    assert_eq!(f.scheduler.requeued(), vec![body]);
    assert!(f.store.contains(Namespace::Source, "noise.wav"));
    assert!(!f.work_dir.path().join("noise.wav").exists());
}

/// Archive failure: neither the scratch copy nor the source object is
/// deleted: nothing destructive without a confirmed archive.
#[tokio::test]
async fn test_archive_failure_retains_everything() {
    let f = fixture(
        MemoryStore::new()
            .with_object("d.wav", wav_bytes())
            .failing_put(),
        ScriptedHost::new(&[2], &[]),
        0,
    );
    let (job, body) = make_job("d.wav");

    let outcome = f.pipeline.process(&job).await;

    assert_eq!(outcome, JobOutcome::Compensated);
    assert_eq!(f.scheduler.requeued(), vec![body]);
    assert!(f.store.contains(Namespace::Source, "d.wav"));
    assert!(!f.store.contains(Namespace::Reproduced, "d.wav"));
    assert!(f.work_dir.path().join("d.wav").exists());
}

/// Cleanup deletions are best-effort: a failing source delete does not
/// demote the completed outcome.
#[tokio::test]
async fn test_cleanup_delete_failure_still_completes() {
    let f = fixture(
        MemoryStore::new()
            .with_object("e.wav", wav_bytes())
            .failing_delete(),
        ScriptedHost::new(&[2], &[]),
        0,
    );
    let (job, body) = make_job("e.wav");

    let outcome = f.pipeline.process(&job).await;

    assert_eq!(outcome, JobOutcome::Completed);
    assert_eq!(f.sink.notified(), vec![body]);
    assert!(f.scheduler.requeued().is_empty());
    assert!(f.store.contains(Namespace::Reproduced, "e.wav"));
}

/// The one unrecoverable path: the compensating publish itself fails. The
/// outcome is still a terminal Compensated so the delivery gets acked.
#[tokio::test]
async fn test_requeue_publish_failure_still_terminal() {
    let work_dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new().failing_fetch());
    let host = Arc::new(ScriptedHost::new(&[2], &[]));
    let scheduler = Arc::new(RecordingScheduler::failing());
    let sink = Arc::new(RecordingSink::new());
    let pipeline = JobPipeline::new(
        Arc::clone(&store) as _,
        Arc::clone(&host) as _,
        DeviceSelector::new(0),
        Arc::clone(&scheduler) as _,
        Arc::clone(&sink) as _,
        work_dir.path().to_path_buf(),
    );
    let (job, _body) = make_job("f.wav");

    let outcome = pipeline.process(&job).await;

    assert_eq!(outcome, JobOutcome::Compensated);
    assert!(scheduler.requeued().is_empty());
}

/// A lost completion notification does not demote a completed job.
#[tokio::test]
async fn test_notify_failure_still_completed() {
    let work_dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new().with_object("g.wav", wav_bytes()));
    let host = Arc::new(ScriptedHost::new(&[2], &[]));
    let scheduler = Arc::new(RecordingScheduler::new());
    let sink = Arc::new(RecordingSink::failing());
    let pipeline = JobPipeline::new(
        Arc::clone(&store) as _,
        Arc::clone(&host) as _,
        DeviceSelector::new(0),
        Arc::clone(&scheduler) as _,
        Arc::clone(&sink) as _,
        work_dir.path().to_path_buf(),
    );
    let (job, _body) = make_job("g.wav");

    let outcome = pipeline.process(&job).await;

    assert_eq!(outcome, JobOutcome::Completed);
    assert!(scheduler.requeued().is_empty());
    assert!(!store.contains(Namespace::Source, "g.wav"));
}

/// Device fallback inside the full pipeline: reserved devices skipped,
/// failing devices passed over, playback lands on the first accepting one.
#[tokio::test]
async fn test_device_fallback_within_pipeline() {
    // Devices 0-1 reserved, 2 fails, 3 has no outputs, 4 accepts
    let f = fixture(
        MemoryStore::new().with_object("h.wav", wav_bytes()),
        ScriptedHost::new(&[2, 2, 2, 0, 2], &[2]),
        2,
    );
    let (job, _body) = make_job("h.wav");

    let outcome = f.pipeline.process(&job).await;

    assert_eq!(outcome, JobOutcome::Completed);
    assert_eq!(f.host.attempts(), vec![2, 4]);
}
