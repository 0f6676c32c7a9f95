//! Job pipeline
//!
//! Executes one job through four ordered stages (fetch the asset, play it,
//! archive it, clean up) and translates any failure into exactly one
//! compensating action: republishing the original payload through the retry
//! scheduler. The pipeline always reaches a terminal state; no stage error
//! escapes it.
//!
//! Compensation rules per failing stage:
//! - fetch failure leaves nothing behind to clean up;
//! - play failure deletes the local scratch copy but leaves the source
//!   object in the store untouched;
//! - archive failure deletes nothing: the source copy must survive until
//!   the archive copy is confirmed;
//! - cleanup deletions after a confirmed archive are best-effort and cannot
//!   demote the outcome.

use crate::audio::{decode_file, DeviceSelector, PlaybackHost};
use crate::error::Result;
use crate::job::Job;
use crate::store::{AssetStore, Namespace};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Hands a failed job's payload to the delayed-retry mechanism.
#[async_trait]
pub trait RetryScheduler: Send + Sync {
    /// Publish the original payload for redelivery after the retry delay.
    ///
    /// # Errors
    /// `Error::RequeuePublish` if the compensating publish itself failed.
    async fn schedule_retry(&self, job: &Job) -> Result<()>;
}

/// Receives the completion notification for a fully successful job.
#[async_trait]
pub trait CompletionSink: Send + Sync {
    /// Emit the original payload as a completion record.
    async fn notify_completed(&self, job: &Job) -> Result<()>;
}

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Fetching,
    Playing,
    Archiving,
    CleaningUp,
}

/// Terminal pipeline state for one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Full success path completed and a notification was emitted
    Completed,
    /// The job failed and responsibility was handed to the retry scheduler
    Compensated,
}

/// Orchestrates fetch → play → archive → cleanup for one job at a time.
pub struct JobPipeline {
    store: Arc<dyn AssetStore>,
    host: Arc<dyn PlaybackHost>,
    selector: DeviceSelector,
    scheduler: Arc<dyn RetryScheduler>,
    sink: Arc<dyn CompletionSink>,
    work_dir: PathBuf,
}

impl JobPipeline {
    pub fn new(
        store: Arc<dyn AssetStore>,
        host: Arc<dyn PlaybackHost>,
        selector: DeviceSelector,
        scheduler: Arc<dyn RetryScheduler>,
        sink: Arc<dyn CompletionSink>,
        work_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            host,
            selector,
            scheduler,
            sink,
            work_dir,
        }
    }

    /// Run one job to a terminal state.
    ///
    /// Never returns an error: every stage failure routes to `Compensated`
    /// and the compensating requeue is attempted before this returns, so the
    /// caller can acknowledge the delivery unconditionally afterwards.
    pub async fn process(&self, job: &Job) -> JobOutcome {
        match self.execute(job).await {
            Ok(()) => {
                info!("Job '{}' completed", job.filename);
                if let Err(e) = self.sink.notify_completed(job).await {
                    // The job itself succeeded; a lost notification does not
                    // demote the outcome
                    error!(
                        "Failed to publish completion notification for '{}': {}",
                        job.filename, e
                    );
                }
                JobOutcome::Completed
            }
            Err(e) => {
                warn!("Job '{}' failed: {}; scheduling retry", job.filename, e);
                if let Err(e) = self.scheduler.schedule_retry(job).await {
                    // The one unrecoverable path: the delivery will still be
                    // acknowledged and this job is dropped
                    error!("Requeue publish failed for '{}': {}", job.filename, e);
                }
                JobOutcome::Compensated
            }
        }
    }

    /// The success path. Any `Err` here means the caller compensates.
    async fn execute(&self, job: &Job) -> Result<()> {
        let scratch = self.work_dir.join(&job.filename);

        debug!(stage = ?Stage::Fetching, filename = %job.filename);
        let bytes = self.fetch_to_scratch(&job.filename, &scratch).await?;

        debug!(stage = ?Stage::Playing, filename = %job.filename);
        if let Err(e) = self.prepare_and_play(&scratch).await {
            // Local partial state only; the source object is untouched
            remove_scratch(&scratch);
            return Err(e);
        }

        debug!(stage = ?Stage::Archiving, filename = %job.filename);
        // On failure both the scratch file and the source object are
        // retained: nothing destructive happens without a confirmed archive
        self.store
            .put(Namespace::Reproduced, &job.filename, &bytes)
            .await?;

        debug!(stage = ?Stage::CleaningUp, filename = %job.filename);
        remove_scratch(&scratch);
        if let Err(e) = self.store.delete(Namespace::Source, &job.filename).await {
            warn!(
                "Failed to delete source object '{}' after archive: {}",
                job.filename, e
            );
        }

        Ok(())
    }

    /// Fetch the asset and materialize it at the scratch path.
    async fn fetch_to_scratch(&self, filename: &str, scratch: &Path) -> Result<Vec<u8>> {
        let bytes = self.store.fetch(filename).await?;

        if let Err(e) = std::fs::write(scratch, &bytes) {
            // A partially written scratch file is not assumed usable
            remove_scratch(scratch);
            return Err(e.into());
        }

        debug!(
            "Fetched '{}' ({} bytes) to {}",
            filename,
            bytes.len(),
            scratch.display()
        );
        Ok(bytes)
    }

    /// Decode the scratch artifact and play it on the first accepting device.
    async fn prepare_and_play(&self, scratch: &Path) -> Result<()> {
        let clip = decode_file(scratch)?;
        self.selector
            .play_on_first_available(self.host.as_ref(), &clip)
            .await
    }
}

/// Best-effort scratch file removal.
fn remove_scratch(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!("Removed scratch file {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove scratch file {}: {}", path.display(), e),
    }
}
