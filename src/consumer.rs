//! Consumer loop
//!
//! Owns the broker connection lifecycle: connect, declare topology, consume
//! the primary queue one message at a time, and acknowledge each delivery
//! exactly once after the pipeline reaches a terminal state. Any
//! connection-level error tears the session down; the loop waits a fixed
//! backoff and rebuilds the connection and topology from scratch.

use crate::audio::{DeviceSelector, PlaybackHost};
use crate::broker::{self, DelayedRequeue, ReproducedQueueSink, PLAY_QUEUE};
use crate::config::Config;
use crate::error::Result;
use crate::job::Job;
use crate::pipeline::JobPipeline;
use crate::store::AssetStore;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicQosOptions};
use lapin::types::FieldTable;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Consumer tag identifying this service on the primary queue
const CONSUMER_TAG: &str = "syrin-speak";

/// Single-consumer receive/acknowledge loop with reconnect-on-error.
pub struct ConsumerLoop {
    config: Config,
    store: Arc<dyn AssetStore>,
    host: Arc<dyn PlaybackHost>,
}

impl ConsumerLoop {
    /// Build the loop around its injected collaborators. Nothing connects
    /// until `run` is called.
    pub fn new(config: Config, store: Arc<dyn AssetStore>, host: Arc<dyn PlaybackHost>) -> Self {
        Self {
            config,
            store,
            host,
        }
    }

    /// Consume forever. Transient connection loss never exits the process;
    /// each session failure is followed by a fixed backoff and a full
    /// rebuild of connection and topology.
    pub async fn run(&self) {
        loop {
            match self.run_session().await {
                Ok(()) => warn!("Consumer stream ended; reconnecting"),
                Err(e) => error!(
                    "Connection error: {}. Retrying in {:?}",
                    e, self.config.reconnect_delay
                ),
            }
            tokio::time::sleep(self.config.reconnect_delay).await;
        }
    }

    /// One connection's lifetime: connect, declare, consume until the
    /// stream ends or a broker operation fails.
    async fn run_session(&self) -> Result<()> {
        let (connection, channel) = broker::connect(&self.config.broker).await?;

        // One outstanding unacknowledged delivery at a time
        channel.basic_qos(1, BasicQosOptions::default()).await?;
        broker::declare_topology(&channel, &self.config.broker).await?;

        let pipeline = JobPipeline::new(
            Arc::clone(&self.store),
            Arc::clone(&self.host),
            DeviceSelector::new(self.config.playback.skip_devices),
            Arc::new(DelayedRequeue::new(channel.clone())),
            Arc::new(ReproducedQueueSink::new(channel.clone())),
            self.config.work_dir.clone(),
        );

        let mut consumer = channel
            .basic_consume(
                PLAY_QUEUE,
                CONSUMER_TAG,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!("Waiting for messages on '{}'", PLAY_QUEUE);

        while let Some(delivery) = consumer.next().await {
            let delivery = delivery?;
            self.handle_delivery(&pipeline, delivery).await?;
        }

        connection.close(200, "consumer stream ended").await?;
        Ok(())
    }

    /// Process one delivery and acknowledge it exactly once.
    ///
    /// Acknowledgement is decoupled from job success: it means the delivery
    /// has been fully handled, including any compensating requeue. A body
    /// that cannot become a `Job` is logged and dropped; requeueing it
    /// would cycle forever without ever reaching the pipeline.
    async fn handle_delivery(&self, pipeline: &JobPipeline, delivery: Delivery) -> Result<()> {
        match Job::from_payload(delivery.data.clone()) {
            Ok(job) => {
                info!(
                    "Message received from queue {}: File: {}",
                    PLAY_QUEUE, job.filename
                );
                let outcome = pipeline.process(&job).await;
                debug!("Job '{}' reached terminal state {:?}", job.filename, outcome);
            }
            Err(e) => {
                error!("Discarding undecodable delivery: {}", e);
            }
        }

        delivery.ack(BasicAckOptions::default()).await?;
        Ok(())
    }
}
