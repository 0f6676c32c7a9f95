//! Broker topology and AMQP-backed job routing
//!
//! Queue names are part of the wire contract shared with the producer side
//! and must not change. The retry queue carries a message TTL and
//! dead-letters expired messages back to the primary queue through the
//! default exchange, which is what turns a requeue into a delayed retry
//! without any timer in this process.

use crate::config::BrokerConfig;
use crate::error::{Error, Result};
use crate::job::Job;
use crate::pipeline::{CompletionSink, RetryScheduler};
use async_trait::async_trait;
use lapin::options::{ConfirmSelectOptions, QueueDeclareOptions};
use lapin::types::{AMQPValue, FieldTable};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tracing::{debug, info};

/// Primary job queue consumed by this service
pub const PLAY_QUEUE: &str = "03_syrin_notification_audio_process_play";

/// Delayed-retry queue; expired messages dead-letter back to `PLAY_QUEUE`
pub const RETRY_QUEUE: &str = "03_syrin_notification_audio_reprocess_play";

/// Completion-notification queue consumed downstream
pub const REPRODUCED_QUEUE: &str = "04_syrin_notification_audio_process_reproduced";

/// Connection name shown in the broker's management UI
const CONNECTION_NAME: &str = "Syrin Speak Audio Agent";

/// Open a connection and a channel with publisher confirms enabled.
pub async fn connect(config: &BrokerConfig) -> Result<(Connection, Channel)> {
    let uri = config.amqp_uri();
    let properties = ConnectionProperties::default().with_connection_name(CONNECTION_NAME.into());

    let connection = Connection::connect(&uri, properties).await?;
    let channel = connection.create_channel().await?;
    channel
        .confirm_select(ConfirmSelectOptions::default())
        .await?;

    info!("Connected to broker at {}:{}", config.host, config.port);
    Ok((connection, channel))
}

/// Declare the full queue topology.
///
/// Declaration is idempotent: redeclaring an existing queue with identical
/// parameters is a no-op on the broker.
pub async fn declare_topology(channel: &Channel, config: &BrokerConfig) -> Result<()> {
    let durable = QueueDeclareOptions {
        durable: true,
        ..QueueDeclareOptions::default()
    };

    channel
        .queue_declare(PLAY_QUEUE, durable, FieldTable::default())
        .await?;
    channel
        .queue_declare(REPRODUCED_QUEUE, durable, FieldTable::default())
        .await?;
    channel
        .queue_declare(RETRY_QUEUE, durable, retry_queue_arguments(config.retry_ttl_ms))
        .await?;

    debug!(
        "Declared queues '{}', '{}', '{}' (retry TTL {} ms)",
        PLAY_QUEUE, REPRODUCED_QUEUE, RETRY_QUEUE, config.retry_ttl_ms
    );
    Ok(())
}

/// Arguments binding the retry queue to the primary queue via TTL expiry
/// and default-exchange dead-letter forwarding.
fn retry_queue_arguments(ttl_ms: u32) -> FieldTable {
    let mut arguments = FieldTable::default();
    arguments.insert("x-message-ttl".into(), AMQPValue::LongInt(ttl_ms as i32));
    arguments.insert("x-dead-letter-exchange".into(), AMQPValue::LongString("".into()));
    arguments.insert(
        "x-dead-letter-routing-key".into(),
        AMQPValue::LongString(PLAY_QUEUE.into()),
    );
    arguments
}

/// Publish `payload` to `queue` with persistent delivery, waiting for the
/// broker's publisher confirm.
async fn publish_persistent(channel: &Channel, queue: &str, payload: &[u8]) -> Result<()> {
    channel
        .basic_publish(
            "",
            queue,
            lapin::options::BasicPublishOptions::default(),
            payload,
            BasicProperties::default().with_delivery_mode(2),
        )
        .await?
        .await?;
    Ok(())
}

/// Retry scheduler backend: delayed requeue through the TTL-bound retry
/// queue.
pub struct DelayedRequeue {
    channel: Channel,
}

impl DelayedRequeue {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl RetryScheduler for DelayedRequeue {
    async fn schedule_retry(&self, job: &Job) -> Result<()> {
        publish_persistent(&self.channel, RETRY_QUEUE, job.raw_payload())
            .await
            .map_err(|e| Error::RequeuePublish(e.to_string()))?;

        info!("Message sent to reprocessing queue: {}", job.filename);
        Ok(())
    }
}

/// Completion sink backend: publishes the original payload to the
/// notification queue.
pub struct ReproducedQueueSink {
    channel: Channel,
}

impl ReproducedQueueSink {
    pub fn new(channel: Channel) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl CompletionSink for ReproducedQueueSink {
    async fn notify_completed(&self, job: &Job) -> Result<()> {
        publish_persistent(&self.channel, REPRODUCED_QUEUE, job.raw_payload()).await?;
        info!("Completion published to queue {}: {}", REPRODUCED_QUEUE, job.filename);
        Ok(())
    }
}
