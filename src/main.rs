//! Syrin Speak Audio Agent - Main entry point
//!
//! Builds the injected collaborators (object store, playback host) from
//! configuration and runs the consumer loop until the process is signalled.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use syrin_speak::audio::CpalHost;
use syrin_speak::config::{BrokerConfig, Config, PlaybackConfig, StoreConfig};
use syrin_speak::consumer::ConsumerLoop;
use syrin_speak::store::S3AssetStore;

/// Wait between reconnect attempts after a connection-level error
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Command-line arguments for syrin-speak
#[derive(Parser, Debug)]
#[command(name = "syrin-speak")]
#[command(about = "Audio playback worker for Syrin notifications")]
#[command(version)]
struct Args {
    /// RabbitMQ host
    #[arg(long, default_value = "127.0.0.1", env = "RABBITMQ_HOST")]
    rabbitmq_host: String,

    /// RabbitMQ port
    #[arg(long, default_value = "5672", env = "RABBITMQ_PORT")]
    rabbitmq_port: u16,

    /// RabbitMQ virtual host
    #[arg(long, default_value = "", env = "RABBITMQ_VHOST")]
    rabbitmq_vhost: String,

    /// RabbitMQ username
    #[arg(long, default_value = "", env = "RABBITMQ_USER")]
    rabbitmq_user: String,

    /// RabbitMQ password
    #[arg(long, default_value = "", env = "RABBITMQ_PASS")]
    rabbitmq_pass: String,

    /// Retry-queue message TTL in milliseconds
    #[arg(long, default_value = "60000", env = "RABBITMQ_TTL_DLX")]
    rabbitmq_ttl_dlx: u32,

    /// MinIO host
    #[arg(long, default_value = "127.0.0.1", env = "MINIO_URL")]
    minio_url: String,

    /// MinIO port
    #[arg(long, default_value = "9000", env = "MINIO_PORT")]
    minio_port: u16,

    /// MinIO access key
    #[arg(long, default_value = "", env = "MINIO_ROOT_USER")]
    minio_root_user: String,

    /// MinIO secret key
    #[arg(long, default_value = "", env = "MINIO_ROOT_PASSWORD")]
    minio_root_password: String,

    /// Work bucket holding source and reproduced assets
    #[arg(long, default_value = "syrin", env = "MINIO_BUCKET_WORK")]
    minio_bucket_work: String,

    /// Number of low-index output devices to skip without a playback attempt
    #[arg(long, default_value = "6", env = "AUDIO_SKIP_DEVICES")]
    skip_devices: usize,

    /// Scratch directory for fetched artifacts
    #[arg(long, default_value = "/tmp", env = "SYRIN_WORK_DIR")]
    work_dir: PathBuf,
}

impl Args {
    fn into_config(self) -> Config {
        Config {
            broker: BrokerConfig {
                host: self.rabbitmq_host,
                port: self.rabbitmq_port,
                vhost: self.rabbitmq_vhost,
                username: self.rabbitmq_user,
                password: self.rabbitmq_pass,
                retry_ttl_ms: self.rabbitmq_ttl_dlx,
            },
            store: StoreConfig {
                host: self.minio_url,
                port: self.minio_port,
                access_key: self.minio_root_user,
                secret_key: self.minio_root_password,
                bucket: self.minio_bucket_work,
            },
            playback: PlaybackConfig {
                skip_devices: self.skip_devices,
            },
            work_dir: self.work_dir,
            reconnect_delay: RECONNECT_DELAY,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing; broker-client chatter is demoted by default
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "syrin_speak=info,lapin=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Args::parse().into_config();

    info!("Syrin Speak Audio - started \\o/");

    let store = Arc::new(
        S3AssetStore::new(&config.store).context("Failed to initialize asset store client")?,
    );
    let host = Arc::new(CpalHost::new());

    let consumer = ConsumerLoop::new(config, store, host);

    tokio::select! {
        _ = consumer.run() => {},
        _ = shutdown_signal() => {
            info!("Shutdown complete");
        }
    }

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
