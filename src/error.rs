//! Error types for syrin-speak
//!
//! Defines module-specific error types using thiserror for clear error propagation.
//!
//! Stage-local errors (`Transfer`, `AssetNotFound`, `Decode`, `Device`,
//! `NoDeviceAvailable`) are recovered inside the job pipeline by routing to the
//! compensated terminal state. `Connection` is recovered by the consumer loop
//! via reconnect-with-backoff. `RequeuePublish` is the one unrecoverable case:
//! it is logged and the delivery is still acknowledged.

use thiserror::Error;

/// Main error type for syrin-speak
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Asset store unreachable or transfer denied
    #[error("Transfer error: {0}")]
    Transfer(String),

    /// Named asset does not exist in the store
    #[error("Asset not found: {0}")]
    AssetNotFound(String),

    /// Audio decoding errors
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Playback failed on a specific output device
    #[error("Audio device error: {0}")]
    Device(String),

    /// Every candidate output device was tried and none accepted playback
    #[error("No output device accepted playback")]
    NoDeviceAvailable,

    /// Broker connection or channel errors
    #[error("Broker connection error: {0}")]
    Connection(#[from] lapin::Error),

    /// The compensating requeue publish itself failed
    #[error("Requeue publish error: {0}")]
    RequeuePublish(String),

    /// Message body is not a usable job payload
    #[error("Malformed job payload: {0}")]
    Payload(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type using syrin-speak Error
pub type Result<T> = std::result::Result<T, Error>;
