//! Job wire type
//!
//! A job names an audio asset to fetch, play, and archive. The original
//! message body is retained verbatim so that a compensating requeue and the
//! completion notification republish exactly the bytes that were delivered.

use crate::error::{Error, Result};
use serde_json::Value;

/// One unit of work: an audio asset to be played and archived.
#[derive(Debug, Clone)]
pub struct Job {
    /// Asset name, the key into the store's source namespace
    pub filename: String,
    /// Full original message body, republished unchanged on retry and
    /// on completion
    body: Vec<u8>,
}

impl Job {
    /// Parse a job from a delivered message body.
    ///
    /// # Errors
    /// Returns `Error::Payload` if the body is not a JSON object carrying a
    /// string `filename` field.
    pub fn from_payload(body: Vec<u8>) -> Result<Self> {
        let value: Value = serde_json::from_slice(&body)
            .map_err(|e| Error::Payload(e.to_string()))?;

        let filename = value
            .get("filename")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Payload("missing string field 'filename'".to_string()))?
            .to_string();

        if filename.is_empty() {
            return Err(Error::Payload("empty 'filename' field".to_string()));
        }

        Ok(Self { filename, body })
    }

    /// The original message body, byte-for-byte.
    pub fn raw_payload(&self) -> &[u8] {
        &self.body
    }
}
