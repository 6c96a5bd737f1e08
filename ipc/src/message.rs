//! Message types

use core_types::{Handle, TaskId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors while converting typed values to and from payload bytes
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode payload: {0}")]
    Decode(#[source] serde_json::Error),
}

/// A message as handed to `send`
///
/// The payload is opaque to the kernel. The transferred capability, if any,
/// is passed separately to `send` because it names an entry in the sender's
/// table rather than data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    payload: Vec<u8>,
}

impl Message {
    /// Creates a message from raw payload bytes
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Creates an empty message (a pure notification or a capability carrier)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Serializes a typed value as the payload
    pub fn encode<T: Serialize>(value: &T) -> Result<Self, PayloadError> {
        let payload = serde_json::to_vec(value).map_err(PayloadError::Encode)?;
        Ok(Self { payload })
    }

    /// Deserializes the payload as a typed value
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, PayloadError> {
        serde_json::from_slice(&self.payload).map_err(PayloadError::Decode)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Self::new(text.as_bytes())
    }
}

/// A message as returned by `recv`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedMessage {
    pub message: Message,
    /// Task that sent the message, stamped by the kernel
    pub sender: TaskId,
    /// Fresh entry in the receiver's table for the transferred capability
    pub transferred: Option<Handle>,
}

impl ReceivedMessage {
    pub fn payload(&self) -> &[u8] {
        self.message.payload()
    }
}
