//! Channel behaviour knobs

use serde::{Deserialize, Serialize};
use std::fmt;

/// What `send` does when the mailbox is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChannelMode {
    /// Park the sender until space frees up or the channel closes
    #[default]
    Blocking,
    /// Fail immediately with `ResourceExhausted`
    NonBlocking,
}

impl ChannelMode {
    pub fn is_blocking(&self) -> bool {
        matches!(self, ChannelMode::Blocking)
    }
}

impl fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelMode::Blocking => write!(f, "blocking"),
            ChannelMode::NonBlocking => write!(f, "non-blocking"),
        }
    }
}
