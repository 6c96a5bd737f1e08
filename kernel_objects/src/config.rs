//! Kernel configuration
//!
//! Limits the kernel enforces on every caller. Loaded once at boot.

use core_types::{is_page_aligned, PAGE_SIZE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),

    #[error("User range [{base:#x}..{end:#x}) is empty")]
    EmptyUserRange { base: u64, end: u64 },

    #[error("User range bound {0:#x} is not page aligned")]
    UnalignedUserRange(u64),
}

/// Kernel-wide limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelConfig {
    /// Entries per capability table
    pub max_handles: usize,
    /// Largest depth a channel may be created with
    pub max_channel_depth: usize,
    /// Largest message payload in bytes
    pub max_payload: usize,
    /// Longest object label in bytes
    pub max_label_len: usize,
    /// Longest `log` line in bytes
    pub max_log_len: usize,
    /// Capability audit events retained before the oldest are dropped
    pub max_audit_events: usize,
    /// Lowest user virtual address
    pub user_base: u64,
    /// End (exclusive) of the user virtual range
    pub user_end: u64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_handles: 256,
            max_channel_depth: 1024,
            max_payload: 4096,
            max_label_len: 64,
            max_log_len: 256,
            max_audit_events: 4096,
            user_base: PAGE_SIZE,
            user_end: 0x0000_8000_0000_0000,
        }
    }
}

impl KernelConfig {
    pub fn with_max_handles(mut self, max_handles: usize) -> Self {
        self.max_handles = max_handles;
        self
    }

    pub fn with_max_channel_depth(mut self, depth: usize) -> Self {
        self.max_channel_depth = depth;
        self
    }

    pub fn with_max_payload(mut self, bytes: usize) -> Self {
        self.max_payload = bytes;
        self
    }

    pub fn with_max_label_len(mut self, len: usize) -> Self {
        self.max_label_len = len;
        self
    }

    pub fn with_max_log_len(mut self, len: usize) -> Self {
        self.max_log_len = len;
        self
    }

    pub fn with_max_audit_events(mut self, events: usize) -> Self {
        self.max_audit_events = events;
        self
    }

    pub fn with_user_range(mut self, base: u64, end: u64) -> Self {
        self.user_base = base;
        self.user_end = end;
        self
    }

    /// Checks that every limit is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_handles == 0 {
            return Err(ConfigError::ZeroLimit("max_handles"));
        }
        if self.max_channel_depth == 0 {
            return Err(ConfigError::ZeroLimit("max_channel_depth"));
        }
        if self.max_payload == 0 {
            return Err(ConfigError::ZeroLimit("max_payload"));
        }
        if self.max_label_len == 0 {
            return Err(ConfigError::ZeroLimit("max_label_len"));
        }
        if self.max_log_len == 0 {
            return Err(ConfigError::ZeroLimit("max_log_len"));
        }
        if self.max_audit_events == 0 {
            return Err(ConfigError::ZeroLimit("max_audit_events"));
        }
        for bound in [self.user_base, self.user_end] {
            if !is_page_aligned(bound) {
                return Err(ConfigError::UnalignedUserRange(bound));
            }
        }
        if self.user_end <= self.user_base {
            return Err(ConfigError::EmptyUserRange {
                base: self.user_base,
                end: self.user_end,
            });
        }
        Ok(())
    }
}
