//! Kernel error types

use core_types::MemoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by syscalls
///
/// Every syscall either commits fully or fails with one of these and leaves
/// no partial state behind.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KernelError {
    /// Unknown handle or generation mismatch
    #[error("Invalid capability: {0}")]
    InvalidCapability(String),

    /// Rights check failed (including rights escalation on duplicate)
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Malformed parameters, flags or ranges, or wrong object kind
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Table full, backing memory unavailable, or mailbox full in non-blocking mode
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The object is already in the requested state or the range is taken
    #[error("Already in use: {0}")]
    AlreadyInUse(String),

    /// Operation on an endpoint that has been shut down
    #[error("Endpoint closed")]
    Closed,

    /// The endpoint was shut down while the caller was waiting on it
    #[error("Peer closed the endpoint")]
    PeerClosed,

    /// The deadline elapsed with nothing to report
    #[error("Operation timed out")]
    Timeout,
}

impl KernelError {
    /// Discriminant used on the syscall boundary
    pub fn kind(&self) -> ErrorKind {
        match self {
            KernelError::InvalidCapability(_) => ErrorKind::InvalidCapability,
            KernelError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            KernelError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            KernelError::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            KernelError::AlreadyInUse(_) => ErrorKind::AlreadyInUse,
            KernelError::Closed => ErrorKind::Closed,
            KernelError::PeerClosed => ErrorKind::PeerClosed,
            KernelError::Timeout => ErrorKind::Timeout,
        }
    }

    /// The diagnostic string, if the variant carries one
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            KernelError::InvalidCapability(msg)
            | KernelError::PermissionDenied(msg)
            | KernelError::InvalidArgument(msg)
            | KernelError::ResourceExhausted(msg)
            | KernelError::AlreadyInUse(msg) => Some(msg),
            KernelError::Closed | KernelError::PeerClosed | KernelError::Timeout => None,
        }
    }

    /// Rebuilds an error from its boundary representation
    pub fn from_parts(kind: ErrorKind, diagnostic: Option<String>) -> Self {
        let msg = diagnostic.unwrap_or_default();
        match kind {
            ErrorKind::InvalidCapability => KernelError::InvalidCapability(msg),
            ErrorKind::PermissionDenied => KernelError::PermissionDenied(msg),
            ErrorKind::InvalidArgument => KernelError::InvalidArgument(msg),
            ErrorKind::ResourceExhausted => KernelError::ResourceExhausted(msg),
            ErrorKind::AlreadyInUse => KernelError::AlreadyInUse(msg),
            ErrorKind::Closed => KernelError::Closed,
            ErrorKind::PeerClosed => KernelError::PeerClosed,
            ErrorKind::Timeout => KernelError::Timeout,
        }
    }
}

impl From<MemoryError> for KernelError {
    fn from(err: MemoryError) -> Self {
        match err {
            MemoryError::Overlap(_) => KernelError::AlreadyInUse(err.to_string()),
            MemoryError::NoSpace(_) => KernelError::ResourceExhausted(err.to_string()),
            _ => KernelError::InvalidArgument(err.to_string()),
        }
    }
}

/// Fixed numeric error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ErrorKind {
    InvalidCapability = 1,
    PermissionDenied = 2,
    InvalidArgument = 3,
    ResourceExhausted = 4,
    AlreadyInUse = 5,
    Closed = 6,
    PeerClosed = 7,
    Timeout = 8,
}

impl ErrorKind {
    pub const fn code(&self) -> u32 {
        *self as u32
    }

    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            1 => Some(ErrorKind::InvalidCapability),
            2 => Some(ErrorKind::PermissionDenied),
            3 => Some(ErrorKind::InvalidArgument),
            4 => Some(ErrorKind::ResourceExhausted),
            5 => Some(ErrorKind::AlreadyInUse),
            6 => Some(ErrorKind::Closed),
            7 => Some(ErrorKind::PeerClosed),
            8 => Some(ErrorKind::Timeout),
            _ => None,
        }
    }
}
