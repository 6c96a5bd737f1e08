//! # Memory Types
//!
//! Page arithmetic, virtual ranges and mapping flags shared by the address
//! space manager and the syscall surface.
//!
//! ## Philosophy
//!
//! - **Memory is authority, not a side effect**: mapping needs a capability
//!   on both the space and the memory object
//! - **Reserved ranges never overlap**
//! - **Everything is page granular**

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Size of a page in bytes
pub const PAGE_SIZE: u64 = 4096;

/// Rounds `value` down to a page boundary
pub const fn page_align_down(value: u64) -> u64 {
    value & !(PAGE_SIZE - 1)
}

/// Rounds `value` up to a page boundary, saturating at the last page
pub const fn page_align_up(value: u64) -> u64 {
    match value.checked_add(PAGE_SIZE - 1) {
        Some(v) => page_align_down(v),
        None => page_align_down(u64::MAX),
    }
}

/// Checks whether `value` is a multiple of the page size
pub const fn is_page_aligned(value: u64) -> bool {
    value & (PAGE_SIZE - 1) == 0
}

bitflags! {
    /// Flags for `map`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct MapFlags: u32 {
        const READ    = 1 << 0;
        const WRITE   = 1 << 1;
        const EXEC    = 1 << 2;
        /// Fixed placement may replace whatever is mapped there
        const REPLACE = 1 << 8;

        const PROTECTION = Self::READ.bits() | Self::WRITE.bits() | Self::EXEC.bits();
    }
}

impl MapFlags {
    /// Protection bits only
    pub fn protection(&self) -> MapFlags {
        self.intersection(MapFlags::PROTECTION)
    }
}

impl fmt::Display for MapFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            if self.contains(MapFlags::READ) { "R" } else { "-" },
            if self.contains(MapFlags::WRITE) { "W" } else { "-" },
            if self.contains(MapFlags::EXEC) { "X" } else { "-" }
        )
    }
}

/// A half-open virtual range `[start, start + len)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VirtRange {
    pub start: u64,
    pub len: u64,
}

impl VirtRange {
    pub const fn new(start: u64, len: u64) -> Self {
        Self { start, len }
    }

    /// Exclusive end address, saturating at the top of the address space
    pub const fn end(&self) -> u64 {
        self.start.saturating_add(self.len)
    }

    /// Whether `start + len` fits in the address space
    pub const fn is_representable(&self) -> bool {
        self.start.checked_add(self.len).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end()
    }

    pub fn overlaps(&self, other: &VirtRange) -> bool {
        self.start < other.end() && other.start < self.end()
    }

    /// Checks whether `other` lies entirely inside `self`
    pub fn covers(&self, other: &VirtRange) -> bool {
        other.start >= self.start && other.end() <= self.end()
    }
}

impl fmt::Display for VirtRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.start.checked_add(self.len) {
            Some(end) => write!(f, "[{:#x}..{:#x})", self.start, end),
            None => write!(f, "[{:#x}+{:#x})", self.start, self.len),
        }
    }
}

/// Errors produced by address-space bookkeeping
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MemoryError {
    #[error("Address or offset {0:#x} is not page aligned")]
    Unaligned(u64),

    #[error("Range {0} lies outside the user address range")]
    OutOfRange(VirtRange),

    #[error("Range {0} overlaps an existing mapping")]
    Overlap(VirtRange),

    #[error("Range {0} is not fully covered by existing mappings")]
    NotMapped(VirtRange),

    #[error("No free virtual range of {0:#x} bytes")]
    NoSpace(u64),

    #[error("Offset {offset:#x} is beyond the object size {size:#x}")]
    OffsetBeyondObject { offset: u64, size: u64 },

    #[error("Mapping must be readable, writable or executable")]
    NoProtection,
}
