//! Capability handles
//!
//! A handle names one entry of one capability table. It is an index plus the
//! generation the slot had when the entry was inserted; the kernel rejects a
//! handle whose generation no longer matches its slot, so a stale handle can
//! never reach an object that later reuses the slot.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A capability handle
///
/// Handles are only meaningful inside the table that issued them. They are
/// plain values: copying a handle does not copy authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Handle {
    index: u32,
    generation: u32,
}

impl Handle {
    /// The null handle; never valid in any table
    ///
    /// Slot generations start at 1, so generation 0 never matches.
    pub const NULL: Handle = Handle {
        index: 0,
        generation: 0,
    };

    /// Creates a handle from its parts
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index inside the issuing table
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Slot generation at insertion time
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// Checks whether this is the null handle
    pub const fn is_null(&self) -> bool {
        self.generation == 0
    }

    /// Packs the handle into a single machine word (generation in the high half)
    pub const fn raw(&self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    /// Unpacks a handle from a machine word
    pub const fn from_raw(raw: u64) -> Self {
        Self {
            index: raw as u32,
            generation: (raw >> 32) as u32,
        }
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}g{}", self.index, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_encoding() {
        let handle = Handle::new(5, 3);
        assert_eq!(handle.raw(), (3u64 << 32) | 5);
        assert_eq!(Handle::from_raw(handle.raw()), handle);
    }

    #[test]
    fn test_null_handle() {
        assert!(Handle::NULL.is_null());
        assert!(Handle::default().is_null());
        assert!(!Handle::new(0, 1).is_null());
    }

    #[test]
    fn test_display() {
        assert_eq!(Handle::new(2, 9).to_string(), "h2g9");
    }
}
