//! # Port I/O
//!
//! Raw access to the 16-bit I/O port space.
//!
//! Implementations perform the access and nothing else. Authority checks
//! (which task may touch which ports, and with which width) live in the
//! kernel, in front of this trait.

use core_types::IoWidth;

/// A device answering port reads and writes
///
/// An access of width `w` at `port` covers ports `port .. port + w.bytes()`.
/// Values are little-endian across that span; bits above the width are
/// ignored on write and zero on read.
pub trait PortIo: Send + Sync {
    /// Reads `width` bytes starting at `port`
    fn read(&self, port: u16, width: IoWidth) -> u32;

    /// Writes the low `width` bytes of `value` starting at `port`
    fn write(&self, port: u16, width: IoWidth, value: u32);
}
