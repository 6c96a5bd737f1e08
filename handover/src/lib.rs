//! # Boot Hand-off
//!
//! The loader describes the machine to the kernel with a single payload: an
//! ordered list of tagged physical regions (free memory, the kernel image,
//! loaded files, firmware tables, the framebuffer...). The kernel reads it
//! once at boot to seed its frame allocator and find preloaded files, and
//! never again.
//!
//! - [`Tag`]: what a region is
//! - [`Record`]: one tagged region
//! - [`Payload`]: the full description plus the queries the kernel needs
//! - [`PayloadBuilder`]: loader-side construction (sorting, merging, carving)
//! - [`Request`]: what a kernel image asks the loader to provide

pub mod builder;
pub mod payload;
pub mod record;
pub mod request;

pub use builder::PayloadBuilder;
pub use payload::Payload;
pub use record::{PhysRange, PixelFormat, Record, Tag};
pub use request::Request;

use thiserror::Error;

/// Magic value identifying a hand-off payload
pub const COOLBOOT: u32 = 0xc001_b001;

/// Base of the kernel's higher-half image mapping
pub const KERNEL_BASE: u64 = 0xffff_ffff_8000_0000;

/// Start of the upper half of the address space
pub const UPPER_HALF: u64 = 0xffff_8000_0000_0000;

/// Errors while building or consuming a payload
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandoverError {
    #[error("Payload magic {0:#x} is not COOLBOOT")]
    BadMagic(u32),

    #[error("{tag} record [{start:#x}..{end:#x}) overlaps an existing {existing} record")]
    Overlap {
        tag: Tag,
        existing: Tag,
        start: u64,
        end: u64,
    },

    #[error("Record at {start:#x} with size {size:#x} wraps the address space")]
    Wraps { start: u64, size: u64 },

    #[error("FILE record without a name")]
    UnnamedFile,
}
