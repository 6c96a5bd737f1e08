//! # Core Types
//!
//! This crate defines the vocabulary shared by every layer of the kernel
//! object system.
//!
//! ## Philosophy
//!
//! - **Handles, not pointers**: user code only ever sees small table indices.
//! - **Authority lives on the entry**: rights belong to a capability table
//!   entry, never to the object itself.
//! - **Flags are typed**: rights, signals and mapping flags are distinct
//!   bitsets and cannot be confused.
//!
//! ## Key Types
//!
//! - [`Handle`]: index + generation into one capability table
//! - [`ObjectId`]: kernel-global identity of an object (creation sequence)
//! - [`TaskId`]: identity of an executable context
//! - [`Rights`]: permission bitset attached to a table entry
//! - [`Signals`]: per-object readiness/condition bitset
//! - [`MapFlags`]: address-space mapping flags

pub mod capability;
pub mod handle;
pub mod ids;
pub mod io;
pub mod memory;
pub mod rights;
pub mod signals;

pub use capability::{CapabilityEvent, CapabilityInvalidReason};
pub use handle::Handle;
pub use ids::{ObjectId, TaskId};
pub use io::IoWidth;
pub use memory::{
    is_page_aligned, page_align_down, page_align_up, MapFlags, MemoryError, VirtRange, PAGE_SIZE,
};
pub use rights::{ObjectKind, Rights};
pub use signals::Signals;
