//! Creation parameters and other fixed-layout syscall arguments

use core_types::{Handle, ObjectKind, VirtRange};
use ipc::ChannelMode;
use serde::{Deserialize, Serialize};

/// What to create, and how
///
/// Each variant selects one object kind and carries the fields that kind
/// needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreateParams {
    /// A new capability table / creation scope
    Domain {
        /// Bytes of memory objects that may be charged to the domain
        quota: Option<u64>,
    },
    /// A task bound to an address space and a domain
    Task { space: Handle, domain: Handle },
    /// An empty address space
    Space,
    /// A block of backing memory; rounded up to whole pages
    Memory { size: u64 },
    /// A bounded mailbox
    Channel { depth: usize, mode: ChannelMode },
    /// A range of hardware I/O ports
    PortIo { base: u16, len: u16 },
    /// An event aggregation point
    Listener,
}

impl CreateParams {
    /// The kind of object these parameters create
    pub fn kind(&self) -> ObjectKind {
        match self {
            CreateParams::Domain { .. } => ObjectKind::Domain,
            CreateParams::Task { .. } => ObjectKind::Task,
            CreateParams::Space => ObjectKind::Space,
            CreateParams::Memory { .. } => ObjectKind::Memory,
            CreateParams::Channel { .. } => ObjectKind::Channel,
            CreateParams::PortIo { .. } => ObjectKind::PortIo,
            CreateParams::Listener => ObjectKind::Listener,
        }
    }

    /// A blocking channel of the given depth
    pub fn channel(depth: usize) -> Self {
        CreateParams::Channel {
            depth,
            mode: ChannelMode::Blocking,
        }
    }

    /// A memory object of the given size
    pub fn memory(size: u64) -> Self {
        CreateParams::Memory { size }
    }
}

/// Initial argument registers handed to a started task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskArgs(pub [u64; 4]);

impl TaskArgs {
    pub fn new(a0: u64, a1: u64, a2: u64, a3: u64) -> Self {
        Self([a0, a1, a2, a3])
    }
}

/// Result of a successful `map`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    /// Chosen (or requested) virtual address
    pub virt: u64,
    /// Mapped length after rounding and clipping to the object size
    pub len: u64,
}

impl Mapping {
    pub fn range(&self) -> VirtRange {
        VirtRange::new(self.virt, self.len)
    }
}
