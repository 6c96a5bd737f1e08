//! Rights and object kinds
//!
//! Rights are attached to capability table entries. Duplication and transfer
//! may narrow them but never widen them.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags! {
    /// Permission bitset carried by a capability table entry
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Rights: u32 {
        /// Create new objects inside a domain
        const CREATE    = 1 << 0;
        /// Copy the entry into a new entry
        const DUPLICATE = 1 << 1;
        /// Move the entry into a message
        const TRANSFER  = 1 << 2;
        /// Map into (space/task) or map from (memory object)
        const MAP       = 1 << 3;
        /// Start a constructed task
        const START     = 1 << 4;
        /// Receive, port input, readable mappings, listen
        const READ      = 1 << 5;
        /// Send, port output, writable mappings
        const WRITE     = 1 << 6;
        /// Mutate user signal bits
        const SIGNAL    = 1 << 7;
        /// Register or be the target of a watch
        const WATCH     = 1 << 8;
    }
}

impl Rights {
    /// Checks that `self` is a subset of `other`
    pub fn is_subset_of(&self, other: Rights) -> bool {
        other.contains(*self)
    }
}

/// The kind of a kernel object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Capability table and creation scope
    Domain,
    /// Executable context
    Task,
    /// Address space (page tables + reserved ranges)
    Space,
    /// Block of backing memory mappable into spaces
    Memory,
    /// Bounded mailbox
    Channel,
    /// Range of hardware I/O ports
    PortIo,
    /// Aggregation point for watched signal transitions
    Listener,
}

impl ObjectKind {
    /// All object kinds, in a stable order
    pub const ALL: [ObjectKind; 7] = [
        ObjectKind::Domain,
        ObjectKind::Task,
        ObjectKind::Space,
        ObjectKind::Memory,
        ObjectKind::Channel,
        ObjectKind::PortIo,
        ObjectKind::Listener,
    ];

    /// Maximal rights granted to the creator of an object of this kind
    pub fn default_rights(&self) -> Rights {
        let common = Rights::DUPLICATE | Rights::TRANSFER;
        match self {
            ObjectKind::Domain => common | Rights::CREATE | Rights::SIGNAL | Rights::WATCH,
            ObjectKind::Task => {
                common | Rights::START | Rights::MAP | Rights::SIGNAL | Rights::WATCH
            }
            ObjectKind::Space => common | Rights::MAP | Rights::SIGNAL | Rights::WATCH,
            ObjectKind::Memory => {
                common
                    | Rights::MAP
                    | Rights::READ
                    | Rights::WRITE
                    | Rights::SIGNAL
                    | Rights::WATCH
            }
            ObjectKind::Channel => {
                common | Rights::READ | Rights::WRITE | Rights::SIGNAL | Rights::WATCH
            }
            ObjectKind::PortIo => common | Rights::READ | Rights::WRITE,
            ObjectKind::Listener => common | Rights::READ | Rights::WATCH,
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::Domain => "domain",
            ObjectKind::Task => "task",
            ObjectKind::Space => "space",
            ObjectKind::Memory => "memory",
            ObjectKind::Channel => "channel",
            ObjectKind::PortIo => "port-io",
            ObjectKind::Listener => "listener",
        };
        f.write_str(name)
    }
}
