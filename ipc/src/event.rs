//! Listener events

use core_types::{Handle, ObjectId, Signals};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A watched signal transition delivered to a listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// The target handle as named by the task that registered the watch
    pub handle: Handle,
    /// Kernel identity of the source object
    pub object: ObjectId,
    /// Signal state of the source right after the transition
    pub signals: Signals,
    /// Per-object transition counter; later snapshots carry larger values
    pub sequence: u64,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Event({} via {}: {:?} #{})",
            self.object, self.handle, self.signals, self.sequence
        )
    }
}
