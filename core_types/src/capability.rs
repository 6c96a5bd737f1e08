//! Capability lifecycle events
//!
//! These events describe what happens to capability table entries. The
//! kernel records them in its audit trail so tests can assert on the exact
//! sequence of grants, transfers and drops.

use crate::{Handle, ObjectId, ObjectKind, Rights};
use serde::{Deserialize, Serialize};

/// Why a handle was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityInvalidReason {
    /// The index was never issued by this table
    NeverIssued,
    /// The slot was freed (and maybe reused) since the handle was issued
    Stale,
    /// The owning table has been torn down
    TableDestroyed,
}

/// A capability lifecycle event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityEvent {
    /// A new object was created and its first entry inserted
    Created {
        domain: ObjectId,
        handle: Handle,
        object: ObjectId,
        kind: ObjectKind,
    },
    /// An entry was copied with (possibly) narrowed rights
    Duplicated {
        from_domain: ObjectId,
        to_domain: ObjectId,
        source: Handle,
        handle: Handle,
        object: ObjectId,
        rights: Rights,
    },
    /// An entry left the sender's table inside a message
    TransferSent {
        domain: ObjectId,
        handle: Handle,
        object: ObjectId,
        channel: ObjectId,
    },
    /// A transferred entry landed in the receiver's table
    TransferReceived {
        domain: ObjectId,
        handle: Handle,
        object: ObjectId,
        channel: ObjectId,
    },
    /// An entry was removed from a table
    Dropped {
        domain: ObjectId,
        handle: Handle,
        object: ObjectId,
    },
    /// A handle failed validation
    InvalidUseAttempt {
        domain: ObjectId,
        handle: Handle,
        reason: CapabilityInvalidReason,
    },
    /// A rights check failed
    PermissionDenied {
        domain: ObjectId,
        handle: Handle,
        required: Rights,
        held: Rights,
    },
    /// The last reference went away and the object was torn down
    Destroyed { object: ObjectId, kind: ObjectKind },
}

impl CapabilityEvent {
    /// The object this event concerns, if any
    pub fn object(&self) -> Option<ObjectId> {
        match self {
            CapabilityEvent::Created { object, .. }
            | CapabilityEvent::Duplicated { object, .. }
            | CapabilityEvent::TransferSent { object, .. }
            | CapabilityEvent::TransferReceived { object, .. }
            | CapabilityEvent::Dropped { object, .. }
            | CapabilityEvent::Destroyed { object, .. } => Some(*object),
            CapabilityEvent::InvalidUseAttempt { .. } | CapabilityEvent::PermissionDenied { .. } => {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_object() {
        let object = ObjectId::from_raw(3);
        let event = CapabilityEvent::Destroyed {
            object,
            kind: ObjectKind::Channel,
        };
        assert_eq!(event.object(), Some(object));

        let rejected = CapabilityEvent::InvalidUseAttempt {
            domain: ObjectId::from_raw(1),
            handle: Handle::new(1, 1),
            reason: CapabilityInvalidReason::Stale,
        };
        assert_eq!(rejected.object(), None);
    }
}
