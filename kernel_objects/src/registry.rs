//! Live-object registry
//!
//! Hands out object ids from the creation sequence and keeps count of every
//! live object per kind. Registration and release must pair up exactly; a
//! mismatch means the kernel's own bookkeeping is corrupt.

use core_types::{ObjectId, ObjectKind};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

#[derive(Debug)]
pub(crate) struct ObjectRegistry {
    next_id: AtomicU64,
    live: Mutex<HashMap<ObjectId, ObjectKind>>,
}

impl ObjectRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            live: Mutex::new(HashMap::new()),
        }
    }

    /// Allocates the next id in creation order and records the object as live
    pub(crate) fn register(&self, kind: ObjectKind) -> ObjectId {
        let id = ObjectId::from_raw(self.next_id.fetch_add(1, Ordering::SeqCst));
        let previous = self
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, kind);
        if previous.is_some() {
            panic!("object registry corrupted: {} registered twice", id);
        }
        id
    }

    /// Removes a live object
    ///
    /// # Panics
    ///
    /// Panics if `id` is not live or was registered with another kind.
    pub(crate) fn release(&self, id: ObjectId, kind: ObjectKind) {
        let removed = self
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        match removed {
            Some(registered) if registered == kind => {}
            Some(registered) => panic!(
                "object registry corrupted: {} released as {} but registered as {}",
                id, kind, registered
            ),
            None => panic!("object registry corrupted: double release of {}", id),
        }
    }

    pub(crate) fn live_count(&self, kind: ObjectKind) -> usize {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|k| **k == kind)
            .count()
    }

    pub(crate) fn total(&self) -> usize {
        self.live.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
