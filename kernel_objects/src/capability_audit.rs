//! Capability Audit Trail
//!
//! Records every capability lifecycle event the kernel performs so tests can
//! assert on security properties after the fact.
//!
//! ## Philosophy
//!
//! - Test-facing: this is not the kernel log, it is a verification aid
//! - Ordered: events are appended in the order the kernel committed them
//! - Bounded: once full, the oldest event makes room for the newest
//! - Queryable: tests filter by object or by predicate
//!
//! ## Example
//!
//! ```
//! use kernel_objects::capability_audit::CapabilityAuditLog;
//! use core_types::{CapabilityEvent, ObjectId, ObjectKind};
//! use kernel_api::Instant;
//!
//! let mut audit_log = CapabilityAuditLog::new();
//! audit_log.record_event(
//!     Instant::from_nanos(1000),
//!     CapabilityEvent::Destroyed {
//!         object: ObjectId::from_raw(4),
//!         kind: ObjectKind::Channel,
//!     },
//! );
//! assert_eq!(audit_log.get_events().len(), 1);
//! ```

use core_types::{CapabilityEvent, ObjectId};
use kernel_api::Instant;
use std::collections::VecDeque;

/// Events kept when no capacity is given
pub const DEFAULT_AUDIT_CAPACITY: usize = 4096;

/// A single audit event with timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityAuditEvent {
    /// Kernel time when the event was committed
    pub timestamp: Instant,
    pub event: CapabilityEvent,
}

/// Chronological record of the most recent capability events
#[derive(Debug, Clone)]
pub struct CapabilityAuditLog {
    events: VecDeque<CapabilityAuditEvent>,
    capacity: usize,
    /// Events pushed out by newer ones
    evicted: u64,
}

impl Default for CapabilityAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityAuditLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_AUDIT_CAPACITY)
    }

    /// A log holding at most `capacity` events (at least one)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity: capacity.max(1),
            evicted: 0,
        }
    }

    pub fn record_event(&mut self, timestamp: Instant, event: CapabilityEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
            self.evicted += 1;
        }
        self.events.push_back(CapabilityAuditEvent { timestamp, event });
    }

    pub fn get_events(&self) -> Vec<&CapabilityAuditEvent> {
        self.events.iter().collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// How many events were dropped to stay within capacity
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Events concerning one object
    pub fn get_events_for_object(&self, object: ObjectId) -> Vec<&CapabilityAuditEvent> {
        self.events
            .iter()
            .filter(|e| e.event.object() == Some(object))
            .collect()
    }

    pub fn count_events<F>(&self, predicate: F) -> usize
    where
        F: Fn(&CapabilityEvent) -> bool,
    {
        self.events.iter().filter(|e| predicate(&e.event)).count()
    }

    pub fn has_event<F>(&self, predicate: F) -> bool
    where
        F: Fn(&CapabilityEvent) -> bool,
    {
        self.events.iter().any(|e| predicate(&e.event))
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.evicted = 0;
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
