//! Capability tables
//!
//! An arena of slots with a free list. Each slot carries a generation that is
//! bumped whenever its entry is removed, and a handle only resolves while its
//! generation matches the slot's. A slot whose generation would wrap is
//! retired instead of being reused.

use crate::object::KernelObject;
use core_types::{CapabilityInvalidReason, Handle, Rights};
use std::sync::Arc;

/// One table entry: an object reference plus the rights held through it
#[derive(Clone)]
pub(crate) struct CapEntry {
    pub object: Arc<KernelObject>,
    pub rights: Rights,
}

struct Slot {
    generation: u32,
    entry: Option<CapEntry>,
}

/// The table is at capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TableFull;

pub(crate) struct CapTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
    capacity: usize,
    live: usize,
}

impl CapTable {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            capacity,
            live: 0,
        }
    }

    pub(crate) fn insert(&mut self, entry: CapEntry) -> Result<Handle, TableFull> {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                if self.slots.len() >= self.capacity {
                    return Err(TableFull);
                }
                self.slots.push(Slot {
                    generation: 1,
                    entry: None,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.entry = Some(entry);
        self.live += 1;
        Ok(Handle::new(index, slot.generation))
    }

    pub(crate) fn get(&self, handle: Handle) -> Result<&CapEntry, CapabilityInvalidReason> {
        let slot = self.slot(handle)?;
        slot.entry.as_ref().ok_or(CapabilityInvalidReason::Stale)
    }

    pub(crate) fn remove(&mut self, handle: Handle) -> Result<CapEntry, CapabilityInvalidReason> {
        self.slot(handle)?;
        let index = handle.index();
        let slot = &mut self.slots[index as usize];
        let entry = slot.entry.take().ok_or(CapabilityInvalidReason::Stale)?;
        self.live -= 1;
        if slot.generation == u32::MAX {
            // retired: this slot never resolves again
        } else {
            slot.generation += 1;
            self.free.push(index);
        }
        Ok(entry)
    }

    fn slot(&self, handle: Handle) -> Result<&Slot, CapabilityInvalidReason> {
        if handle.is_null() {
            return Err(CapabilityInvalidReason::NeverIssued);
        }
        let slot = self
            .slots
            .get(handle.index() as usize)
            .ok_or(CapabilityInvalidReason::NeverIssued)?;
        if handle.generation() == slot.generation {
            Ok(slot)
        } else if handle.generation() < slot.generation {
            Err(CapabilityInvalidReason::Stale)
        } else {
            Err(CapabilityInvalidReason::NeverIssued)
        }
    }

    /// Empties the table, handing back every entry
    pub(crate) fn drain(&mut self) -> Vec<CapEntry> {
        let mut entries = Vec::with_capacity(self.live);
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(entry) = slot.entry.take() {
                entries.push(entry);
                if slot.generation != u32::MAX {
                    slot.generation += 1;
                    self.free.push(index as u32);
                }
            }
        }
        self.live = 0;
        entries
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }

    /// Whether the next insert would fail
    pub(crate) fn is_full(&self) -> bool {
        self.free.is_empty() && self.slots.len() >= self.capacity
    }

    #[cfg(test)]
    fn force_generation(&mut self, index: u32, generation: u32) {
        self.slots[index as usize].generation = generation;
    }
}
