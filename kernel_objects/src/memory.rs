//! Memory objects
//!
//! A memory object is a run of physical frames. Objects created at runtime
//! draw from the frame allocator and are charged to the domain they were
//! created under; boot files wrap physical ranges the loader already filled
//! and are never returned to the allocator.

use crate::kernel::Kernel;
use crate::object::{KernelObject, ObjectBody};
use core_types::page_align_up;
use kernel_api::KernelError;
use log::debug;
use std::sync::{Arc, PoisonError, Weak};

#[derive(Clone)]
pub(crate) enum MemoryOrigin {
    /// Frames from the allocator, charged to a domain
    Allocated { charged_to: Weak<KernelObject> },
    /// A physical range described by the handover payload
    Physical,
}

#[derive(Clone)]
pub(crate) struct MemoryState {
    /// Whole pages
    pub size: u64,
    pub phys: u64,
    pub origin: MemoryOrigin,
}

impl MemoryState {
    pub(crate) fn physical(phys: u64, size: u64) -> Self {
        Self {
            size: page_align_up(size),
            phys,
            origin: MemoryOrigin::Physical,
        }
    }
}

impl Kernel {
    /// Charges `scope` and allocates frames for a new memory object
    pub(crate) fn memory_body(
        &self,
        scope: &Arc<KernelObject>,
        size: u64,
    ) -> Result<ObjectBody, KernelError> {
        let rounded = page_align_up(size);
        if size == 0 || rounded < size {
            return Err(KernelError::InvalidArgument(format!(
                "memory size {:#x} not representable",
                size
            )));
        }

        {
            let mut state = scope.lock();
            if state.dead {
                return Err(KernelError::InvalidCapability(format!(
                    "domain {} destroyed",
                    scope.id()
                )));
            }
            match state.body.domain_mut() {
                Some(domain) => domain.charge(rounded)?,
                None => {
                    return Err(KernelError::InvalidArgument(format!(
                        "{} is not a domain",
                        scope.id()
                    )))
                }
            }
        }

        let phys = self
            .frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .allocate(rounded);
        let Some(phys) = phys else {
            if let Some(domain) = scope.lock().body.domain_mut() {
                domain.credit(rounded);
            }
            return Err(KernelError::ResourceExhausted(format!(
                "no {:#x} bytes of physical memory left",
                rounded
            )));
        };

        debug!("allocated {:#x} bytes at {:#x} for {}", rounded, phys, scope.id());
        Ok(ObjectBody::Memory(MemoryState {
            size: rounded,
            phys,
            origin: MemoryOrigin::Allocated {
                charged_to: Arc::downgrade(scope),
            },
        }))
    }

    /// Returns a dead memory object's frames and credits its domain
    pub(crate) fn reclaim(&self, memory: &MemoryState) {
        let MemoryOrigin::Allocated { charged_to } = &memory.origin else {
            return;
        };
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .release(memory.phys, memory.size);
        if let Some(domain) = charged_to.upgrade() {
            let mut state = domain.lock();
            if let Some(domain) = state.body.domain_mut() {
                domain.credit(memory.size);
            }
        }
        debug!("reclaimed {:#x} bytes at {:#x}", memory.size, memory.phys);
    }
}
