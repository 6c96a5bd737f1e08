//! Port I/O capabilities
//!
//! A port-I/O object grants access to a contiguous range of the 16-bit port
//! space. The kernel checks the range and the rights, then forwards the
//! access to the [`PortIo`] device it was booted with.

use crate::kernel::{Kernel, TaskContext};
use core_types::{Handle, IoWidth, ObjectKind, Rights};
use hal::PortIo;
use kernel_api::KernelError;
use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Size of the port space
const PORT_SPACE: u32 = 0x1_0000;

/// Ports `base .. base + len`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PortRange {
    pub base: u16,
    pub len: u16,
}

impl PortRange {
    pub(crate) fn new(base: u16, len: u16) -> Result<Self, KernelError> {
        if len == 0 || base as u32 + len as u32 > PORT_SPACE {
            return Err(KernelError::InvalidArgument(format!(
                "port range {:#x}+{:#x} is empty or wraps",
                base, len
            )));
        }
        Ok(Self { base, len })
    }

    /// Whether an access of `width` at `port` stays inside the range
    pub(crate) fn covers(&self, port: u16, width: IoWidth) -> bool {
        let start = port as u32;
        start >= self.base as u32
            && start + width.bytes() as u32 <= self.base as u32 + self.len as u32
    }
}

/// One access seen by [`SimPortBus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortAccess {
    Read { port: u16, width: IoWidth, value: u32 },
    Write { port: u16, width: IoWidth, value: u32 },
}

#[derive(Default)]
struct Bus {
    bytes: HashMap<u16, u8>,
    accesses: Vec<PortAccess>,
}

/// In-memory port space for running the kernel on a host
///
/// Every port holds one byte (zero until written). Clones share state, so a
/// test can keep one handle while the kernel owns another.
#[derive(Clone, Default)]
pub struct SimPortBus {
    inner: Arc<Mutex<Bus>>,
}

impl SimPortBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a port's byte without recording an access
    pub fn poke(&self, port: u16, value: u8) {
        self.bus().bytes.insert(port, value);
    }

    pub fn peek(&self, port: u16) -> u8 {
        self.bus().bytes.get(&port).copied().unwrap_or(0)
    }

    pub fn accesses(&self) -> Vec<PortAccess> {
        self.bus().accesses.clone()
    }

    fn bus(&self) -> std::sync::MutexGuard<'_, Bus> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PortIo for SimPortBus {
    fn read(&self, port: u16, width: IoWidth) -> u32 {
        let mut bus = self.bus();
        let mut value = 0u32;
        for i in 0..width.bytes() {
            let byte = bus.bytes.get(&port.wrapping_add(i)).copied().unwrap_or(0);
            value |= (byte as u32) << (8 * i);
        }
        bus.accesses.push(PortAccess::Read { port, width, value });
        value
    }

    fn write(&self, port: u16, width: IoWidth, value: u32) {
        let mut bus = self.bus();
        let value = value & width.mask();
        for i in 0..width.bytes() {
            bus.bytes
                .insert(port.wrapping_add(i), (value >> (8 * i)) as u8);
        }
        bus.accesses.push(PortAccess::Write { port, width, value });
    }
}

impl Kernel {
    fn port_range(
        &self,
        ctx: &TaskContext,
        handle: Handle,
        required: Rights,
        port: u16,
        width: IoWidth,
    ) -> Result<(), KernelError> {
        let entry = self.lookup(ctx, handle, Some(ObjectKind::PortIo), required)?;
        let range = {
            let state = entry.object.lock();
            state
                .body
                .port_range()
                .filter(|_| !state.dead)
                .ok_or_else(|| KernelError::InvalidCapability(format!("{} destroyed", handle)))?
        };
        if !range.covers(port, width) {
            return Err(KernelError::InvalidArgument(format!(
                "{:?} access at {:#x} outside {:#x}+{:#x}",
                width, port, range.base, range.len
            )));
        }
        Ok(())
    }

    pub(crate) fn sys_port_in(
        &self,
        ctx: &TaskContext,
        handle: Handle,
        width: IoWidth,
        port: u16,
    ) -> Result<u32, KernelError> {
        self.port_range(ctx, handle, Rights::READ, port, width)?;
        let value = self.ports.read(port, width) & width.mask();
        trace!("{} in {:#x} -> {:#x}", ctx.task_id(), port, value);
        Ok(value)
    }

    pub(crate) fn sys_port_out(
        &self,
        ctx: &TaskContext,
        handle: Handle,
        width: IoWidth,
        port: u16,
        value: u32,
    ) -> Result<(), KernelError> {
        self.port_range(ctx, handle, Rights::WRITE, port, width)?;
        self.ports.write(port, width, value & width.mask());
        trace!("{} out {:#x} <- {:#x}", ctx.task_id(), port, value);
        Ok(())
    }
}
