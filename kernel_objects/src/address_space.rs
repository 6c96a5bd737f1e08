//! Address spaces
//!
//! A space is the set of reserved ranges of one virtual address space, kept
//! as page-granular mappings keyed by start address. Each mapping holds a
//! reference on the memory object behind it.

use crate::kernel::{Kernel, TaskContext};
use crate::object::{KernelObject, Wakeups};
use core_types::{
    is_page_aligned, page_align_up, Handle, MapFlags, MemoryError, ObjectKind, Rights, VirtRange,
};
use kernel_api::{KernelError, Mapping};
use log::debug;
use std::collections::BTreeMap;
use std::sync::Arc;

pub(crate) struct MappingRecord {
    pub len: u64,
    pub memory: Arc<KernelObject>,
    /// Offset into the memory object
    pub offset: u64,
    pub flags: MapFlags,
}

#[derive(Default)]
pub(crate) struct SpaceState {
    mappings: BTreeMap<u64, MappingRecord>,
}

impl SpaceState {
    pub(crate) fn reserved(&self) -> Vec<VirtRange> {
        self.mappings
            .iter()
            .map(|(start, m)| VirtRange::new(*start, m.len))
            .collect()
    }

    /// The mapping containing `addr`
    pub(crate) fn find(&self, addr: u64) -> Option<(VirtRange, MapFlags)> {
        let (start, m) = self.mappings.range(..=addr).next_back()?;
        let range = VirtRange::new(*start, m.len);
        range.contains(addr).then_some((range, m.flags))
    }

    pub(crate) fn overlaps(&self, range: VirtRange) -> bool {
        self.mappings
            .range(..range.end())
            .any(|(start, m)| VirtRange::new(*start, m.len).overlaps(&range))
    }

    /// Whether every page of `range` is mapped
    pub(crate) fn covers(&self, range: VirtRange) -> bool {
        let mut cursor = range.start;
        while cursor < range.end() {
            match self.find(cursor) {
                Some((mapped, _)) => cursor = mapped.end(),
                None => return false,
            }
        }
        true
    }

    /// Lowest address in `[base, end)` with `len` free bytes
    pub(crate) fn find_free(&self, len: u64, base: u64, end: u64) -> Result<u64, MemoryError> {
        let mut cursor = base;
        for (start, m) in &self.mappings {
            let fits = cursor
                .checked_add(len)
                .map(|stop| stop <= *start)
                .unwrap_or(false);
            if fits {
                break;
            }
            cursor = cursor.max(start + m.len);
        }
        match cursor.checked_add(len) {
            Some(stop) if stop <= end => Ok(cursor),
            _ => Err(MemoryError::NoSpace(len)),
        }
    }

    pub(crate) fn insert(&mut self, start: u64, record: MappingRecord) {
        self.mappings.insert(start, record);
    }

    /// Removes `range` from every mapping it touches
    ///
    /// Mappings straddling an edge are split; each surviving piece keeps a
    /// reference on the memory object. Returns the references to drop.
    pub(crate) fn carve(&mut self, range: VirtRange) -> Vec<Arc<KernelObject>> {
        let affected: Vec<u64> = self
            .mappings
            .range(..range.end())
            .filter(|(start, m)| *start + m.len > range.start)
            .map(|(start, _)| *start)
            .collect();

        let mut released = Vec::new();
        for start in affected {
            let Some(m) = self.mappings.remove(&start) else {
                continue;
            };
            let end = start + m.len;
            let mut pieces = 0;
            if start < range.start {
                self.mappings.insert(
                    start,
                    MappingRecord {
                        len: range.start - start,
                        memory: m.memory.clone(),
                        offset: m.offset,
                        flags: m.flags,
                    },
                );
                pieces += 1;
            }
            if end > range.end() {
                self.mappings.insert(
                    range.end(),
                    MappingRecord {
                        len: end - range.end(),
                        memory: m.memory.clone(),
                        offset: m.offset + (range.end() - start),
                        flags: m.flags,
                    },
                );
                pieces += 1;
            }
            match pieces {
                0 => released.push(m.memory),
                1 => {}
                _ => m.memory.acquire(),
            }
        }
        released
    }

    /// Empties the space, handing back every mapping's reference
    pub(crate) fn drain(&mut self) -> Vec<Arc<KernelObject>> {
        std::mem::take(&mut self.mappings)
            .into_values()
            .map(|m| m.memory)
            .collect()
    }
}

impl Kernel {
    /// A space handle, or a task handle standing for the task's space
    pub(crate) fn resolve_space(
        &self,
        ctx: &TaskContext,
        handle: Handle,
        required: Rights,
    ) -> Result<Arc<KernelObject>, KernelError> {
        let entry = self.lookup(ctx, handle, None, required)?;
        match entry.object.kind() {
            ObjectKind::Space => Ok(entry.object),
            ObjectKind::Task => {
                let state = entry.object.lock();
                state
                    .body
                    .task()
                    .and_then(|task| task.space.clone())
                    .ok_or_else(|| {
                        KernelError::InvalidCapability(format!("{} has no space", handle))
                    })
            }
            kind => Err(KernelError::InvalidArgument(format!(
                "{} names a {}, expected a space or task",
                handle, kind
            ))),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn sys_map(
        &self,
        ctx: &TaskContext,
        space: Handle,
        virt: Option<u64>,
        memory: Handle,
        offset: u64,
        len: u64,
        flags: MapFlags,
    ) -> Result<Mapping, KernelError> {
        let protection = flags.protection();
        if protection.is_empty() {
            return Err(MemoryError::NoProtection.into());
        }
        let space = self.resolve_space(ctx, space, Rights::MAP)?;

        let mut required = Rights::MAP;
        if protection.contains(MapFlags::READ) {
            required |= Rights::READ;
        }
        if protection.contains(MapFlags::WRITE) {
            required |= Rights::WRITE;
        }
        let memory_entry = self.lookup(ctx, memory, Some(ObjectKind::Memory), required)?;
        let memory = memory_entry.object;

        if !is_page_aligned(offset) {
            return Err(MemoryError::Unaligned(offset).into());
        }
        if let Some(virt) = virt {
            if !is_page_aligned(virt) {
                return Err(MemoryError::Unaligned(virt).into());
            }
        }

        let size = {
            let state = memory.lock();
            match state.body.memory() {
                Some(m) if !state.dead => m.size,
                _ => return Err(KernelError::InvalidCapability(format!("{} destroyed", memory.id()))),
            }
        };
        if offset >= size {
            return Err(MemoryError::OffsetBeyondObject { offset, size }.into());
        }
        let available = size - offset;
        let len = if len == 0 {
            available
        } else {
            page_align_up(len).min(available)
        };

        if !memory.try_acquire() {
            return Err(KernelError::InvalidCapability(format!("{} destroyed", memory.id())));
        }

        let (base, end) = (self.config.user_base, self.config.user_end);
        let mut out = Wakeups::default();
        let placed = {
            let mut state = space.lock();
            let dead = state.dead;
            match state.body.space_mut() {
                Some(mappings) if !dead => {
                    let start = match virt {
                        None => mappings.find_free(len, base, end).map_err(KernelError::from),
                        Some(virt) => {
                            let range = VirtRange::new(virt, len);
                            let inside = virt >= base
                                && virt.checked_add(len).map(|stop| stop <= end).unwrap_or(false);
                            if !inside {
                                Err(MemoryError::OutOfRange(range).into())
                            } else if !mappings.overlaps(range) {
                                Ok(virt)
                            } else if flags.contains(MapFlags::REPLACE) {
                                out.released.extend(mappings.carve(range));
                                Ok(virt)
                            } else {
                                Err(MemoryError::Overlap(range).into())
                            }
                        }
                    };
                    start.map(|start| {
                        mappings.insert(
                            start,
                            MappingRecord {
                                len,
                                memory: memory.clone(),
                                offset,
                                flags: protection,
                            },
                        );
                        start
                    })
                }
                _ => Err(KernelError::InvalidCapability(format!(
                    "space {} destroyed",
                    space.id()
                ))),
            }
        };

        if placed.is_err() {
            out.released.push(memory.clone());
        }
        self.flush(out);
        let start = placed?;
        debug!(
            "{} mapped {} at {} ({})",
            ctx.task_id(),
            memory.id(),
            VirtRange::new(start, len),
            protection
        );
        Ok(Mapping { virt: start, len })
    }

    pub(crate) fn sys_unmap(
        &self,
        ctx: &TaskContext,
        space: Handle,
        virt: u64,
        len: u64,
    ) -> Result<(), KernelError> {
        let space = self.resolve_space(ctx, space, Rights::MAP)?;
        if !is_page_aligned(virt) {
            return Err(MemoryError::Unaligned(virt).into());
        }
        let len = page_align_up(len);
        let range = VirtRange::new(virt, len);
        if len == 0 || !range.is_representable() {
            return Err(MemoryError::OutOfRange(range).into());
        }

        let released = {
            let mut state = space.lock();
            let dead = state.dead;
            match state.body.space_mut() {
                Some(mappings) if !dead => {
                    if !mappings.covers(range) {
                        return Err(MemoryError::NotMapped(range).into());
                    }
                    mappings.carve(range)
                }
                _ => {
                    return Err(KernelError::InvalidCapability(format!(
                        "space {} destroyed",
                        space.id()
                    )))
                }
            }
        };
        debug!("{} unmapped {}", ctx.task_id(), range);
        self.release_all(released);
        Ok(())
    }
}
