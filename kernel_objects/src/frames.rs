//! Physical frame allocator
//!
//! First-fit over a sorted list of free physical ranges. Released ranges are
//! coalesced with their neighbours.

use core_types::{page_align_up, PAGE_SIZE};
use handover::PhysRange;

#[derive(Debug, Clone, Default)]
pub(crate) struct FrameAllocator {
    free: Vec<PhysRange>,
}

impl FrameAllocator {
    /// Seeds the allocator; ranges are expected page aligned
    pub(crate) fn from_ranges(ranges: impl IntoIterator<Item = PhysRange>) -> Self {
        let mut allocator = Self::default();
        for range in ranges {
            allocator.release(range.start, range.size);
        }
        allocator
    }

    /// Takes `size` bytes (rounded up to pages) from the first range large enough
    pub(crate) fn allocate(&mut self, size: u64) -> Option<u64> {
        let size = page_align_up(size).max(PAGE_SIZE);
        let index = self.free.iter().position(|r| r.size >= size)?;
        let range = &mut self.free[index];
        let start = range.start;
        range.start += size;
        range.size -= size;
        if range.is_empty() {
            self.free.remove(index);
        }
        Some(start)
    }

    /// Returns a range to the free list
    pub(crate) fn release(&mut self, start: u64, size: u64) {
        if size == 0 {
            return;
        }
        let index = self.free.partition_point(|r| r.start < start);
        self.free.insert(index, PhysRange::new(start, size));

        // merge with the right neighbour, then the left one
        if index + 1 < self.free.len() && self.free[index].end() == self.free[index + 1].start {
            self.free[index].size += self.free[index + 1].size;
            self.free.remove(index + 1);
        }
        if index > 0 && self.free[index - 1].end() == self.free[index].start {
            self.free[index - 1].size += self.free[index].size;
            self.free.remove(index);
        }
    }

    pub(crate) fn free_bytes(&self) -> u64 {
        self.free.iter().map(|r| r.size).sum()
    }

    #[cfg(test)]
    pub(crate) fn ranges(&self) -> &[PhysRange] {
        &self.free
    }
}
